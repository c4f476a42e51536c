//! Template lexer
//!
//! Splits source text into literal text and the tokens inside `{{ }}` and
//! `{% %}` tags. Comments are dropped and `{% raw %}` blocks become plain
//! text here, so the parser never sees either.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::Span;
use crate::error::SyntaxError;

static RAW_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{%-?\s*raw\s*(-?)%\}").expect("raw open pattern is valid"));

static RAW_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%(-?)\s*endraw\s*(-?)%\}").expect("raw close pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    VariableStart,
    VariableEnd,
    BlockStart,
    BlockEnd,
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    Comma,
    Colon,
    Pipe,
    Tilde,
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Plus,
    Minus,
    Star,
    Slash,
    FloorDiv,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    /// Description used in "unexpected ..." messages
    pub fn describe(&self) -> String {
        match self {
            Token::Text(_) => "template text".to_string(),
            Token::VariableStart => "'{{'".to_string(),
            Token::VariableEnd => "'}}'".to_string(),
            Token::BlockStart => "'{%'".to_string(),
            Token::BlockEnd => "'%}'".to_string(),
            Token::Ident(name) => format!("name '{}'", name),
            Token::Str(_) => "string literal".to_string(),
            Token::Int(n) => format!("number {}", n),
            Token::Float(n) => format!("number {}", n),
            other => format!("'{}'", other.punct()),
        }
    }

    fn punct(&self) -> &'static str {
        match self {
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Pipe => "|",
            Token::Tilde => "~",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::FloorDiv => "//",
            Token::Percent => "%",
            Token::Eq => "==",
            Token::Ne => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Variable,
    Block,
}

impl TagKind {
    fn closer(self) -> &'static str {
        match self {
            TagKind::Variable => "}}",
            TagKind::Block => "%}",
        }
    }
}

/// Tokenize a template source
pub fn tokenize(source: &str, name: Option<&str>) -> Result<Vec<(Token, Span)>, SyntaxError> {
    let mut lexer = Lexer::new(source, name);
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'s> {
    src: &'s str,
    name: Option<&'s str>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<(Token, Span)>,
    /// Strip leading whitespace from the next text run (set by `-}}`, `-%}`, `-#}`)
    trim_next: bool,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str, name: Option<&'s str>) -> Self {
        Self {
            src,
            name,
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            trim_next: false,
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn error_at(&self, message: impl Into<String>, span: Span) -> SyntaxError {
        SyntaxError::new(message, self.name, span.line, span.column)
    }

    fn advance_to(&mut self, new_pos: usize) {
        for ch in self.src[self.pos..new_pos].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos = new_pos;
    }

    fn push(&mut self, token: Token, span: Span) {
        self.tokens.push((token, span));
    }

    fn push_text(&mut self, text: &str, trim_end: bool) {
        let mut text = text;
        if self.trim_next {
            text = text.trim_start();
            self.trim_next = false;
        }
        if trim_end {
            text = text.trim_end();
        }
        if !text.is_empty() {
            let span = self.span();
            self.push(Token::Text(text.to_string()), span);
        }
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        let src = self.src;
        while self.pos < src.len() {
            let Some(offset) = find_tag_start(&src[self.pos..]) else {
                self.push_text(&src[self.pos..], false);
                self.advance_to(src.len());
                break;
            };

            let tag_start = self.pos + offset;
            let bytes = src.as_bytes();
            let kind = bytes[tag_start + 1];
            let trim_before = bytes.get(tag_start + 2) == Some(&b'-');

            let text = &src[self.pos..tag_start];
            self.push_text(text, trim_before);
            self.advance_to(tag_start);

            match kind {
                b'#' => self.lex_comment()?,
                b'{' => self.lex_tag(TagKind::Variable)?,
                _ => {
                    if !self.lex_raw()? {
                        self.lex_tag(TagKind::Block)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lex_comment(&mut self) -> Result<(), SyntaxError> {
        let start = self.span();
        let body_start = self.pos + 2;
        let Some(end) = self.src[body_start..].find("#}").map(|i| body_start + i) else {
            return Err(self.error_at("unclosed comment", start));
        };
        let trim_after = end > body_start && self.src.as_bytes()[end - 1] == b'-';
        self.advance_to(end + 2);
        self.trim_next = trim_after;
        Ok(())
    }

    fn lex_raw(&mut self) -> Result<bool, SyntaxError> {
        let src = self.src;
        let rest = &src[self.pos..];
        let Some(open) = RAW_OPEN.captures(rest) else {
            return Ok(false);
        };
        let start = self.span();
        let open_len = open.get(0).map_or(0, |m| m.end());
        let trim_body_start = open.get(1).is_some_and(|m| !m.as_str().is_empty());

        let body_start = self.pos + open_len;
        let Some(close) = RAW_CLOSE.captures(&src[body_start..]) else {
            return Err(self.error_at("unclosed '{% raw %}' block", start));
        };
        let (close_start, close_end) = match close.get(0) {
            Some(m) => (m.start(), m.end()),
            None => return Err(self.error_at("unclosed '{% raw %}' block", start)),
        };
        let trim_body_end = close.get(1).is_some_and(|m| !m.as_str().is_empty());
        let trim_after = close.get(2).is_some_and(|m| !m.as_str().is_empty());

        let mut body = &src[body_start..body_start + close_start];
        if trim_body_start {
            body = body.trim_start();
        }
        if trim_body_end {
            body = body.trim_end();
        }
        if !body.is_empty() {
            self.push(Token::Text(body.to_string()), start);
        }
        self.advance_to(body_start + close_end);
        self.trim_next = trim_after;
        Ok(true)
    }

    fn lex_tag(&mut self, kind: TagKind) -> Result<(), SyntaxError> {
        let start = self.span();
        let opener_len = if self.src.as_bytes().get(self.pos + 2) == Some(&b'-') {
            3
        } else {
            2
        };
        self.push(
            match kind {
                TagKind::Variable => Token::VariableStart,
                TagKind::Block => Token::BlockStart,
            },
            start,
        );
        self.advance_to(self.pos + opener_len);

        let closer = kind.closer();
        let mut brace_depth = 0usize;

        loop {
            self.skip_whitespace();
            let rest = &self.src[self.pos..];
            if rest.is_empty() {
                let opener = match kind {
                    TagKind::Variable => "{{",
                    TagKind::Block => "{%",
                };
                return Err(self.error_at(format!("unclosed '{}'", opener), start));
            }

            if brace_depth == 0 {
                let end_token = match kind {
                    TagKind::Variable => Token::VariableEnd,
                    TagKind::Block => Token::BlockEnd,
                };
                if rest.starts_with('-') && rest[1..].starts_with(closer) {
                    let span = self.span();
                    self.push(end_token, span);
                    self.advance_to(self.pos + 3);
                    self.trim_next = true;
                    return Ok(());
                }
                if rest.starts_with(closer) {
                    let span = self.span();
                    self.push(end_token, span);
                    self.advance_to(self.pos + 2);
                    return Ok(());
                }
            }

            let token = self.lex_token()?;
            match token {
                Token::LBrace => brace_depth += 1,
                Token::RBrace => {
                    if brace_depth == 0 {
                        let span = self.tokens.last().map(|(_, s)| *s).unwrap_or(start);
                        return Err(self.error_at("unexpected '}'", span));
                    }
                    brace_depth -= 1;
                }
                _ => {}
            }
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.src[self.pos..];
        let skipped = rest.len() - rest.trim_start().len();
        if skipped > 0 {
            self.advance_to(self.pos + skipped);
        }
    }

    /// Lex one token inside a tag, push it, and return a copy of it
    fn lex_token(&mut self) -> Result<Token, SyntaxError> {
        let span = self.span();
        let rest = &self.src[self.pos..];
        let Some(c) = rest.chars().next() else {
            return Err(self.error_at("unexpected end of template", span));
        };

        let (token, len) = if c.is_ascii_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            (Token::Ident(rest[..len].to_string()), len)
        } else if c.is_ascii_digit() {
            self.lex_number(rest, span)?
        } else if c == '\'' || c == '"' {
            self.lex_string(rest, c, span)?
        } else {
            lex_punct(rest).ok_or_else(|| self.error_at(format!("unexpected character '{}'", c), span))?
        };

        self.push(token.clone(), span);
        self.advance_to(self.pos + len);
        Ok(token)
    }

    fn lex_number(&self, rest: &str, span: Span) -> Result<(Token, usize), SyntaxError> {
        let int_len = rest.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(rest.len());
        // `items.0.1` is two integer lookups, not a float
        let after_dot = matches!(self.tokens.last(), Some((Token::Dot, _)));
        let bytes = rest.as_bytes();
        let is_float =
            !after_dot && bytes.get(int_len) == Some(&b'.') && bytes.get(int_len + 1).is_some_and(u8::is_ascii_digit);

        if is_float {
            let frac_len = rest[int_len + 1..]
                .find(|ch: char| !ch.is_ascii_digit())
                .unwrap_or(rest.len() - int_len - 1);
            let len = int_len + 1 + frac_len;
            let value: f64 = rest[..len]
                .parse()
                .map_err(|_| self.error_at("invalid float literal", span))?;
            Ok((Token::Float(value), len))
        } else {
            let value: i64 = rest[..int_len]
                .parse()
                .map_err(|_| self.error_at("integer literal out of range", span))?;
            Ok((Token::Int(value), int_len))
        }
    }

    fn lex_string(&self, rest: &str, quote: char, span: Span) -> Result<(Token, usize), SyntaxError> {
        let mut value = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((idx, ch)) = chars.next() {
            if ch == quote {
                return Ok((Token::Str(value), idx + ch.len_utf8()));
            }
            if ch == '\\' {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            } else {
                value.push(ch);
            }
        }
        Err(self.error_at("unterminated string literal", span))
    }
}

fn find_tag_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    text.match_indices('{')
        .map(|(idx, _)| idx)
        .find(|&idx| matches!(bytes.get(idx + 1), Some(b'{') | Some(b'%') | Some(b'#')))
}

fn lex_punct(rest: &str) -> Option<(Token, usize)> {
    let two = match rest.get(..2) {
        Some("==") => Some(Token::Eq),
        Some("!=") => Some(Token::Ne),
        Some("<=") => Some(Token::Le),
        Some(">=") => Some(Token::Ge),
        Some("//") => Some(Token::FloorDiv),
        _ => None,
    };
    if let Some(token) = two {
        return Some((token, 2));
    }

    let token = match rest.as_bytes().first()? {
        b'.' => Token::Dot,
        b',' => Token::Comma,
        b':' => Token::Colon,
        b'|' => Token::Pipe,
        b'~' => Token::Tilde,
        b'=' => Token::Assign,
        b'(' => Token::LParen,
        b')' => Token::RParen,
        b'[' => Token::LBracket,
        b']' => Token::RBracket,
        b'{' => Token::LBrace,
        b'}' => Token::RBrace,
        b'+' => Token::Plus,
        b'-' => Token::Minus,
        b'*' => Token::Star,
        b'/' => Token::Slash,
        b'%' => Token::Percent,
        b'<' => Token::Lt,
        b'>' => Token::Gt,
        _ => return None,
    };
    Some((token, 1))
}
