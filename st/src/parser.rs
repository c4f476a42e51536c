//! Recursive-descent parser from tokens to the template tree

use serde_json::Value;

use crate::ast::{BinaryOp, Expr, ExprKind, LoopTarget, Node, Span, TestKind, UnaryOp};
use crate::error::SyntaxError;
use crate::lexer::Token;

/// Names that cannot be used as variables
const RESERVED: &[&str] = &["and", "or", "not", "in", "is", "if", "else"];

/// Deepest expression tree a template may build, counting chained operators
const MAX_DEPTH: usize = 100;

/// Deepest recursion through the parser: brackets, prefix operators and blocks
const MAX_RECURSION: usize = 32;

/// Statements from larger Jinja dialects that this parser rejects
const UNSUPPORTED: &[&str] = &[
    "include", "import", "from", "extends", "block", "macro", "call", "filter", "with", "autoescape",
];

pub fn parse(tokens: Vec<(Token, Span)>, name: Option<&str>) -> Result<Vec<Node>, SyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        recursion: 0,
        name: name.map(str::to_string),
    };
    let (nodes, _) = parser.parse_body(&[])?;
    Ok(nodes)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    depth: usize,
    recursion: usize,
    name: Option<String>,
}

impl Parser {
    // === Token helpers ===

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, s)| *s)
            .unwrap_or(Span { line: 1, column: 1 })
    }

    fn next(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let span = self.span();
        SyntaxError::new(message, self.name.as_deref(), span.line, span.column)
    }

    fn error_at(&self, message: impl Into<String>, span: Span) -> SyntaxError {
        SyntaxError::new(message, self.name.as_deref(), span.line, span.column)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => self.error(format!("unexpected {}, expected {}", token.describe(), expected)),
            None => self.error(format!("unexpected end of template, expected {}", expected)),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<Span, SyntaxError> {
        if self.peek() == Some(&token) {
            let span = self.span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(Token::Ident(name)) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Count one more level of nesting; callers reset `depth` when they return
    fn nest(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("template nesting is too deep"));
        }
        Ok(())
    }

    /// Enter a recursive rule; pair with `leave` on success
    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.recursion += 1;
        if self.recursion > MAX_RECURSION {
            return Err(self.error("template nesting is too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.recursion -= 1;
    }

    fn expect_block_end(&mut self) -> Result<(), SyntaxError> {
        self.expect(Token::BlockEnd, "'%}'").map(|_| ())
    }

    // === Statements ===

    /// Parse nodes until one of `until` statements opens a tag.
    ///
    /// The terminating keyword is consumed, the rest of its tag is left for
    /// the caller. With an empty `until` list the body runs to end of input.
    fn parse_body(&mut self, until: &[&str]) -> Result<(Vec<Node>, Option<String>), SyntaxError> {
        let mut nodes = Vec::new();

        loop {
            let Some((token, span)) = self.next() else {
                if until.is_empty() {
                    return Ok((nodes, None));
                }
                let expected = until
                    .iter()
                    .map(|kw| format!("'{{% {} %}}'", kw))
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(self.error(format!("unexpected end of template, expected {}", expected)));
            };

            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::VariableStart => {
                    let expr = self.parse_expr()?;
                    self.expect(Token::VariableEnd, "'}}'")?;
                    nodes.push(Node::Output { expr, span });
                }
                Token::BlockStart => {
                    let keyword = match self.peek() {
                        Some(Token::Ident(kw)) => kw.clone(),
                        _ => return Err(self.unexpected("a statement name")),
                    };
                    if until.contains(&keyword.as_str()) {
                        self.pos += 1;
                        return Ok((nodes, Some(keyword)));
                    }
                    self.pos += 1;
                    let base = self.depth;
                    let node = match keyword.as_str() {
                        "if" => {
                            self.nest()?;
                            self.enter()?;
                            let node = self.parse_if()?;
                            self.leave();
                            node
                        }
                        "for" => {
                            self.nest()?;
                            self.enter()?;
                            let node = self.parse_for(span)?;
                            self.leave();
                            node
                        }
                        "set" => self.parse_set()?,
                        "elif" | "else" | "endif" | "endfor" | "endraw" => {
                            return Err(self.error_at(format!("unexpected '{{% {} %}}'", keyword), span));
                        }
                        kw if UNSUPPORTED.contains(&kw) => {
                            return Err(self.error_at(format!("'{}' statements are not supported", kw), span));
                        }
                        kw => {
                            return Err(self.error_at(format!("unknown statement '{}'", kw), span));
                        }
                    };
                    self.depth = base;
                    nodes.push(node);
                }
                other => {
                    self.pos -= 1;
                    return Err(self.error(format!("unexpected {}", other.describe())));
                }
            }
        }
    }

    fn parse_if(&mut self) -> Result<Node, SyntaxError> {
        let mut branches = Vec::new();
        let mut condition = self.parse_expr()?;
        self.expect_block_end()?;

        loop {
            let (body, end) = self.parse_body(&["elif", "else", "endif"])?;
            branches.push((condition, body));
            match end.as_deref() {
                Some("elif") => {
                    condition = self.parse_expr()?;
                    self.expect_block_end()?;
                }
                Some("else") => {
                    self.expect_block_end()?;
                    let (otherwise, _) = self.parse_body(&["endif"])?;
                    self.expect_block_end()?;
                    return Ok(Node::If { branches, otherwise });
                }
                _ => {
                    self.expect_block_end()?;
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
            }
        }
    }

    /// A name the template binds; `loop` belongs to the enclosing for loop
    fn expect_binding(&mut self, expected: &str) -> Result<String, SyntaxError> {
        let span = self.span();
        let name = self.expect_ident(expected)?;
        if name == "loop" {
            return Err(self.error_at("'loop' is reserved and cannot be assigned", span));
        }
        Ok(name)
    }

    fn parse_for(&mut self, span: Span) -> Result<Node, SyntaxError> {
        let first = self.expect_binding("a loop variable name")?;
        let target = if self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            LoopTarget::Pair(first, self.expect_binding("a second loop variable name")?)
        } else {
            LoopTarget::Single(first)
        };

        if !self.eat_keyword("in") {
            return Err(self.unexpected("'in'"));
        }
        let iter = self.parse_expr()?;
        self.expect_block_end()?;

        let (body, end) = self.parse_body(&["else", "endfor"])?;
        let otherwise = if end.as_deref() == Some("else") {
            self.expect_block_end()?;
            let (otherwise, _) = self.parse_body(&["endfor"])?;
            otherwise
        } else {
            Vec::new()
        };
        self.expect_block_end()?;

        Ok(Node::For {
            target,
            iter,
            body,
            otherwise,
            span,
        })
    }

    fn parse_set(&mut self) -> Result<Node, SyntaxError> {
        let name = self.expect_binding("a variable name")?;
        self.expect(Token::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect_block_end()?;
        Ok(Node::Set { name, value })
    }

    // === Expressions ===

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        self.nest()?;
        self.enter()?;
        let expr = self.parse_conditional()?;
        self.leave();
        self.depth = base;
        Ok(expr)
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let then = self.parse_or()?;
        if !self.is_keyword("if") {
            return Ok(then);
        }
        let span = self.span();
        self.pos += 1;
        self.nest()?;
        let condition = self.parse_or()?;
        let otherwise = if self.eat_keyword("else") {
            self.enter()?;
            let otherwise = self.parse_conditional()?;
            self.leave();
            Some(Box::new(otherwise))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise,
            },
            span,
        ))
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            let span = self.span();
            self.pos += 1;
            self.nest()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right, span);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.parse_not()?;
        while self.is_keyword("and") {
            let span = self.span();
            self.pos += 1;
            self.nest()?;
            let right = self.parse_not()?;
            left = binary(BinaryOp::And, left, right, span);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_keyword("not") {
            let span = self.span();
            self.pos += 1;
            self.nest()?;
            self.enter()?;
            let operand = self.parse_not()?;
            self.leave();
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.parse_concat()?;
        loop {
            self.nest()?;
            let span = self.span();
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Ident(kw)) if kw == "in" => BinaryOp::In,
                Some(Token::Ident(kw))
                    if kw == "not" && matches!(self.peek_at(1), Some(Token::Ident(next)) if next == "in") =>
                {
                    self.pos += 1;
                    BinaryOp::NotIn
                }
                Some(Token::Ident(kw)) if kw == "is" => {
                    self.pos += 1;
                    left = self.parse_test(left, span)?;
                    continue;
                }
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.pos += 1;
            let right = self.parse_concat()?;
            left = binary(op, left, right, span);
        }
    }

    fn parse_test(&mut self, target: Expr, span: Span) -> Result<Expr, SyntaxError> {
        let negated = self.eat_keyword("not");
        let name = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(self.unexpected("a test name")),
        };
        let Some(test) = TestKind::from_name(&name) else {
            return Err(self.error(format!("unknown test '{}'", name)));
        };
        self.pos += 1;
        Ok(Expr::new(
            ExprKind::Test {
                target: Box::new(target),
                test,
                negated,
            },
            span,
        ))
    }

    fn parse_concat(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.parse_additive()?;
        while self.peek() == Some(&Token::Tilde) {
            let span = self.span();
            self.pos += 1;
            self.nest()?;
            let right = self.parse_additive()?;
            left = binary(BinaryOp::Concat, left, right, span);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            let span = self.span();
            self.pos += 1;
            self.nest()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right, span);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::FloorDiv) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            let span = self.span();
            self.pos += 1;
            self.nest()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right, span);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.peek() == Some(&Token::Minus) {
            let span = self.span();
            self.pos += 1;
            self.nest()?;
            self.enter()?;
            let operand = self.parse_unary()?;
            self.leave();
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_filtered()
    }

    fn parse_filtered(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut expr = self.parse_postfix()?;
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            self.nest()?;
            let span = self.span();
            let name = self.expect_ident("a filter name")?;
            let args = if self.peek() == Some(&Token::LParen) {
                self.pos += 1;
                self.parse_args(Token::RParen, "')'")?
            } else {
                Vec::new()
            };
            expr = Expr::new(
                ExprKind::Filter {
                    target: Box::new(expr),
                    name,
                    args,
                },
                span,
            );
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    self.nest()?;
                    let span = self.span();
                    let name = match self.next() {
                        Some((Token::Ident(name), _)) => name,
                        Some((Token::Int(n), _)) if n >= 0 => n.to_string(),
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return Err(self.unexpected("an attribute name"));
                        }
                    };
                    expr = Expr::new(
                        ExprKind::Attr {
                            target: Box::new(expr),
                            name,
                        },
                        span,
                    );
                }
                Some(Token::LBracket) => {
                    let span = self.span();
                    self.pos += 1;
                    self.nest()?;
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                Some(Token::LParen) => {
                    return Err(self.error(format!(
                        "'{}' is not callable; only registered functions can be called",
                        expr.describe()
                    )));
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        let Some((token, _)) = self.next() else {
            return Err(self.error("unexpected end of template, expected an expression"));
        };

        let kind = match token {
            Token::Str(s) => ExprKind::Literal(Value::String(s)),
            Token::Int(n) => ExprKind::Literal(Value::from(n)),
            Token::Float(f) => match serde_json::Number::from_f64(f) {
                Some(n) => ExprKind::Literal(Value::Number(n)),
                None => {
                    self.pos -= 1;
                    return Err(self.error("float literal is not finite"));
                }
            },
            Token::Ident(name) => match name.as_str() {
                "true" | "True" => ExprKind::Literal(Value::Bool(true)),
                "false" | "False" => ExprKind::Literal(Value::Bool(false)),
                "none" | "None" => ExprKind::Literal(Value::Null),
                kw if RESERVED.contains(&kw) => {
                    self.pos -= 1;
                    return Err(self.unexpected("an expression"));
                }
                _ => {
                    if self.peek() == Some(&Token::LParen) {
                        self.pos += 1;
                        let args = self.parse_args(Token::RParen, "')'")?;
                        ExprKind::Call { name, args }
                    } else {
                        ExprKind::Var(name)
                    }
                }
            },
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => ExprKind::List(self.parse_args(Token::RBracket, "']'")?),
            Token::LBrace => ExprKind::Map(self.parse_map_entries()?),
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("an expression"));
            }
        };
        Ok(Expr::new(kind, span))
    }

    /// Comma-separated expressions up to `close`; the opening token is already consumed
    fn parse_args(&mut self, close: Token, expected: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.parse_expr()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(t) if *t == close => {}
                _ => return Err(self.unexpected(&format!("',' or {}", expected))),
            }
        }
    }

    fn parse_map_entries(&mut self) -> Result<Vec<(Expr, Expr)>, SyntaxError> {
        let mut entries = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBrace) {
                self.pos += 1;
                return Ok(entries);
            }
            let key = self.parse_expr()?;
            self.expect(Token::Colon, "':'")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RBrace) => {}
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr, span: Span) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(source: &str) -> Result<Vec<Node>, SyntaxError> {
        parse(tokenize(source, None)?, None)
    }

    fn output_expr(source: &str) -> Expr {
        match parse_src(source).unwrap().into_iter().next() {
            Some(Node::Output { expr, .. }) => expr,
            other => panic!("expected output node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_text_and_output() {
        let nodes = parse_src("Hello, {{ name }}!").unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[1], Node::Output { expr, .. } if expr.kind == ExprKind::Var("name".to_string())));
    }

    #[test]
    fn test_filter_binds_tighter_than_minus() {
        let expr = output_expr("{{ -x | abs }}");
        match expr.kind {
            ExprKind::Unary { op: UnaryOp::Neg, operand } => {
                assert!(matches!(operand.kind, ExprKind::Filter { ref name, .. } if name == "abs"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_filter_chain_with_args() {
        let expr = output_expr("{{ name | default('anon') | upper }}");
        match expr.kind {
            ExprKind::Filter { name, target, args } => {
                assert_eq!(name, "upper");
                assert!(args.is_empty());
                assert!(matches!(target.kind, ExprKind::Filter { ref name, ref args, .. } if name == "default" && args.len() == 1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_precedence_of_and_or() {
        let expr = output_expr("{{ a or b and c }}");
        match expr.kind {
            ExprKind::Binary { op: BinaryOp::Or, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::And, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_in_and_is_not() {
        let expr = output_expr("{{ x not in items }}");
        assert!(matches!(expr.kind, ExprKind::Binary { op: BinaryOp::NotIn, .. }));

        let expr = output_expr("{{ x is not defined }}");
        assert!(matches!(
            expr.kind,
            ExprKind::Test {
                test: TestKind::Defined,
                negated: true,
                ..
            }
        ));
    }

    #[test]
    fn test_if_elif_else() {
        let nodes = parse_src("{% if a %}1{% elif b %}2{% else %}3{% endif %}").unwrap();
        match &nodes[0] {
            Node::If { branches, otherwise } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(otherwise, &vec![Node::Text("3".to_string())]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_for_pair_with_else() {
        let nodes = parse_src("{% for k, v in m | items %}{{ k }}{% else %}empty{% endfor %}").unwrap();
        match &nodes[0] {
            Node::For { target, otherwise, .. } => {
                assert_eq!(target, &LoopTarget::Pair("k".to_string(), "v".to_string()));
                assert_eq!(otherwise.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conditional_expression() {
        let expr = output_expr("{{ 'yes' if ok else 'no' }}");
        assert!(matches!(expr.kind, ExprKind::Conditional { otherwise: Some(_), .. }));
    }

    #[test]
    fn test_call_on_attribute_is_rejected() {
        let err = parse_src("{{ name.upper() }}").unwrap_err();
        assert!(err.message.contains("not callable"));
    }

    #[test]
    fn test_unknown_statement() {
        let err = parse_src("{% import 'os' as os %}").unwrap_err();
        assert!(err.message.contains("not supported"));

        let err = parse_src("{% frobnicate %}").unwrap_err();
        assert!(err.message.contains("unknown statement 'frobnicate'"));
    }

    #[test]
    fn test_missing_endif() {
        let err = parse_src("{% if a %}never closed").unwrap_err();
        assert!(err.message.contains("endif"));
    }

    #[test]
    fn test_stray_endfor() {
        let err = parse_src("text{% endfor %}").unwrap_err();
        assert!(err.message.contains("unexpected '{% endfor %}'"));
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_unknown_test_name() {
        let err = parse_src("{{ x is callable }}").unwrap_err();
        assert!(err.message.contains("unknown test 'callable'"));
    }

    #[test]
    fn test_reserved_word_as_variable() {
        let err = parse_src("{{ and }}").unwrap_err();
        assert!(err.message.contains("expected an expression"));
    }

    #[test]
    fn test_malformed_expression() {
        let err = parse_src("{{ a + }}").unwrap_err();
        assert!(err.message.contains("unexpected '}}'"));
    }

    #[test]
    fn test_map_and_list_literals() {
        let expr = output_expr("{{ {'a': [1, 2], 'b': none} }}");
        match expr.kind {
            ExprKind::Map(entries) => {
                assert_eq!(entries.len(), 2);
                assert!(matches!(entries[0].1.kind, ExprKind::List(ref items) if items.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{{{{ {}1{} }}}}", "(".repeat(500), ")".repeat(500));
        let err = parse_src(&deep).unwrap_err();
        assert!(err.message.contains("too deep"));

        let chain = format!("{{{{ x{} }}}}", " | upper".repeat(500));
        assert!(parse_src(&chain).is_err());

        let fine = format!("{{{{ {}1{} }}}}", "(".repeat(20), ")".repeat(20));
        assert!(parse_src(&fine).is_ok());
    }

    #[test]
    fn test_deep_brackets_fail_before_the_stack_does() {
        let parens = format!("{{{{ {}1{} }}}}", "(".repeat(150), ")".repeat(150));
        let lists = format!("{{{{ {}1{} }}}}", "[".repeat(150), "]".repeat(150));
        let maps = format!("{{{{ {}1{} }}}}", "{'k': ".repeat(150), "}".repeat(150));
        let index = format!("{{{{ x{} }}}}", "[x".repeat(150) + &"]".repeat(150));
        let negs = format!("{{{{ {}1 }}}}", "-".repeat(5000));
        let nots = format!("{{{{ {}x }}}}", "not ".repeat(5000));
        let conds = format!("{{{{ 1{} }}}}", " if a else 1".repeat(150));
        let blocks = format!("{}{}", "{% if a %}".repeat(150), "{% endif %}".repeat(150));

        for source in [parens, lists, maps, index, negs, nots, conds, blocks] {
            let err = parse_src(&source).unwrap_err();
            assert!(err.message.contains("too deep"), "{}", err);
        }
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let lists = format!("{{{{ {}1{} }}}}", "[".repeat(30), "]".repeat(30));
        assert!(parse_src(&lists).is_ok());

        let blocks = format!("{}{}", "{% for x in xs %}".repeat(24), "{% endfor %}".repeat(24));
        assert!(parse_src(&blocks).is_ok());

        let chain = format!("{{{{ x{} }}}}", " ~ x".repeat(60));
        assert!(parse_src(&chain).is_ok());
    }

    #[test]
    fn test_loop_is_not_bindable() {
        let err = parse_src("{% for loop in items %}{{ loop }}{% endfor %}").unwrap_err();
        assert!(err.message.contains("'loop' is reserved"));

        let err = parse_src("{% for k, loop in m | items %}{% endfor %}").unwrap_err();
        assert!(err.message.contains("'loop' is reserved"));

        let err = parse_src("{% set loop = 1 %}").unwrap_err();
        assert!(err.message.contains("'loop' is reserved"));
        assert_eq!(err.column, 8);

        assert!(parse_src("{% for item in items %}{{ loop.index }}{% endfor %}").is_ok());
    }

    #[test]
    fn test_error_line_numbers() {
        let err = parse_src("line 1\nline 2 {{ a |  }}").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
