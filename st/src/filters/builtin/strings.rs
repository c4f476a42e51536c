//! String filters

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{bool_arg, check_arity, check_size, int_arg, str_arg};
use crate::filters::{Filter, FilterError, FilterResult};
use crate::value::display;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Extra characters `truncate` tolerates before cutting
const TRUNCATE_LEEWAY: usize = 5;

pub fn upper(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "upper")?;
    Ok(Value::String(display(value).to_uppercase()))
}

pub fn lower(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "lower")?;
    Ok(Value::String(display(value).to_lowercase()))
}

pub fn capitalize(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "capitalize")?;
    let text = display(value);
    let mut chars = text.chars();
    let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    };
    Ok(Value::String(out))
}

pub fn title(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "title")?;
    let text = display(value);
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for ch in text.chars() {
        if ch.is_whitespace() || matches!(ch, '-' | '(' | '{' | '[' | '<') {
            out.push(ch);
            word_start = true;
        } else if word_start {
            out.extend(ch.to_uppercase());
            word_start = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    Ok(Value::String(out))
}

/// `trim` or `trim(chars)`
pub fn trim(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 1, "trim")?;
    let text = display(value);
    let trimmed = match str_arg(args, 0, "trim")? {
        Some(chars) => text.trim_matches(|c| chars.contains(c)).to_string(),
        None => text.trim().to_string(),
    };
    Ok(Value::String(trimmed))
}

/// `replace(old, new)` or `replace(old, new, count)`
///
/// The result may not grow past `max_bytes`.
pub struct Replace {
    max_bytes: usize,
}

impl Replace {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Filter for Replace {
    fn apply(&self, value: &Value, args: &[Value]) -> FilterResult {
        check_arity(args, 3, "replace")?;
        let text = display(value);
        let (Some(old), Some(new)) = (str_arg(args, 0, "replace")?, str_arg(args, 1, "replace")?) else {
            return Err(FilterError::invalid_argument("replace requires old and new strings"));
        };
        let limit = match int_arg(args, 2, "replace")? {
            Some(count) if count >= 0 => Some(count as usize),
            _ => None,
        };

        if new.len() > old.len() {
            let matches = text.matches(old).count();
            let matches = limit.map_or(matches, |n| matches.min(n));
            let grown = matches.saturating_mul(new.len() - old.len());
            check_size(text.len().saturating_add(grown), self.max_bytes, "replace")?;
        }

        let out = match limit {
            Some(count) => text.replacen(old, new, count),
            None => text.replace(old, new),
        };
        Ok(Value::String(out))
    }
}

/// `truncate(length=255, killwords=false, end='...', leeway=5)`
pub fn truncate(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 4, "truncate")?;
    let text = display(value);
    let length = int_arg(args, 0, "truncate")?.unwrap_or(255).max(0) as usize;
    let killwords = bool_arg(args, 1, "truncate")?.unwrap_or(false);
    let end = str_arg(args, 2, "truncate")?.unwrap_or("...");
    let leeway = int_arg(args, 3, "truncate")?
        .map(|n| n.max(0) as usize)
        .unwrap_or(TRUNCATE_LEEWAY);

    let count = text.chars().count();
    if count <= length + leeway {
        return Ok(Value::String(text));
    }

    let keep = length.saturating_sub(end.chars().count());
    let head: String = text.chars().take(keep).collect();
    let head = if killwords {
        head.as_str()
    } else {
        head.rsplit_once(' ').map(|(before, _)| before).unwrap_or(&head)
    };
    Ok(Value::String(format!("{}{}", head, end)))
}

pub fn wordcount(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "wordcount")?;
    Ok(Value::from(WORD.find_iter(&display(value)).count()))
}

/// `indent(width=4, first=false, blank=false)`; `width` may also be a string prefix
///
/// The result may not grow past `max_bytes`.
pub struct Indent {
    max_bytes: usize,
}

impl Indent {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Filter for Indent {
    fn apply(&self, value: &Value, args: &[Value]) -> FilterResult {
        check_arity(args, 3, "indent")?;
        let prefix = match args.first() {
            None | Some(Value::Null) => " ".repeat(4),
            Some(Value::String(s)) => s.clone(),
            Some(_) => " ".repeat(int_arg(args, 0, "indent")?.unwrap_or(4).clamp(0, 256) as usize),
        };
        let first = bool_arg(args, 1, "indent")?.unwrap_or(false);
        let blank = bool_arg(args, 2, "indent")?.unwrap_or(false);

        let text = display(value);
        let wanted = |i: usize, line: &str| (i > 0 || first) && (blank || !line.trim().is_empty());
        let prefixed = text.split('\n').enumerate().filter(|(i, line)| wanted(*i, *line)).count();
        check_size(
            text.len().saturating_add(prefixed.saturating_mul(prefix.len())),
            self.max_bytes,
            "indent",
        )?;

        let mut out = String::with_capacity(text.len());
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if wanted(i, line) {
                out.push_str(&prefix);
            }
            out.push_str(line);
        }
        Ok(Value::String(out))
    }
}

pub fn string(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "string")?;
    Ok(Value::String(display(value)))
}
