//! Operations on render values
//!
//! Values are plain `serde_json::Value`s. Nothing a template can reach has
//! methods, hidden attributes or references back into the host.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

/// Variables visible to a render
pub type RenderContext = Map<String, Value>;

/// Jinja truthiness: empty strings, empty collections, zero, false and none are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text a value renders as in `{{ }}` output
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn display_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or(0.0);
    if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// Type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Equality with integer/float coercion so `1 == 1.0`
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

/// Ordering for `<`, `sort` and friends; `None` when the values do not compare
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

/// `target.name`: map keys, or list positions for numeric names
pub fn get_attr<'a>(target: &'a Value, name: &str) -> Option<&'a Value> {
    match target {
        Value::Object(map) => map.get(name),
        Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// `target[index]`: map lookup by string, list and string lookup by integer.
/// Negative integers count from the end.
pub fn get_item(target: &Value, index: &Value) -> Option<Value> {
    match (target, index) {
        (Value::Object(map), Value::String(key)) => map.get(key).cloned(),
        (Value::Array(items), Value::Number(n)) => {
            let i = resolve_index(n.as_i64()?, items.len())?;
            items.get(i).cloned()
        }
        (Value::String(s), Value::Number(n)) => {
            let count = s.chars().count();
            let i = resolve_index(n.as_i64()?, count)?;
            s.chars().nth(i).map(|c| Value::String(c.to_string()))
        }
        _ => None,
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index < 0 {
        let back = usize::try_from(index.unsigned_abs()).ok()?;
        len.checked_sub(back)
    } else {
        usize::try_from(index).ok()
    }
}

/// Membership for `in`: substring, list element or map key
pub fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match haystack {
        Value::String(s) => match needle {
            Value::String(n) => Some(s.contains(n.as_str())),
            _ => None,
        },
        Value::Array(items) => Some(items.iter().any(|item| values_equal(item, needle))),
        Value::Object(map) => match needle {
            Value::String(key) => Some(map.contains_key(key)),
            _ => Some(false),
        },
        _ => None,
    }
}

/// Build a number value from a float, falling back to none for NaN and infinities
pub fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Integer value of a whole number, accepting integral floats
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
        }),
        _ => None,
    }
}
