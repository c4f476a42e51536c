//! Filters over lists, maps and strings as sequences

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::{bool_arg, check_arity, check_size, mismatch, str_arg};
use crate::filters::{Filter, FilterError, FilterResult};
use crate::value::{compare, display, get_attr, is_truthy, values_equal};

pub fn length(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "length")?;
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(mismatch("length", "a string, list or map", other)),
    };
    Ok(Value::from(len))
}

/// `default(value='', boolean=false)`
///
/// Replaces undefined and none. With `boolean` set, any falsy value is replaced.
pub struct DefaultFilter;

impl Filter for DefaultFilter {
    fn apply(&self, value: &Value, args: &[Value]) -> FilterResult {
        check_arity(args, 2, "default")?;
        let fallback = args.first().cloned().unwrap_or_else(|| Value::String(String::new()));
        let boolean = bool_arg(args, 1, "default")?.unwrap_or(false);

        if value.is_null() || (boolean && !is_truthy(value)) {
            Ok(fallback)
        } else {
            Ok(value.clone())
        }
    }

    fn accepts_undefined(&self) -> bool {
        true
    }
}

/// `join(separator='', attribute=none)`
///
/// The result may not grow past `max_bytes`.
pub struct Join {
    max_bytes: usize,
}

impl Join {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Filter for Join {
    fn apply(&self, value: &Value, args: &[Value]) -> FilterResult {
        check_arity(args, 2, "join")?;
        let separator = str_arg(args, 0, "join")?.unwrap_or("");
        let attribute = str_arg(args, 1, "join")?;

        let parts: Vec<String> = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match attribute {
                    Some(attr) => get_attr(item, attr).map(display).unwrap_or_default(),
                    None => display(item),
                })
                .collect(),
            Value::String(s) => s.chars().map(String::from).collect(),
            other => return Err(mismatch("join", "a list", other)),
        };

        let text_len = parts.iter().fold(0usize, |acc, p| acc.saturating_add(p.len()));
        let separators = parts.len().saturating_sub(1).saturating_mul(separator.len());
        check_size(text_len.saturating_add(separators), self.max_bytes, "join")?;

        Ok(Value::String(parts.join(separator)))
    }
}

pub fn first(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "first")?;
    match value {
        Value::Array(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        Value::String(s) => Ok(s.chars().next().map(|c| Value::String(c.to_string())).unwrap_or(Value::Null)),
        other => Err(mismatch("first", "a list or string", other)),
    }
}

pub fn last(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "last")?;
    match value {
        Value::Array(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        Value::String(s) => Ok(s.chars().last().map(|c| Value::String(c.to_string())).unwrap_or(Value::Null)),
        other => Err(mismatch("last", "a list or string", other)),
    }
}

pub fn reverse(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "reverse")?;
    match value {
        Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        other => Err(mismatch("reverse", "a list or string", other)),
    }
}

/// Strings compare case-insensitively unless `case_sensitive` is set
fn sort_key(value: &Value, case_sensitive: bool) -> Value {
    match value {
        Value::String(s) if !case_sensitive => Value::String(s.to_lowercase()),
        other => other.clone(),
    }
}

/// `sort(reverse=false, case_sensitive=false, attribute=none)`
pub fn sort(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 3, "sort")?;
    let descending = bool_arg(args, 0, "sort")?.unwrap_or(false);
    let case_sensitive = bool_arg(args, 1, "sort")?.unwrap_or(false);
    let attribute = str_arg(args, 2, "sort")?;

    let Value::Array(items) = value else {
        return Err(mismatch("sort", "a list", value));
    };

    let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(items.len());
    for item in items {
        let key = match attribute {
            Some(attr) => get_attr(item, attr).cloned().unwrap_or(Value::Null),
            None => item.clone(),
        };
        keyed.push((sort_key(&key, case_sensitive), item.clone()));
    }

    // Reject mixed types up front so the comparator can stay total
    for pair in keyed.windows(2) {
        if compare(&pair[0].0, &pair[1].0).is_none() {
            return Err(FilterError::type_mismatch(format!(
                "sort cannot compare {} with {}",
                display(&pair[0].0),
                display(&pair[1].0)
            )));
        }
    }

    keyed.sort_by(|a, b| compare(&a.0, &b.0).unwrap_or(Ordering::Equal));
    if descending {
        keyed.reverse();
    }
    Ok(Value::Array(keyed.into_iter().map(|(_, item)| item).collect()))
}

/// `unique(case_sensitive=false)`; keeps the first occurrence
pub fn unique(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 1, "unique")?;
    let case_sensitive = bool_arg(args, 0, "unique")?.unwrap_or(false);
    let Value::Array(items) = value else {
        return Err(mismatch("unique", "a list", value));
    };

    let mut seen: Vec<Value> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let key = sort_key(item, case_sensitive);
        if !seen.iter().any(|s| values_equal(s, &key)) {
            seen.push(key);
            out.push(item.clone());
        }
    }
    Ok(Value::Array(out))
}

fn as_map<'a>(value: &'a Value, filter: &str) -> Result<&'a Map<String, Value>, FilterError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(mismatch(filter, "a map", other)),
    }
}

pub fn keys(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "keys")?;
    let map = as_map(value, "keys")?;
    Ok(Value::Array(map.keys().cloned().map(Value::String).collect()))
}

pub fn values(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "values")?;
    let map = as_map(value, "values")?;
    Ok(Value::Array(map.values().cloned().collect()))
}

/// Map entries as `[key, value]` pairs, for `for k, v in m | items`
pub fn items(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "items")?;
    let map = as_map(value, "items")?;
    Ok(Value::Array(
        map.iter()
            .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length() {
        assert_eq!(length(&json!("héllo"), &[]), Ok(json!(5)));
        assert_eq!(length(&json!([1, 2, 3]), &[]), Ok(json!(3)));
        assert_eq!(length(&json!({"a": 1}), &[]), Ok(json!(1)));
        assert!(matches!(length(&json!(7), &[]), Err(FilterError::TypeMismatch(_))));
    }

    #[test]
    fn test_default() {
        let filter = DefaultFilter;
        assert!(filter.accepts_undefined());
        assert_eq!(filter.apply(&json!(null), &[json!("anon")]), Ok(json!("anon")));
        assert_eq!(filter.apply(&json!("bob"), &[json!("anon")]), Ok(json!("bob")));
        assert_eq!(filter.apply(&json!(""), &[json!("anon")]), Ok(json!("")));
        assert_eq!(filter.apply(&json!(""), &[json!("anon"), json!(true)]), Ok(json!("anon")));
        assert_eq!(filter.apply(&json!(null), &[]), Ok(json!("")));
    }

    fn join(value: &Value, args: &[Value]) -> FilterResult {
        Join::new(1024).apply(value, args)
    }

    #[test]
    fn test_join() {
        assert_eq!(join(&json!(["a", 1, true]), &[json!(", ")]), Ok(json!("a, 1, true")));
        assert_eq!(
            join(&json!([{"name": "x"}, {"name": "y"}]), &[json!("/"), json!("name")]),
            Ok(json!("x/y"))
        );
    }

    #[test]
    fn test_join_separator_growth_is_bounded() {
        let items = json!(vec![1; 100]);
        // 100 digits plus 99 separators
        assert!(join(&items, &[json!("-".repeat(9))]).is_ok());
        assert!(matches!(
            join(&items, &[json!("-".repeat(10))]),
            Err(FilterError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_first_last_reverse() {
        assert_eq!(first(&json!([3, 4]), &[]), Ok(json!(3)));
        assert_eq!(last(&json!([3, 4]), &[]), Ok(json!(4)));
        assert_eq!(first(&json!([]), &[]), Ok(json!(null)));
        assert_eq!(reverse(&json!("abc"), &[]), Ok(json!("cba")));
        assert_eq!(reverse(&json!([1, 2]), &[]), Ok(json!([2, 1])));
    }

    #[test]
    fn test_sort() {
        assert_eq!(sort(&json!([3, 1, 2]), &[]), Ok(json!([1, 2, 3])));
        assert_eq!(sort(&json!(["b", "A", "c"]), &[]), Ok(json!(["A", "b", "c"])));
        assert_eq!(sort(&json!([1, 3, 2]), &[json!(true)]), Ok(json!([3, 2, 1])));
        assert_eq!(
            sort(&json!([{"n": 2}, {"n": 1}]), &[json!(false), json!(false), json!("n")]),
            Ok(json!([{"n": 1}, {"n": 2}]))
        );
        assert!(matches!(sort(&json!([1, "a"]), &[]), Err(FilterError::TypeMismatch(_))));
    }

    #[test]
    fn test_unique() {
        assert_eq!(unique(&json!(["a", "A", "b", "a"]), &[]), Ok(json!(["a", "b"])));
        assert_eq!(unique(&json!(["a", "A"]), &[json!(true)]), Ok(json!(["a", "A"])));
        assert_eq!(unique(&json!([1, 1.0, 2]), &[]), Ok(json!([1, 2])));
    }

    #[test]
    fn test_map_filters() {
        let map = json!({"a": 1, "b": 2});
        assert_eq!(keys(&map, &[]), Ok(json!(["a", "b"])));
        assert_eq!(values(&map, &[]), Ok(json!([1, 2])));
        assert_eq!(items(&map, &[]), Ok(json!([["a", 1], ["b", 2]])));
        assert!(keys(&json!([1]), &[]).is_err());
    }
}
