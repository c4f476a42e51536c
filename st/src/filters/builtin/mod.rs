//! Built-in filters and functions
//!
//! Every built-in is a pure function of its input and arguments. None of
//! them touch the file system, the process or the network.

mod collections;
mod markup;
mod numbers;
mod strings;

pub use collections::{DefaultFilter, Join, first, items, keys, last, length, reverse, sort, unique, values};
pub use markup::{escape, safe, tojson};
pub use numbers::{RangeFunction, abs, float, int, round};
pub use strings::{Indent, Replace, capitalize, lower, string, title, trim, truncate, upper, wordcount};

use serde_json::Value;

use super::FilterError;
use crate::value::{as_integer, type_name};

/// Positional argument, treating an explicit none the same as an absent one
fn arg(args: &[Value], index: usize) -> Option<&Value> {
    args.get(index).filter(|value| !value.is_null())
}

fn check_arity(args: &[Value], max: usize, filter: &str) -> Result<(), FilterError> {
    if args.len() > max {
        return Err(FilterError::invalid_argument(format!(
            "{} takes at most {} argument(s), got {}",
            filter,
            max,
            args.len()
        )));
    }
    Ok(())
}

fn str_arg<'a>(args: &'a [Value], index: usize, filter: &str) -> Result<Option<&'a str>, FilterError> {
    match arg(args, index) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(FilterError::invalid_argument(format!(
            "{} expects a string for argument {}, got {}",
            filter,
            index + 1,
            type_name(other)
        ))),
    }
}

fn int_arg(args: &[Value], index: usize, filter: &str) -> Result<Option<i64>, FilterError> {
    match arg(args, index) {
        None => Ok(None),
        Some(value) => as_integer(value).map(Some).ok_or_else(|| {
            FilterError::invalid_argument(format!(
                "{} expects an integer for argument {}, got {}",
                filter,
                index + 1,
                type_name(value)
            ))
        }),
    }
}

fn bool_arg(args: &[Value], index: usize, filter: &str) -> Result<Option<bool>, FilterError> {
    match arg(args, index) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(FilterError::invalid_argument(format!(
            "{} expects a boolean for argument {}, got {}",
            filter,
            index + 1,
            type_name(other)
        ))),
    }
}

/// Refuse a result of `len` bytes when it would exceed `max`
fn check_size(len: usize, max: usize, filter: &str) -> Result<(), FilterError> {
    if len > max {
        return Err(FilterError::LimitExceeded(format!(
            "{} result of {} bytes exceeds max-output-bytes ({})",
            filter, len, max
        )));
    }
    Ok(())
}

fn mismatch(filter: &str, expected: &str, value: &Value) -> FilterError {
    FilterError::type_mismatch(format!(
        "{} expects {}, got {}",
        filter,
        expected,
        type_name(value)
    ))
}
