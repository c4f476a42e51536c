//! Numeric filters and the `range` function

use serde_json::Value;

use super::{arg, check_arity, int_arg, mismatch, str_arg};
use crate::filters::{FilterError, FilterResult, Function};
use crate::value::{as_integer, float as float_value};

/// `int(default=0)`: truncates floats, parses numeric strings
pub fn int(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 1, "int")?;
    let fallback = int_arg(args, 0, "int")?.unwrap_or(0);
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    };
    Ok(Value::from(parsed.unwrap_or(fallback)))
}

/// `float(default=0.0)`
pub fn float(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 1, "float")?;
    let fallback = match arg(args, 0) {
        None => 0.0,
        Some(v) => v
            .as_f64()
            .ok_or_else(|| FilterError::invalid_argument("float expects a number for its default"))?,
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    };
    Ok(float_value(parsed.unwrap_or(fallback)))
}

pub fn abs(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 0, "abs")?;
    let Value::Number(n) = value else {
        return Err(mismatch("abs", "a number", value));
    };
    if let Some(i) = n.as_i64() {
        return match i.checked_abs() {
            Some(a) => Ok(Value::from(a)),
            None => Ok(float_value((i as f64).abs())),
        };
    }
    if n.is_u64() {
        return Ok(value.clone());
    }
    Ok(float_value(n.as_f64().unwrap_or(0.0).abs()))
}

/// `round(precision=0, method='common')`; method is `common`, `ceil` or `floor`
pub fn round(value: &Value, args: &[Value]) -> FilterResult {
    check_arity(args, 2, "round")?;
    let Some(f) = value.as_f64() else {
        return Err(mismatch("round", "a number", value));
    };
    let precision = int_arg(args, 0, "round")?.unwrap_or(0).clamp(0, 15) as i32;
    let factor = 10f64.powi(precision);
    let scaled = f * factor;
    let rounded = match str_arg(args, 1, "round")?.unwrap_or("common") {
        "common" => scaled.round(),
        "ceil" => scaled.ceil(),
        "floor" => scaled.floor(),
        other => {
            return Err(FilterError::invalid_argument(format!(
                "round method must be common, ceil or floor, got '{}'",
                other
            )));
        }
    };
    Ok(float_value(rounded / factor))
}

/// `range(stop)`, `range(start, stop)`, `range(start, stop, step)`
///
/// Refuses to build sequences longer than `max`.
#[derive(Debug, Clone, Copy)]
pub struct RangeFunction {
    max: usize,
}

impl RangeFunction {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Function for RangeFunction {
    fn call(&self, args: &[Value]) -> FilterResult {
        let ints = args
            .iter()
            .map(|a| as_integer(a).ok_or_else(|| FilterError::invalid_argument("range expects integers")))
            .collect::<Result<Vec<_>, _>>()?;

        let (start, stop, step) = match ints.as_slice() {
            [stop] => (0, *stop, 1),
            [start, stop] => (*start, *stop, 1),
            [start, stop, step] => (*start, *stop, *step),
            _ => return Err(FilterError::invalid_argument("range takes 1 to 3 arguments")),
        };
        if step == 0 {
            return Err(FilterError::invalid_argument("range step must not be zero"));
        }

        let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
        let span = if step > 0 { stop - start } else { start - stop };
        let count = if span <= 0 {
            0
        } else {
            (span + step.abs() - 1) / step.abs()
        };
        if count > self.max as i128 {
            return Err(FilterError::LimitExceeded(format!(
                "range of {} items exceeds max-range ({})",
                count, self.max
            )));
        }

        let items = (0..count)
            .map(|i| Value::from((start + i * step) as i64))
            .collect();
        Ok(Value::Array(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int() {
        assert_eq!(int(&json!("42"), &[]), Ok(json!(42)));
        assert_eq!(int(&json!(" 3.9 "), &[]), Ok(json!(3)));
        assert_eq!(int(&json!(-2.5), &[]), Ok(json!(-2)));
        assert_eq!(int(&json!("nope"), &[json!(7)]), Ok(json!(7)));
        assert_eq!(int(&json!(true), &[]), Ok(json!(1)));
    }

    #[test]
    fn test_float() {
        assert_eq!(float(&json!("1.5"), &[]), Ok(json!(1.5)));
        assert_eq!(float(&json!(2), &[]), Ok(json!(2.0)));
        assert_eq!(float(&json!("x"), &[]), Ok(json!(0.0)));
    }

    #[test]
    fn test_abs() {
        assert_eq!(abs(&json!(-3), &[]), Ok(json!(3)));
        assert_eq!(abs(&json!(-1.5), &[]), Ok(json!(1.5)));
        assert!(abs(&json!("x"), &[]).is_err());
    }

    #[test]
    fn test_round() {
        assert_eq!(round(&json!(2.5), &[]), Ok(json!(3.0)));
        assert_eq!(round(&json!(3.14159), &[json!(2)]), Ok(json!(3.14)));
        assert_eq!(round(&json!(2.1), &[json!(0), json!("ceil")]), Ok(json!(3.0)));
        assert_eq!(round(&json!(2.9), &[json!(0), json!("floor")]), Ok(json!(2.0)));
        assert!(round(&json!(1.0), &[json!(0), json!("bankers")]).is_err());
    }

    #[test]
    fn test_range() {
        let range = RangeFunction::new(100);
        assert_eq!(range.call(&[json!(3)]), Ok(json!([0, 1, 2])));
        assert_eq!(range.call(&[json!(1), json!(4)]), Ok(json!([1, 2, 3])));
        assert_eq!(range.call(&[json!(10), json!(0), json!(-4)]), Ok(json!([10, 6, 2])));
        assert_eq!(range.call(&[json!(5), json!(1)]), Ok(json!([])));
        assert!(matches!(range.call(&[json!(0), json!(1), json!(0)]), Err(FilterError::InvalidArgument(_))));
    }

    #[test]
    fn test_range_limit() {
        let range = RangeFunction::new(10);
        assert!(range.call(&[json!(10)]).is_ok());
        assert!(matches!(range.call(&[json!(11)]), Err(FilterError::LimitExceeded(_))));
        assert!(matches!(
            range.call(&[json!(i64::MIN), json!(i64::MAX)]),
            Err(FilterError::LimitExceeded(_))
        ));
    }
}
