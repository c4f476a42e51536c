//! Filter and function traits

use serde_json::Value;
use thiserror::Error;

pub type FilterResult = Result<Value, FilterError>;

/// Failure reported by a filter or function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    TypeMismatch(String),

    /// The value is refused by a content policy; `message` is shown to the caller
    #[error("{message}")]
    PolicyViolation { message: String },

    #[error("{0}")]
    LimitExceeded(String),
}

impl FilterError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        FilterError::InvalidArgument(message.into())
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        FilterError::TypeMismatch(message.into())
    }

    pub fn policy_violation(message: impl Into<String>) -> Self {
        FilterError::PolicyViolation {
            message: message.into(),
        }
    }
}

/// A pure transformation applied with `value | name(args)`
///
/// Implementations must not hold interior state that changes between calls;
/// a registry is shared by every concurrent render.
pub trait Filter: Send + Sync {
    fn apply(&self, value: &Value, args: &[Value]) -> FilterResult;

    /// Whether an undefined input is passed in as none instead of failing the render
    fn accepts_undefined(&self) -> bool {
        false
    }
}

impl<F> Filter for F
where
    F: Fn(&Value, &[Value]) -> FilterResult + Send + Sync,
{
    fn apply(&self, value: &Value, args: &[Value]) -> FilterResult {
        self(value, args)
    }
}

/// A global callable invoked with `name(args)`
pub trait Function: Send + Sync {
    fn call(&self, args: &[Value]) -> FilterResult;
}

impl<F> Function for F
where
    F: Fn(&[Value]) -> FilterResult + Send + Sync,
{
    fn call(&self, args: &[Value]) -> FilterResult {
        self(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_is_a_filter() {
        let shout = |value: &Value, _args: &[Value]| -> FilterResult {
            Ok(Value::String(format!("{}!", value.as_str().unwrap_or_default())))
        };
        assert_eq!(shout.apply(&json!("hi"), &[]), Ok(json!("hi!")));
        assert!(!shout.accepts_undefined());
    }

    #[test]
    fn test_closure_is_a_function() {
        let answer = |_args: &[Value]| -> FilterResult { Ok(json!(42)) };
        assert_eq!(answer.call(&[]), Ok(json!(42)));
    }

    #[test]
    fn test_policy_violation_message() {
        let err = FilterError::policy_violation("not allowed");
        assert_eq!(err.to_string(), "not allowed");
    }
}
