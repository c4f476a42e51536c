//! Content-policy filter

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use super::{Filter, FilterError, FilterResult};

/// Rejects values containing any disallowed term
///
/// Matching is case-insensitive and substring-based. Every string reachable
/// in the value is inspected, including strings nested in lists and maps.
/// Values that pass are returned unchanged.
#[derive(Debug, Clone)]
pub struct ContentPolicy {
    pattern: Option<Regex>,
    message: String,
}

impl ContentPolicy {
    /// Build a policy from disallowed terms; empty terms are ignored
    pub fn new<I, S>(terms: I, message: impl Into<String>) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| regex::escape(&t))
            .collect();

        let pattern = if alternatives.is_empty() {
            None
        } else {
            Some(RegexBuilder::new(&alternatives.join("|")).case_insensitive(true).build()?)
        };

        Ok(Self {
            pattern,
            message: message.into(),
        })
    }

    /// Message returned to the caller when a value is rejected
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the value contains a disallowed term anywhere
    pub fn is_violation(&self, value: &Value) -> bool {
        let Some(pattern) = &self.pattern else {
            return false;
        };
        contains_match(pattern, value)
    }
}

fn contains_match(pattern: &Regex, value: &Value) -> bool {
    match value {
        Value::String(s) => pattern.is_match(s),
        Value::Array(items) => items.iter().any(|item| contains_match(pattern, item)),
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| pattern.is_match(k) || contains_match(pattern, v)),
        _ => false,
    }
}

impl Filter for ContentPolicy {
    fn apply(&self, value: &Value, _args: &[Value]) -> FilterResult {
        if self.is_violation(value) {
            debug!("ContentPolicy::apply: value rejected");
            return Err(FilterError::policy_violation(self.message.clone()));
        }
        Ok(value.clone())
    }
}
