//! PromptTemplate record

use std::collections::HashMap;

use promptstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A stored prompt: an optional system-message template and a user-message
/// template, keyed by a slash-delimited path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Slash-delimited key, e.g. `support/greeting`
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    pub user_message: String,

    /// Unix ms
    pub created_at: i64,

    /// Unix ms
    pub updated_at: i64,
}

impl PromptTemplate {
    pub fn new(path: impl Into<String>, system_message: Option<String>, user_message: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            path: path.into(),
            system_message,
            user_message: user_message.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Parent path, or None for a top-level prompt
    pub fn parent(&self) -> Option<&str> {
        parent_of(&self.path)
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Path with its last segment removed
pub fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Check that a path is usable as a record key
///
/// Returns a description of the first problem found.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path is empty".to_string());
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(format!("path '{}' must not start or end with '/'", path));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(format!("path '{}' has an empty segment", path)),
            "." | ".." => return Err(format!("path '{}' has a '{}' segment", path, segment)),
            s if s.chars().any(char::is_whitespace) => {
                return Err(format!("path '{}' contains whitespace", path));
            }
            _ => {}
        }
    }
    Ok(())
}

impl Record for PromptTemplate {
    fn id(&self) -> &str {
        &self.path
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "prompt_templates"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        debug!(path = %self.path, "PromptTemplate::indexed_fields: called");
        let mut fields = HashMap::new();
        if let Some(parent) = self.parent() {
            fields.insert("parent".to_string(), IndexValue::String(parent.to_string()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_new_sets_timestamps() {
        let prompt = PromptTemplate::new("support/greeting", None, "Hello {{ name }}");
        assert_eq!(prompt.created_at, prompt.updated_at);
        assert!(prompt.created_at > 0);
        assert_eq!(prompt.id(), "support/greeting");
    }

    #[test]
    fn test_parent_and_name() {
        let prompt = PromptTemplate::new("a/b/c", None, "");
        assert_eq!(prompt.parent(), Some("a/b"));
        assert_eq!(prompt.name(), "c");

        let top = PromptTemplate::new("top", None, "");
        assert_eq!(top.parent(), None);
        assert_eq!(top.name(), "top");
    }

    #[test]
    fn test_indexed_fields() {
        let nested = PromptTemplate::new("support/greeting", None, "");
        let fields = nested.indexed_fields();
        assert_eq!(fields.get("parent"), Some(&IndexValue::String("support".to_string())));

        let top = PromptTemplate::new("greeting", None, "");
        assert!(top.indexed_fields().is_empty());
    }

    #[test]
    fn test_validate_path_accepts_nested() {
        assert!(validate_path("greeting").is_ok());
        assert!(validate_path("support/en/greeting-v2").is_ok());
    }

    #[test]
    fn test_validate_path_rejects_malformed() {
        for bad in ["", "/lead", "trail/", "a//b", "a/./b", "../up", "has space"] {
            assert!(validate_path(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_serde_omits_missing_system_message() {
        let prompt = PromptTemplate::new("p", None, "u");
        let json = serde_json::to_value(&prompt).unwrap();
        assert!(json.get("system_message").is_none());

        let back: PromptTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(back, prompt);
    }
}
