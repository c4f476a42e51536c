//! Error types for compiling and rendering templates

use thiserror::Error;

/// A template source could not be compiled
///
/// `line` and `column` are 1-based and point at the token where parsing
/// stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error{} at line {line}, column {column}: {message}", display_name(.name))]
pub struct SyntaxError {
    /// Human-readable description of the problem
    pub message: String,
    /// Template name, when the template was compiled with one
    pub name: Option<String>,
    pub line: usize,
    pub column: usize,
}

fn display_name(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" in '{}'", name),
        None => String::new(),
    }
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, name: Option<&str>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            name: name.map(str::to_string),
            line,
            column,
        }
    }
}

/// Errors raised while evaluating a compiled template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("'{name}' is undefined (line {line})")]
    UndefinedVariable { name: String, line: usize },

    #[error("'{target}' has no attribute or item '{attr}' (line {line})")]
    UndefinedAttribute { target: String, attr: String, line: usize },

    #[error("no filter named '{name}' (line {line})")]
    UnknownFilter { name: String, line: usize },

    #[error("no function named '{name}' (line {line})")]
    UnknownFunction { name: String, line: usize },

    #[error("{message} (line {line})")]
    TypeMismatch { message: String, line: usize },

    #[error("filter '{name}' failed: {message} (line {line})")]
    Filter { name: String, message: String, line: usize },

    /// A policy filter refused the value; the message is meant for the caller
    #[error("{message}")]
    PolicyViolation { filter: String, message: String, line: usize },

    #[error("render limit exceeded: {limit} (line {line})")]
    LimitExceeded { limit: String, line: usize },

    #[error("render context must be a map: {0}")]
    InvalidContext(String),
}

impl RenderError {
    /// Check if a policy filter rejected the render
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, RenderError::PolicyViolation { .. })
    }

    /// Check if the error comes from a name that is not reachable from the template
    pub fn is_unknown_name(&self) -> bool {
        matches!(
            self,
            RenderError::UndefinedVariable { .. }
                | RenderError::UndefinedAttribute { .. }
                | RenderError::UnknownFilter { .. }
                | RenderError::UnknownFunction { .. }
        )
    }

    pub(crate) fn is_undefined(&self) -> bool {
        matches!(
            self,
            RenderError::UndefinedVariable { .. } | RenderError::UndefinedAttribute { .. }
        )
    }

    /// Template line the error was raised on, if known
    pub fn line(&self) -> Option<usize> {
        match self {
            RenderError::UndefinedVariable { line, .. }
            | RenderError::UndefinedAttribute { line, .. }
            | RenderError::UnknownFilter { line, .. }
            | RenderError::UnknownFunction { line, .. }
            | RenderError::TypeMismatch { line, .. }
            | RenderError::Filter { line, .. }
            | RenderError::PolicyViolation { line, .. }
            | RenderError::LimitExceeded { line, .. } => Some(*line),
            RenderError::InvalidContext(_) => None,
        }
    }
}

/// Either a compile or a render failure, for one-shot helpers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("template not found: {0}")]
    TemplateNotFound(String),
}
