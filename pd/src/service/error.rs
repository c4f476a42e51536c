//! Errors surfaced by the prompt service

use std::fmt;

use serde::Serialize;
use stencil::{RenderError, SyntaxError};
use thiserror::Error;

use crate::state::StateError;
use crate::views::ViewError;

/// Which of a prompt's two templates an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePart {
    System,
    User,
}

impl fmt::Display for MessagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagePart::System => write!(f, "system"),
            MessagePart::User => write!(f, "user"),
        }
    }
}

/// Failures of prompt operations, each with a distinct transport status
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("{part} message template does not compile: {source}")]
    TemplateSyntax { part: MessagePart, source: SyntaxError },

    #[error("{part} message template failed to render: {source}")]
    TemplateEvaluation { part: MessagePart, source: RenderError },

    /// The message is written for the caller and is returned as-is
    #[error("{message}")]
    PolicyViolation {
        part: MessagePart,
        filter: String,
        message: String,
    },

    #[error("Prompt not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid render parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid prompt path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Failed to render view: {0}")]
    View(#[from] ViewError),
}

impl PromptError {
    /// HTTP-equivalent status for the error
    pub fn status_code(&self) -> u16 {
        match self {
            PromptError::PolicyViolation { .. } | PromptError::InvalidParams(_) | PromptError::InvalidPath(_) => 400,
            PromptError::RecordNotFound(_) => 404,
            PromptError::TemplateSyntax { .. }
            | PromptError::TemplateEvaluation { .. }
            | PromptError::State(_)
            | PromptError::View(_) => 500,
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            PromptError::InvalidParams(_) | PromptError::InvalidPath(_) => 2,
            PromptError::RecordNotFound(_) => 3,
            PromptError::PolicyViolation { .. } => 4,
            PromptError::TemplateSyntax { .. } | PromptError::TemplateEvaluation { .. } => 5,
            PromptError::State(_) | PromptError::View(_) => 1,
        }
    }

    pub fn is_policy_violation(&self) -> bool {
        matches!(self, PromptError::PolicyViolation { .. })
    }
}
