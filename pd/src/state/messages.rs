//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::PromptTemplate;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    GetPrompt {
        path: String,
        reply: oneshot::Sender<StateResponse<Option<PromptTemplate>>>,
    },
    ListPrompts {
        parent_filter: Option<String>,
        reply: oneshot::Sender<StateResponse<Vec<PromptTemplate>>>,
    },
    /// Insert or replace; an existing record keeps its `created_at`
    UpsertPrompt {
        path: String,
        system_message: Option<String>,
        user_message: String,
        reply: oneshot::Sender<StateResponse<PromptTemplate>>,
    },
    /// Replies whether a record was removed
    DeletePrompt {
        path: String,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    Shutdown,
}
