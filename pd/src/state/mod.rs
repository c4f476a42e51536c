//! State management with actor pattern
//!
//! StateManager owns the PromptStore and processes messages via channels,
//! providing thread-safe access to stored prompts.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
