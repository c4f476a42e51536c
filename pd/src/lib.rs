//! PromptDaemon - stored prompt templates rendered in a sandbox
//!
//! Operators store prompts by slash-delimited path, each with an optional
//! system-message template and a user-message template. Rendering a prompt
//! fills both templates from caller-supplied JSON parameters in a sandboxed
//! `stencil` environment, where a configurable content policy can refuse
//! the render.
//!
//! # Modules
//!
//! - [`config`] - Configuration types and loading
//! - [`domain`] - The `PromptTemplate` record
//! - [`state`] - Actor that owns the record store
//! - [`service`] - Rendering and the error taxonomy
//! - [`views`] - Trusted HTML views of stored prompts
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod service;
pub mod state;
pub mod views;

// Re-export commonly used types
pub use config::Config;
pub use domain::PromptTemplate;
pub use service::{MessagePart, PromptError, PromptService, RenderedPrompt, TemplateCache, render_prompt};
pub use state::{StateError, StateManager};
pub use views::{ViewError, Views};
