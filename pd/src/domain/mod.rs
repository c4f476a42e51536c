//! Domain types for PromptDaemon
//!
//! `PromptTemplate` is the only record type. It implements the Record trait
//! for PromptStore persistence.

mod prompt;

pub use prompt::{PromptTemplate, parent_of, validate_path};

// Re-export promptstore types for convenience
pub use promptstore::{Filter, FilterOp, IndexValue, Record, Store};
