//! PromptStore - persistent records keyed by id
//!
//! Records of any serializable type live in one SQLite database, grouped by
//! collection. Each record declares indexed fields that `Store::list` can
//! filter on.

mod filter;
mod record;
mod store;

pub use filter::{Filter, FilterOp};
pub use record::{IndexValue, Record, now_ms};
pub use store::Store;

/// File name of the database inside the store directory
pub const DB_FILE: &str = "store.db";
