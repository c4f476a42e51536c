//! Filters, functions and the registry that whitelists them

pub mod builtin;
mod policy;
mod registry;
mod traits;

pub use policy::ContentPolicy;
pub use registry::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_RANGE, FilterRegistry, RegistryProfile};
pub use traits::{Filter, FilterError, FilterResult, Function};
