//! FilterRegistry - the names a template may call

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::builtin::{self, DefaultFilter, Indent, Join, RangeFunction, Replace};
use super::{Filter, Function};

/// Default upper bound on `range()` lengths
pub const DEFAULT_MAX_RANGE: usize = 10_000;

/// Default bound on rendered output and on strings built by filters
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Which built-ins a registry starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryProfile {
    /// Whitelist for untrusted templates
    Sandbox,
    /// Sandbox whitelist plus `safe`, for application-owned views
    Trusted,
}

/// Name → filter and name → function tables
///
/// Built once at startup, then shared read-only behind an `Arc`. Anything
/// not registered here is unreachable from a template.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FilterRegistry {
    /// Registry with no filters or functions
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    /// The sandbox whitelist
    pub fn standard() -> Self {
        Self::with_profile(RegistryProfile::Sandbox)
    }

    pub fn with_profile(profile: RegistryProfile) -> Self {
        debug!(?profile, "FilterRegistry::with_profile: called");
        let mut registry = Self::empty();

        // Strings
        registry.add_filter("upper", builtin::upper);
        registry.add_filter("lower", builtin::lower);
        registry.add_filter("capitalize", builtin::capitalize);
        registry.add_filter("title", builtin::title);
        registry.add_filter("trim", builtin::trim);
        registry.add_filter("replace", Replace::new(DEFAULT_MAX_OUTPUT_BYTES));
        registry.add_filter("truncate", builtin::truncate);
        registry.add_filter("wordcount", builtin::wordcount);
        registry.add_filter("indent", Indent::new(DEFAULT_MAX_OUTPUT_BYTES));
        registry.add_filter("string", builtin::string);

        // Collections
        registry.add_filter("length", builtin::length);
        registry.add_filter("count", builtin::length);
        registry.add_filter("default", DefaultFilter);
        registry.add_filter("d", DefaultFilter);
        registry.add_filter("join", Join::new(DEFAULT_MAX_OUTPUT_BYTES));
        registry.add_filter("first", builtin::first);
        registry.add_filter("last", builtin::last);
        registry.add_filter("reverse", builtin::reverse);
        registry.add_filter("sort", builtin::sort);
        registry.add_filter("unique", builtin::unique);
        registry.add_filter("keys", builtin::keys);
        registry.add_filter("values", builtin::values);
        registry.add_filter("items", builtin::items);

        // Numbers
        registry.add_filter("int", builtin::int);
        registry.add_filter("float", builtin::float);
        registry.add_filter("abs", builtin::abs);
        registry.add_filter("round", builtin::round);

        // Markup
        registry.add_filter("escape", builtin::escape);
        registry.add_filter("e", builtin::escape);
        registry.add_filter("tojson", builtin::tojson);

        registry.add_function("range", RangeFunction::new(DEFAULT_MAX_RANGE));

        if profile == RegistryProfile::Trusted {
            registry.add_filter("safe", builtin::safe);
        }

        registry
    }

    /// Register or replace a filter
    pub fn add_filter(&mut self, name: impl Into<String>, filter: impl Filter + 'static) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    /// Register or replace a function
    pub fn add_function(&mut self, name: impl Into<String>, function: impl Function + 'static) {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Replace `range` with one bounded by `max`
    pub fn set_max_range(&mut self, max: usize) {
        self.add_function("range", RangeFunction::new(max));
    }

    /// Replace the string-building filters with ones bounded by `max` bytes
    pub fn set_max_output_bytes(&mut self, max: usize) {
        self.add_filter("replace", Replace::new(max));
        self.add_filter("indent", Indent::new(max));
        self.add_filter("join", Join::new(max));
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered filter names, sorted
    pub fn filter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered function names, sorted
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filter_names())
            .field("functions", &self.function_names())
            .finish()
    }
}
