//! Compile cache for prompt templates
//!
//! Keyed by template source, so an edited prompt never hits a stale entry.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use stencil::{CompiledTemplate, SyntaxError, compile};
use tracing::debug;

/// Bounded map from source text to compiled template
///
/// When full, the whole map is cleared before the next insert. Two threads
/// that miss on the same source both compile it; the second insert wins.
#[derive(Debug)]
pub struct TemplateCache {
    capacity: usize,
    entries: RwLock<HashMap<String, CompiledTemplate>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compiled form of `source`, compiling on a miss
    ///
    /// Sources that fail to compile are not cached.
    pub fn get_or_compile(&self, source: &str) -> Result<CompiledTemplate, SyntaxError> {
        let cached = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(source)
            .cloned();
        if let Some(template) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(template);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let template = compile(source)?;

        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.len() >= self.capacity && !entries.contains_key(source) {
            debug!(capacity = self.capacity, "TemplateCache full, clearing");
            entries.clear();
        }
        entries.insert(source.to_string(), template.clone());
        Ok(template)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
