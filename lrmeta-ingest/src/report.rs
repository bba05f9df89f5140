//! Per-run outcome of the normalizer

use lrmeta_common::CacheKey;
use std::collections::BTreeSet;

/// Outcome of one normalizer run
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    /// True when the whole store was re-read
    pub full: bool,
    /// Records parsed during this run
    pub processed: usize,
    /// Records skipped as malformed or invalid
    pub skipped: usize,
    /// Record-level problems, in the order they were found
    pub warnings: Vec<String>,
    /// Cache keys whose on-disk document was (re)written
    pub changed: BTreeSet<CacheKey>,
    /// Cache keys whose document no longer exists
    pub removed: BTreeSet<CacheKey>,
}

impl NormalizeReport {
    pub fn new(full: bool) -> Self {
        Self {
            full,
            ..Self::default()
        }
    }

    /// Record a data-quality warning and log it
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub(crate) fn mark_changed(&mut self, key: CacheKey) {
        self.removed.remove(&key);
        self.changed.insert(key);
    }

    pub(crate) fn mark_removed(&mut self, key: CacheKey) {
        self.changed.remove(&key);
        self.removed.insert(key);
    }
}
