//! Location-keyed cache for compiled templates, rendered output, and data.
//!
//! The cache avoids redundant parsing and recompilation across renders that
//! share an engine instance. Entries are keyed by resolved location and live
//! for the engine's lifetime; `Rendered` entries may be overwritten by a
//! fresher render for the same key.
//!
//! When the engine runs with `disable_cache`, [`RenderCache::get`] treats
//! every lookup as a miss so each request re-reads and recompiles, while
//! writes still land. Builtin placeholder entries (the identity layout) stay
//! reachable through [`RenderCache::get_always`] even in bypass mode.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use handlebars::template::Template;
use serde_json::Value;

/// A cached artifact for one resolved location.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// A compiled template whose dependencies are already installed.
    Compiled(Template),
    /// Final rendered output for a view.
    Rendered(String),
    /// Parsed JSON from a data or component descriptor file.
    Data(Value),
}

/// Engine-lifetime cache with hit/miss accounting.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: DashMap<String, CacheEntry>,
    bypass: bool,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl RenderCache {
    pub fn new(bypass: bool) -> Self {
        Self {
            bypass,
            ..Self::default()
        }
    }

    /// Look up an entry, honoring bypass mode.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        if self.bypass {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.get_always(key)
    }

    /// Look up an entry regardless of bypass mode.
    ///
    /// Used for builtin placeholder entries, which must stay resolvable even
    /// when per-request reloading is forced.
    pub fn get_always(&self, key: &str) -> Option<CacheEntry> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite an entry. Writes happen even in bypass mode.
    pub fn insert(&self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let (hits, misses) = self.stats();
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}
