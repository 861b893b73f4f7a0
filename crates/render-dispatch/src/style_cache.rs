//! Per-style cache of prepared engine state.
//!
//! Parsing a style document is the expensive step of a render, so each
//! style is parsed once into a map object and the object is reused for
//! every later render of that style, with only size and extent changed.
//!
//! ## Locking
//!
//! Two levels:
//! - The key → entry index sits behind one mutex. It is held only for
//!   lookups and removals, never across an engine call.
//! - Each entry wraps its map object in its own mutex. A worker holds it for
//!   the whole load → frame → draw sequence, so two jobs for the same style
//!   never interleave their framing.
//!
//! Eviction only removes an entry from the index. A worker that already
//! holds an `Arc` to the entry finishes its render normally; the next
//! lookup creates a fresh, unloaded entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use map_common::StyleId;
use renderer::{PreparedMap, RenderEngine, StyleError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::telemetry;

/// Receives change notifications for style documents.
///
/// The storage layer calls this after a style document is edited so the
/// next render parses the new text.
pub trait StyleChangeListener: Send + Sync {
    fn on_style_changed(&self, style_id: StyleId);
}

/// Prepared engine state for one style.
pub struct CacheEntry {
    style_id: StyleId,
    map: Mutex<Box<dyn PreparedMap>>,
}

impl CacheEntry {
    fn new(style_id: StyleId, map: Box<dyn PreparedMap>) -> Self {
        Self {
            style_id,
            map: Mutex::new(map),
        }
    }

    pub fn style_id(&self) -> StyleId {
        self.style_id
    }

    /// Take exclusive use of the map object.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn PreparedMap>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when a style has been loaded. Blocks while a worker renders.
    pub fn is_loaded(&self) -> bool {
        self.lock().is_loaded()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("style_id", &self.style_id)
            .finish_non_exhaustive()
    }
}

/// Statistics for the style cache.
///
/// All fields are atomic for lock-free reads from any thread.
#[derive(Debug, Default)]
pub struct StyleCacheStats {
    /// Lookups that found an entry
    pub hits: AtomicU64,
    /// Lookups that created an entry
    pub misses: AtomicU64,
    /// Style documents parsed (successful or not)
    pub parses: AtomicU64,
    /// Parses that failed
    pub parse_failures: AtomicU64,
    /// Entries removed for any reason
    pub evictions: AtomicU64,
    /// Style change notifications received
    pub invalidations: AtomicU64,
}

impl StyleCacheStats {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn parses(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StyleCacheSnapshot {
        StyleCacheSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StyleCacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StyleCacheSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub parses: u64,
    pub parse_failures: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

/// Mapping from style identity to prepared engine state.
pub struct StyleCache {
    engine: Arc<dyn RenderEngine>,
    entries: Mutex<HashMap<StyleId, Arc<CacheEntry>>>,
    stats: Arc<StyleCacheStats>,
}

impl StyleCache {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        info!(engine = engine.name(), "Style cache initialized");
        Self {
            engine,
            entries: Mutex::new(HashMap::new()),
            stats: Arc::new(StyleCacheStats::default()),
        }
    }

    fn index(&self) -> MutexGuard<'_, HashMap<StyleId, Arc<CacheEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the entry for `style_id`, creating an empty one if needed.
    pub fn get_or_create(&self, style_id: StyleId) -> Arc<CacheEntry> {
        if let Some(entry) = self.index().get(&style_id) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            telemetry::record_cache_lookup(true);
            return Arc::clone(entry);
        }

        // Create outside the index lock; another worker may win the race.
        let created = Arc::new(CacheEntry::new(style_id, self.engine.create_map()));

        let mut index = self.index();
        match index.get(&style_id) {
            Some(existing) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                telemetry::record_cache_lookup(true);
                Arc::clone(existing)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                telemetry::record_cache_lookup(false);
                debug!(style_id = %style_id, "Created style cache entry");
                index.insert(style_id, Arc::clone(&created));
                created
            }
        }
    }

    /// Parse `document` into `map`, the locked map object of `entry`.
    ///
    /// On failure the entry is evicted so the next render parses again.
    pub fn load(
        &self,
        entry: &Arc<CacheEntry>,
        map: &mut dyn PreparedMap,
        document: &str,
    ) -> Result<(), StyleError> {
        self.stats.parses.fetch_add(1, Ordering::Relaxed);

        match map.load_style(document) {
            Ok(()) => {
                telemetry::record_style_parse(true);
                debug!(style_id = %entry.style_id(), "Style loaded");
                Ok(())
            }
            Err(e) => {
                self.stats.parse_failures.fetch_add(1, Ordering::Relaxed);
                telemetry::record_style_parse(false);
                warn!(style_id = %entry.style_id(), error = %e, "Style failed to load");
                self.evict_entry(entry, "parse_failure");
                Err(e)
            }
        }
    }

    /// Remove the entry for `style_id`. Returns whether one was present.
    pub fn evict(&self, style_id: StyleId) -> bool {
        let removed = self.index().remove(&style_id).is_some();
        if removed {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            telemetry::record_eviction("explicit");
            debug!(style_id = %style_id, "Evicted style cache entry");
        }
        removed
    }

    /// Remove `entry` only if it is still the one indexed for its style.
    ///
    /// A failed render must not throw away a fresh entry created after an
    /// invalidation raced with it.
    pub fn evict_entry(&self, entry: &Arc<CacheEntry>, reason: &'static str) -> bool {
        let mut index = self.index();
        let same = index
            .get(&entry.style_id())
            .is_some_and(|current| Arc::ptr_eq(current, entry));
        if same {
            index.remove(&entry.style_id());
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            telemetry::record_eviction(reason);
            debug!(style_id = %entry.style_id(), reason, "Evicted style cache entry");
        }
        same
    }

    /// Drop the cached state for a style whose document changed.
    pub fn invalidate(&self, style_id: StyleId) -> bool {
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        let removed = self.index().remove(&style_id).is_some();
        if removed {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            telemetry::record_eviction("invalidated");
        }
        info!(style_id = %style_id, removed, "Style invalidated");
        removed
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut index = self.index();
            let n = index.len();
            index.clear();
            n
        };
        self.stats
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            info!(removed, "Style cache cleared");
        }
        removed
    }

    /// True while `entry` is the one indexed for its style.
    pub fn is_current(&self, entry: &Arc<CacheEntry>) -> bool {
        self.index()
            .get(&entry.style_id())
            .is_some_and(|current| Arc::ptr_eq(current, entry))
    }

    pub fn contains(&self, style_id: StyleId) -> bool {
        self.index().contains_key(&style_id)
    }

    pub fn len(&self) -> usize {
        self.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index().is_empty()
    }

    /// Shared handle to the live statistics.
    pub fn stats(&self) -> Arc<StyleCacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }
}

impl StyleChangeListener for StyleCache {
    fn on_style_changed(&self, style_id: StyleId) {
        self.invalidate(style_id);
    }
}

impl std::fmt::Debug for StyleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleCache")
            .field("engine", &self.engine.name())
            .field("entries", &self.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
