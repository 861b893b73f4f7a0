//! Style cache lookups, loads and evictions.

use std::sync::Arc;
use std::thread;

use map_common::StyleId;
use render_dispatch::{StyleCache, StyleChangeListener};
use test_utils::{probe_styles, ProbeEngine};

fn cache() -> (StyleCache, ProbeEngine) {
    let engine = ProbeEngine::new();
    (StyleCache::new(engine.clone().into_engine()), engine)
}

// ============================================================================
// Lookups
// ============================================================================

#[test]
fn test_lookup_returns_same_entry() {
    let (cache, engine) = cache();
    let a = cache.get_or_create(StyleId::new(1));
    let b = cache.get_or_create(StyleId::new(1));

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(engine.stats().maps_created(), 1);
    assert_eq!(cache.len(), 1);

    let stats = cache.stats();
    assert_eq!(stats.snapshot().hits, 1);
    assert_eq!(stats.snapshot().misses, 1);
    assert!((stats.hit_rate() - 50.0).abs() < 1e-9);
}

#[test]
fn test_distinct_styles_get_distinct_entries() {
    let (cache, _) = cache();
    let a = cache.get_or_create(StyleId::new(1));
    let b = cache.get_or_create(StyleId::new(2));

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.style_id(), StyleId::new(1));
    assert_eq!(b.style_id(), StyleId::new(2));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_concurrent_lookups_share_one_entry() {
    let (cache, _) = cache();
    let cache = Arc::new(cache);

    let entries: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_create(StyleId::new(7)))
        })
        .map(|handle| handle.join().unwrap())
        .collect();

    assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_empty_cache_hit_rate() {
    let (cache, _) = cache();
    assert!(cache.is_empty());
    assert_eq!(cache.stats().hit_rate(), 0.0);
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_successful_load_is_kept() {
    let (cache, engine) = cache();
    let entry = cache.get_or_create(StyleId::new(1));
    {
        let mut map = entry.lock();
        cache.load(&entry, &mut **map, probe_styles::VALID).unwrap();
    }

    assert!(entry.is_loaded());
    assert!(cache.contains(StyleId::new(1)));
    assert_eq!(cache.stats().parses(), 1);
    assert_eq!(engine.stats().parses(), 1);
}

#[test]
fn test_failed_load_evicts_entry() {
    let (cache, _) = cache();
    let entry = cache.get_or_create(StyleId::new(1));
    {
        let mut map = entry.lock();
        assert!(cache.load(&entry, &mut **map, probe_styles::BROKEN).is_err());
    }

    assert!(!entry.is_loaded());
    assert!(!cache.contains(StyleId::new(1)));

    let snapshot = cache.stats().snapshot();
    assert_eq!(snapshot.parse_failures, 1);
    assert_eq!(snapshot.evictions, 1);

    // Next lookup starts from a fresh map
    let fresh = cache.get_or_create(StyleId::new(1));
    assert!(!Arc::ptr_eq(&entry, &fresh));
}

// ============================================================================
// Eviction and invalidation
// ============================================================================

#[test]
fn test_stale_entry_does_not_evict_replacement() {
    let (cache, _) = cache();
    let stale = cache.get_or_create(StyleId::new(3));

    assert!(cache.invalidate(StyleId::new(3)));
    let fresh = cache.get_or_create(StyleId::new(3));

    assert!(!cache.evict_entry(&stale, "engine_error"));
    assert!(cache.contains(StyleId::new(3)));

    assert!(cache.evict_entry(&fresh, "engine_error"));
    assert!(!cache.contains(StyleId::new(3)));
}

#[test]
fn test_is_current_tracks_index() {
    let (cache, _) = cache();
    let entry = cache.get_or_create(StyleId::new(2));
    assert!(cache.is_current(&entry));

    cache.evict(StyleId::new(2));
    assert!(!cache.is_current(&entry));

    let fresh = cache.get_or_create(StyleId::new(2));
    assert!(cache.is_current(&fresh));
    assert!(!cache.is_current(&entry));
}

#[test]
fn test_evict_missing_style() {
    let (cache, _) = cache();
    assert!(!cache.evict(StyleId::new(1)));
    assert_eq!(cache.stats().snapshot().evictions, 0);
}

#[test]
fn test_listener_invalidates() {
    let (cache, _) = cache();
    let cache = Arc::new(cache);
    cache.get_or_create(StyleId::new(4));

    let listener: Arc<dyn StyleChangeListener> = cache.clone();
    listener.on_style_changed(StyleId::new(4));

    assert!(!cache.contains(StyleId::new(4)));
    let snapshot = cache.stats().snapshot();
    assert_eq!(snapshot.invalidations, 1);
    assert_eq!(snapshot.evictions, 1);
}

#[test]
fn test_clear() {
    let (cache, _) = cache();
    for id in 0..5 {
        cache.get_or_create(StyleId::new(id));
    }

    assert_eq!(cache.clear(), 5);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().snapshot().evictions, 5);
}

#[test]
fn test_evicted_entry_stays_usable() {
    let (cache, _) = cache();
    let entry = cache.get_or_create(StyleId::new(8));
    {
        let mut map = entry.lock();
        cache.load(&entry, &mut **map, probe_styles::VALID).unwrap();
    }

    assert!(cache.evict(StyleId::new(8)));
    // A worker holding the entry can still finish with it.
    assert!(entry.is_loaded());
}
