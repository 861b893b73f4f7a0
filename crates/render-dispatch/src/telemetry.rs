//! Metrics recorded by the dispatcher.
//!
//! Uses the `metrics` facade; whichever recorder the host installs receives
//! them. Without a recorder these calls are no-ops.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::style_cache::StyleCacheStats;

/// Outcome label for `render_jobs_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Rendered,
    Fallback,
    StyleError,
    EngineError,
    Unsupported,
    Late,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Rendered => "rendered",
            JobOutcome::Fallback => "fallback",
            JobOutcome::StyleError => "style_error",
            JobOutcome::EngineError => "engine_error",
            JobOutcome::Unsupported => "unsupported",
            JobOutcome::Late => "late",
        }
    }
}

pub fn record_job(kind: &'static str, outcome: JobOutcome) {
    counter!("render_jobs_total", "kind" => kind, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_render_duration(elapsed: Duration) {
    histogram!("render_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_caller_timeout() {
    counter!("render_caller_timeouts_total").increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    if hit {
        counter!("style_cache_hits_total").increment(1);
    } else {
        counter!("style_cache_misses_total").increment(1);
    }
}

pub fn record_style_parse(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("style_cache_parses_total", "result" => result).increment(1);
}

pub fn record_eviction(reason: &'static str) {
    counter!("style_cache_evictions_total", "reason" => reason).increment(1);
}

/// Publish cache gauges from a stats snapshot.
pub fn record_cache_stats(stats: &StyleCacheStats, entries: usize) {
    gauge!("style_cache_entries").set(entries as f64);
    gauge!("style_cache_hit_rate").set(stats.hit_rate());
}
