//! Render dispatch engine.
//!
//! Serializes all use of a rendering engine that is not safe for concurrent
//! use through one job queue and a fixed pool of worker threads:
//!
//! ```text
//! caller ─► Dispatcher::submit ─► JobQueue ─► WorkerPool ─► StyleCache ─► engine
//!    ▲                                              │
//!    └──────────── ResultReceiver ◄── ResultSink ◄──┘  (crop to target box)
//! ```
//!
//! - Each style document is parsed once into prepared engine state and
//!   reused; failed parses are not cached.
//! - Callers wait at most the render timeout; a render that overruns is not
//!   cancelled and its result is discarded.
//! - Without an engine every image job gets a 256x256 transparent image.

pub mod config;
pub mod dispatcher;
pub mod options;
pub mod queue;
pub mod request;
pub mod sink;
pub mod style_cache;
pub mod telemetry;
pub mod worker;

pub use config::{ConfigError, DispatchConfig};
pub use dispatcher::{Dispatcher, StartError};
pub use options::{LegendOptions, RenderJob, RenderOptions};
pub use queue::{JobQueue, QueuedJob};
pub use request::StyleRenderRequest;
pub use sink::{result_channel, JobResult, ResultReceiver, ResultSink};
pub use style_cache::{
    CacheEntry, StyleCache, StyleCacheSnapshot, StyleCacheStats, StyleChangeListener,
};
pub use worker::{WorkerPool, WorkerSettings};
