//! Synchronous entry point for render callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use map_common::{BoundingBox, ImageSize, RenderError, RenderResult, StyleId};
use renderer::{RenderEngine, RenderedImage};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, DispatchConfig};
use crate::options::{LegendOptions, RenderJob, RenderOptions};
use crate::queue::{JobQueue, QueuedJob};
use crate::request::StyleRenderRequest;
use crate::sink::result_channel;
use crate::style_cache::{StyleCache, StyleCacheSnapshot, StyleChangeListener};
use crate::telemetry;
use crate::worker::{WorkerPool, WorkerSettings};

/// Failure to bring the dispatcher up.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Render dispatcher: a job queue, a pool of render workers and the style
/// cache they share.
///
/// Callers block in [`Dispatcher::submit`] for at most the render timeout.
/// The dispatcher is `Sync`; share it behind an `Arc`.
pub struct Dispatcher {
    config: DispatchConfig,
    queue: Option<JobQueue>,
    workers: Option<WorkerPool>,
    cache: Option<Arc<StyleCache>>,
}

impl Dispatcher {
    /// Start the workers.
    ///
    /// `engine` is `None` when no rendering backend could be initialised;
    /// every image job is then answered with the fallback image.
    pub fn start(
        config: DispatchConfig,
        engine: Option<Arc<dyn RenderEngine>>,
    ) -> Result<Self, StartError> {
        config.validate()?;

        let engine_name = engine.as_ref().map(|e| e.name().to_string());
        if engine.is_none() {
            warn!("Rendering engine unavailable; image requests will receive the fallback image");
        }
        let cache = engine.map(|engine| Arc::new(StyleCache::new(engine)));

        let (queue, jobs) = JobQueue::new(config.queue_capacity);
        let workers = WorkerPool::spawn(
            config.thread_count,
            jobs,
            cache.clone(),
            WorkerSettings {
                render_timeout: config.render_timeout(),
                strict_styles: config.strict_styles,
            },
        )?;

        info!(
            threads = workers.size(),
            render_timeout_secs = config.render_timeout_secs,
            queue_capacity = ?config.queue_capacity,
            engine = ?engine_name,
            "Render dispatcher started"
        );

        Ok(Self {
            config,
            queue: Some(queue),
            workers: Some(workers),
            cache,
        })
    }

    /// Start with the engine compiled into the `renderer` crate.
    pub fn with_default_engine(config: DispatchConfig) -> Result<Self, StartError> {
        let engine = renderer::default_engine(config.font_path.as_deref());
        Self::start(config, engine)
    }

    /// Enqueue a job and wait for its result.
    ///
    /// Waiting for queue space and waiting for the result share one
    /// deadline: the render timeout. Expiry returns
    /// [`RenderError::Timeout`]; the render itself is not cancelled.
    pub fn submit(&self, job: impl Into<RenderJob>) -> RenderResult<RenderedImage> {
        let job = job.into();
        let timeout = self.config.render_timeout();
        let queue = self.queue.as_ref().ok_or(RenderError::Dropped)?;

        let start = Instant::now();
        let (sink, receiver) = result_channel();

        if let Err(e) = queue.push(QueuedJob { job, sink }, timeout) {
            if e.is_timeout() {
                warn!(timeout_secs = timeout.as_secs_f64(), "Render queue full");
                telemetry::record_caller_timeout();
            }
            return Err(e);
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        match receiver.wait(remaining) {
            Err(RenderError::Timeout { .. }) => {
                let waited = start.elapsed();
                warn!(waited_ms = waited.as_millis() as u64, "Render timed out");
                telemetry::record_caller_timeout();
                Err(RenderError::Timeout { waited })
            }
            other => other,
        }
    }

    /// Render `extent` at `size` pixels, drawing `padding` extra pixels on
    /// every side and cropping them away.
    pub fn render_image(
        &self,
        style_id: StyleId,
        style_document: impl Into<Arc<str>>,
        extent: &BoundingBox,
        size: ImageSize,
        padding: u32,
    ) -> RenderResult<RenderedImage> {
        let options = RenderOptions::for_extent(style_id, style_document, extent, size, padding)?;
        self.submit(options)
    }

    /// Legend rendering is unsupported; always fails with
    /// [`RenderError::Unsupported`].
    pub fn render_legend(
        &self,
        style_document: impl Into<Arc<str>>,
        geometry_type: &str,
        layer_name: &str,
    ) -> RenderResult<RenderedImage> {
        self.submit(LegendOptions::new(style_document, geometry_type, layer_name))
    }

    /// Request builder bound to one style.
    pub fn style_request(
        &self,
        style_id: StyleId,
        style_document: impl Into<Arc<str>>,
    ) -> StyleRenderRequest<'_> {
        StyleRenderRequest::new(self, style_id, style_document)
    }

    /// Listener to hand to the style storage layer.
    pub fn invalidator(&self) -> Arc<dyn StyleChangeListener> {
        Arc::new(CacheInvalidator {
            cache: self.cache.clone(),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Advisory highest zoom level.
    pub fn max_zoom(&self) -> u32 {
        self.config.max_zoom
    }

    pub fn render_timeout(&self) -> Duration {
        self.config.render_timeout()
    }

    pub fn engine_available(&self) -> bool {
        self.cache.is_some()
    }

    /// The style cache, absent when no engine is available.
    pub fn cache(&self) -> Option<&Arc<StyleCache>> {
        self.cache.as_ref()
    }

    pub fn cache_stats(&self) -> Option<StyleCacheSnapshot> {
        self.cache.as_ref().map(|cache| cache.stats().snapshot())
    }

    /// Jobs waiting for a worker.
    pub fn queued_jobs(&self) -> usize {
        self.queue.as_ref().map_or(0, JobQueue::len)
    }

    pub fn thread_count(&self) -> usize {
        self.workers.as_ref().map_or(0, WorkerPool::size)
    }

    /// Close the queue, let workers finish queued jobs, and join them.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the only sender closes the queue
        let Some(queue) = self.queue.take() else {
            return;
        };
        let pending = queue.len();
        drop(queue);

        if let Some(workers) = self.workers.take() {
            info!(pending, "Render dispatcher shutting down");
            workers.join();
        }
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        info!("Render dispatcher stopped");
    }
}

impl StyleChangeListener for Dispatcher {
    fn on_style_changed(&self, style_id: StyleId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(style_id);
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("threads", &self.thread_count())
            .field("engine_available", &self.engine_available())
            .finish()
    }
}

struct CacheInvalidator {
    cache: Option<Arc<StyleCache>>,
}

impl StyleChangeListener for CacheInvalidator {
    fn on_style_changed(&self, style_id: StyleId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(style_id);
        }
    }
}
