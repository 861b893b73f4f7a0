//! Render worker threads.
//!
//! Each worker is a long-lived OS thread pulling `(job, sink)` pairs from
//! the shared queue. A worker leaves its loop only when the queue is closed;
//! every job failure, including an engine panic, becomes a result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::Receiver;
use map_common::{RenderError, RenderResult};
use renderer::RenderedImage;
use tracing::{debug, error, info, warn};

use crate::options::{LegendOptions, RenderOptions, RenderJob};
use crate::queue::QueuedJob;
use crate::sink::ResultSink;
use crate::style_cache::StyleCache;
use crate::telemetry::{self, JobOutcome};

/// Settings shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub render_timeout: Duration,
    pub strict_styles: bool,
}

/// Fixed set of render worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers reading from `jobs`. `count` must be non-zero.
    ///
    /// `cache` is `None` when no engine is available; workers then answer
    /// image jobs with the fallback image.
    pub fn spawn(
        count: usize,
        jobs: Receiver<QueuedJob>,
        cache: Option<Arc<StyleCache>>,
        settings: WorkerSettings,
    ) -> std::io::Result<Self> {
        if count == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "render worker pool needs at least one thread",
            ));
        }

        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let worker = Worker {
                id,
                cache: cache.clone(),
                settings: settings.clone(),
            };
            let rx = jobs.clone();
            let handle = thread::Builder::new()
                .name(format!("render-worker-{}", id))
                .spawn(move || worker.run(rx))?;
            handles.push(handle);
        }

        Ok(Self { handles })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit. Workers exit once the queue is closed
    /// and drained, so close the queue first.
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("render-worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "Render worker terminated abnormally");
            }
        }
    }
}

struct Worker {
    id: usize,
    cache: Option<Arc<StyleCache>>,
    settings: WorkerSettings,
}

impl Worker {
    fn run(self, jobs: Receiver<QueuedJob>) {
        info!(worker = self.id, "Render worker started");

        for QueuedJob { job, sink } in jobs.iter() {
            match job {
                RenderJob::Image(options) => self.handle_image(&options, sink),
                RenderJob::Legend(legend) => self.handle_legend(&legend, sink),
            }
        }

        info!(worker = self.id, "Render worker stopped");
    }

    fn handle_legend(&self, legend: &LegendOptions, sink: ResultSink) {
        error!(
            worker = self.id,
            layer = %legend.layer_name,
            geometry_type = %legend.geometry_type,
            "Legend rendering is not supported"
        );
        telemetry::record_job("legend", JobOutcome::Unsupported);
        sink.put(Err(RenderError::Unsupported(
            "legend rendering".to_string(),
        )));
    }

    fn handle_image(&self, options: &RenderOptions, sink: ResultSink) {
        let style_id = options.style_id();

        let Some(cache) = &self.cache else {
            error!(
                worker = self.id,
                style_id = %style_id,
                "Rendering engine unavailable, returning fallback image"
            );
            telemetry::record_job("image", JobOutcome::Fallback);
            sink.put(Ok(RenderedImage::fallback()));
            return;
        };

        if sink.is_abandoned() {
            debug!(worker = self.id, style_id = %style_id, "Caller gone before render started, skipping");
            telemetry::record_job("image", JobOutcome::Late);
            return;
        }

        debug!(
            worker = self.id,
            style_id = %style_id,
            width = options.render_size().width,
            height = options.render_size().height,
            "Render started"
        );

        let start = Instant::now();
        let (outcome, result) = render_with_cache(cache, options, self.settings.strict_styles);
        let elapsed = start.elapsed();
        telemetry::record_render_duration(elapsed);

        if elapsed > self.settings.render_timeout {
            error!(
                worker = self.id,
                style_id = %style_id,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = self.settings.render_timeout.as_millis() as u64,
                "Render exceeded timeout, discarding result"
            );
            telemetry::record_job("image", JobOutcome::Late);
            return;
        }

        debug!(
            worker = self.id,
            style_id = %style_id,
            elapsed_ms = elapsed.as_millis() as u64,
            outcome = outcome.as_str(),
            "Render finished"
        );
        telemetry::record_job("image", outcome);
        telemetry::record_cache_stats(&cache.stats(), cache.len());

        if !sink.put(result) {
            debug!(worker = self.id, style_id = %style_id, "Caller gone, result dropped");
        }
    }
}

/// Bound on refetching an entry evicted under a waiting worker.
const MAX_ENTRY_REFETCH: usize = 3;

/// Resolve the style, frame, draw and crop one image job.
fn render_with_cache(
    cache: &StyleCache,
    options: &RenderOptions,
    strict_styles: bool,
) -> (JobOutcome, RenderResult<RenderedImage>) {
    let style_id = options.style_id();
    let mut entry = cache.get_or_create(style_id);
    let mut refetched = 0;

    let drawn = loop {
        let mut map = entry.lock();

        if !map.is_loaded() {
            // An entry evicted while we waited for its lock is no longer
            // indexed; load into the current one instead.
            if refetched < MAX_ENTRY_REFETCH && !cache.is_current(&entry) {
                drop(map);
                debug!(style_id = %style_id, "Cache entry evicted while waiting, refetching");
                entry = cache.get_or_create(style_id);
                refetched += 1;
                continue;
            }

            if let Err(e) = cache.load(&entry, &mut **map, options.style_document()) {
                return if strict_styles {
                    (
                        JobOutcome::StyleError,
                        Err(RenderError::StyleLoad {
                            style_id,
                            message: e.to_string(),
                        }),
                    )
                } else {
                    (JobOutcome::Fallback, Ok(RenderedImage::fallback()))
                };
            }
        }

        break panic::catch_unwind(AssertUnwindSafe(|| {
            map.resize(options.render_size());
            map.zoom_to_box(options.extended_box());
            map.render()
        }));
    };

    match drawn {
        Ok(Ok(image)) => match image.crop(options.target_box()) {
            Ok(cropped) => (JobOutcome::Rendered, Ok(cropped)),
            Err(e) => {
                warn!(style_id = %style_id, error = %e, "Rendered image could not be cropped");
                (JobOutcome::EngineError, Err(RenderError::Engine(e.to_string())))
            }
        },
        Ok(Err(e)) => {
            warn!(style_id = %style_id, error = %e, "Engine failed to render");
            cache.evict_entry(&entry, "engine_error");
            (JobOutcome::EngineError, Err(RenderError::Engine(e.to_string())))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(style_id = %style_id, panic = %message, "Engine panicked during render");
            cache.evict_entry(&entry, "engine_panic");
            (
                JobOutcome::EngineError,
                Err(RenderError::Engine(format!("engine panicked: {}", message))),
            )
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
