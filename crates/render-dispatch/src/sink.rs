//! Single-use hand-off of one render result from a worker to its caller.

use std::time::Duration;

use flume::{RecvTimeoutError, TrySendError};
use map_common::{RenderError, RenderResult};
use renderer::RenderedImage;

/// Result published by a worker.
pub type JobResult = RenderResult<RenderedImage>;

/// Producer half. Consumed by [`ResultSink::put`], so a result can be
/// published at most once.
#[derive(Debug)]
pub struct ResultSink {
    tx: flume::Sender<JobResult>,
}

/// Consumer half, owned by the waiting caller.
#[derive(Debug)]
pub struct ResultReceiver {
    rx: flume::Receiver<JobResult>,
}

/// Create a connected sink/receiver pair with room for one result.
pub fn result_channel() -> (ResultSink, ResultReceiver) {
    let (tx, rx) = flume::bounded(1);
    (ResultSink { tx }, ResultReceiver { rx })
}

impl ResultSink {
    /// Publish the result. Returns `false` when the caller is gone.
    pub fn put(self, result: JobResult) -> bool {
        match self.tx.try_send(result) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(_)) | Err(TrySendError::Full(_)) => false,
        }
    }

    /// True once the caller has stopped waiting.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_disconnected()
    }
}

impl ResultReceiver {
    /// Wait up to `timeout` for the result.
    ///
    /// Expiry yields [`RenderError::Timeout`]; a sink dropped without a
    /// result yields [`RenderError::Dropped`].
    pub fn wait(self, timeout: Duration) -> JobResult {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(RenderError::Timeout { waited: timeout }),
            Err(RecvTimeoutError::Disconnected) => Err(RenderError::Dropped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_put_then_wait() {
        let (sink, receiver) = result_channel();
        assert!(sink.put(Ok(RenderedImage::fallback())));
        let image = receiver.wait(Duration::from_secs(1)).unwrap();
        assert_eq!(image, RenderedImage::fallback());
    }

    #[test]
    fn test_wait_times_out() {
        let (_sink, receiver) = result_channel();
        let start = Instant::now();
        let err = receiver.wait(Duration::from_millis(50)).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_dropped_sink() {
        let (sink, receiver) = result_channel();
        drop(sink);
        assert!(matches!(
            receiver.wait(Duration::from_secs(1)),
            Err(RenderError::Dropped)
        ));
    }

    #[test]
    fn test_put_after_caller_left() {
        let (sink, receiver) = result_channel();
        drop(receiver);
        assert!(sink.is_abandoned());
        assert!(!sink.put(Ok(RenderedImage::fallback())));
    }
}
