//! FIFO job queue shared by callers and workers.

use std::time::Duration;

use flume::{Receiver, SendTimeoutError, Sender};
use map_common::{RenderError, RenderResult};

use crate::options::RenderJob;
use crate::sink::ResultSink;

/// A job paired with the sink its result goes to.
#[derive(Debug)]
pub struct QueuedJob {
    pub job: RenderJob,
    pub sink: ResultSink,
}

/// Producer side of the job queue. Cloning shares the queue.
///
/// flume gives MPMC semantics: every worker holds a clone of the receiver
/// and pulls from the same queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: Sender<QueuedJob>,
}

impl JobQueue {
    /// Create the queue, bounded when `capacity` is set.
    pub fn new(capacity: Option<usize>) -> (Self, Receiver<QueuedJob>) {
        let (tx, rx) = match capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };
        (Self { tx }, rx)
    }

    /// Enqueue a job, waiting up to `timeout` for space in a bounded queue.
    pub fn push(&self, job: QueuedJob, timeout: Duration) -> RenderResult<()> {
        match self.tx.send_timeout(job, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(RenderError::Timeout { waited: timeout }),
            Err(SendTimeoutError::Disconnected(_)) => Err(RenderError::Dropped),
        }
    }

    /// Jobs waiting for a worker.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}
