//! Bounded in-memory job queue.
//!
//! Submission never blocks: a full buffer is reported back to the caller
//! immediately so an HTTP handler can answer with 503 instead of stalling.

use async_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::debug;

use scribe_core::{Error, Job};

/// Why a job was not accepted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Job queue is full (capacity {0})")]
    QueueFull(usize),

    #[error("Job queue is closed")]
    Closed,
}

impl From<SubmitError> for Error {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::QueueFull(capacity) => Error::QueueFull(capacity),
            SubmitError::Closed => Error::Job("job queue is closed".to_string()),
        }
    }
}

/// FIFO multi-producer/multi-consumer queue with a fixed capacity.
///
/// Cloning is cheap and every clone refers to the same buffer.
#[derive(Clone)]
pub struct JobQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Enqueue a job without waiting.
    pub fn submit(&self, job: Job) -> Result<(), SubmitError> {
        let job_id = job.id;
        let job_kind = job.kind;
        match self.tx.try_send(job) {
            Ok(()) => {
                debug!(
                    subsystem = "jobs",
                    component = "queue",
                    %job_id,
                    %job_kind,
                    queue_depth = self.tx.len(),
                    "Job submitted"
                );
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SubmitError::QueueFull(self.capacity)),
            Err(TrySendError::Closed(_)) => Err(SubmitError::Closed),
        }
    }

    /// Number of buffered jobs.
    pub fn size(&self) -> usize {
        self.tx.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Stop accepting jobs. Buffered jobs can still be received.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub(crate) fn receiver(&self) -> Receiver<Job> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_submit_until_full() {
        let queue = JobQueue::new(2);
        assert!(queue.submit(Job::extract_video(Uuid::new_v4())).is_ok());
        assert!(queue.submit(Job::summarize(Uuid::new_v4())).is_ok());
        assert_eq!(queue.size(), 2);

        let rejected = queue.submit(Job::transcribe(Uuid::new_v4()));
        assert_eq!(rejected, Err(SubmitError::QueueFull(2)));
        assert_eq!(queue.size(), 2);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new(10);
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            queue.submit(Job::extract_video(*id)).unwrap();
        }

        let rx = queue.receiver();
        for id in &ids {
            assert_eq!(rx.recv().await.unwrap().id, *id);
        }
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn test_close_rejects_new_but_keeps_buffered() {
        let queue = JobQueue::new(4);
        let id = Uuid::new_v4();
        queue.submit(Job::extract_video(id)).unwrap();
        assert!(queue.close());
        assert!(queue.is_closed());

        assert_eq!(
            queue.submit(Job::extract_video(Uuid::new_v4())),
            Err(SubmitError::Closed)
        );

        let rx = queue.receiver();
        assert_eq!(rx.recv().await.unwrap().id, id);
        assert!(rx.recv().await.is_err());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = JobQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_submit_error_maps_to_core_error() {
        let err: Error = SubmitError::QueueFull(100).into();
        assert!(matches!(err, Error::QueueFull(100)));
        assert_eq!(err.to_string(), "Job queue is full (capacity 100)");
    }
}
