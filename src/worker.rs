//! Worker Loop: repeatedly pop a job and run it, swallowing per-job errors
//! so one bad submission never takes the process down. The blocking pop is
//! raced against cancellation directly (spec.md §4.6) rather than checked
//! only between iterations, since it can block indefinitely on an empty
//! queue.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::processor::JobProcessor;
use crate::queue::JobQueue;

pub struct WorkerLoop {
    queue: Arc<dyn JobQueue>,
    processor: Arc<JobProcessor>,
    queue_key: String,
}

impl WorkerLoop {
    pub fn new(queue: Arc<dyn JobQueue>, processor: Arc<JobProcessor>, queue_key: String) -> Self {
        Self {
            queue,
            processor,
            queue_key,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let raw = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("worker loop cancelled, shutting down");
                    break;
                }
                popped = self.queue.blocking_pop(&self.queue_key) => popped,
            };

            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!("queue pop failed: {e}");
                    continue;
                }
            };

            if let Err(e) = self.processor.handle_raw(raw).await {
                tracing::error!("job failed: {e}");
            }
        }
    }
}
