//! Bounded capture worker pool
//!
//! Events are routed to a worker by path hash, so all events for one path go
//! through one FIFO queue and are captured in arrival order. Each worker runs
//! captures on the blocking thread pool.

use crate::capture::ChangeCapture;
use rewind_core::FsEvent;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Worker pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePoolConfig {
    /// Number of capture workers (at least 1)
    pub workers: usize,
    /// Pending events per worker before `dispatch` waits
    pub queue_depth: usize,
}

impl Default for CapturePoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 256,
        }
    }
}

pub struct CapturePool {
    senders: Vec<mpsc::Sender<FsEvent>>,
    workers: Vec<JoinHandle<()>>,
}

impl CapturePool {
    /// Spawn the workers on the current tokio runtime.
    pub fn start(capture: Arc<ChangeCapture>, config: CapturePoolConfig) -> Self {
        let worker_count = config.workers.max(1);
        let queue_depth = config.queue_depth.max(1);

        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let (tx, rx) = mpsc::channel(queue_depth);
            senders.push(tx);
            workers.push(tokio::spawn(run_worker(id, Arc::clone(&capture), rx)));
        }

        tracing::debug!(
            "Capture pool started: {} workers, queue depth {}",
            worker_count,
            queue_depth
        );
        Self { senders, workers }
    }

    /// Queue an event, waiting while the owning worker's queue is full.
    pub async fn dispatch(&self, event: FsEvent) {
        let index = self.route(&event);
        if let Err(e) = self.senders[index].send(event).await {
            tracing::error!(
                "Capture worker {} is gone; dropped event for {}",
                index,
                e.0.path().display()
            );
        }
    }

    /// Stop accepting events and wait for every queued capture to finish.
    pub async fn shutdown(self) {
        drop(self.senders);
        for (id, handle) in self.workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::error!("Capture worker {} failed: {}", id, e);
            }
        }
        tracing::debug!("Capture pool drained");
    }

    fn route(&self, event: &FsEvent) -> usize {
        let mut hasher = DefaultHasher::new();
        event.path().hash(&mut hasher);
        (hasher.finish() % self.senders.len() as u64) as usize
    }
}

async fn run_worker(id: usize, capture: Arc<ChangeCapture>, mut rx: mpsc::Receiver<FsEvent>) {
    while let Some(event) = rx.recv().await {
        let capture = Arc::clone(&capture);
        let result = tokio::task::spawn_blocking(move || {
            capture.handle(&event);
        })
        .await;

        if let Err(e) = result {
            tracing::error!("Capture task on worker {} panicked: {}", id, e);
        }
    }
}
