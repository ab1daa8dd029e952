use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use tracing::debug;

/// Progress counters shared by the stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    BlocksEnqueued,
    BlocksUploaded,
    ChunksDownloaded,
    ChunksProcessed,
    TotalChunks,
}

#[derive(Debug)]
struct InnerController {
    blocks_enqueued: Mutex<u64>,
    blocks_uploaded: Mutex<u64>,
    chunks_downloaded: Mutex<u64>,
    chunks_processed: Mutex<u64>,
    total_chunks: Mutex<u64>,
    enqueuing: AtomicBool,
}

/// Coordinates the stages of a run. Counters only ever grow, and
/// `enqueuing` flips to false exactly once.
#[derive(Debug, Clone)]
pub struct ThreadController {
    inner: Arc<InnerController>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub blocks_enqueued: u64,
    pub blocks_uploaded: u64,
    pub chunks_downloaded: u64,
    pub chunks_processed: u64,
    pub total_chunks: u64,
    pub done_enqueuing: bool,
}

impl ThreadController {
    pub fn new() -> Self {
        ThreadController {
            inner: Arc::new(InnerController {
                blocks_enqueued: Mutex::new(0),
                blocks_uploaded: Mutex::new(0),
                chunks_downloaded: Mutex::new(0),
                chunks_processed: Mutex::new(0),
                total_chunks: Mutex::new(0),
                enqueuing: AtomicBool::new(true),
            }),
        }
    }

    fn slot(&self, counter: Counter) -> &Mutex<u64> {
        match counter {
            Counter::BlocksEnqueued => &self.inner.blocks_enqueued,
            Counter::BlocksUploaded => &self.inner.blocks_uploaded,
            Counter::ChunksDownloaded => &self.inner.chunks_downloaded,
            Counter::ChunksProcessed => &self.inner.chunks_processed,
            Counter::TotalChunks => &self.inner.total_chunks,
        }
    }

    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, count: u64) {
        let mut value = self
            .slot(counter)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *value += count;
    }

    pub fn get(&self, counter: Counter) -> u64 {
        *self
            .slot(counter)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn done_enqueuing(&self) {
        if self.inner.enqueuing.swap(false, Ordering::AcqRel) {
            debug!("set done_enqueuing");
        }
    }

    pub fn is_done_enqueuing(&self) -> bool {
        !self.inner.enqueuing.load(Ordering::Acquire)
    }

    /// Every enqueued block has been accepted by the server.
    pub fn uploads_settled(&self) -> bool {
        self.is_done_enqueuing()
            && self.get(Counter::BlocksUploaded) >= self.get(Counter::BlocksEnqueued)
    }

    pub fn downloads_settled(&self) -> bool {
        self.is_done_enqueuing()
            && self.get(Counter::ChunksDownloaded) >= self.get(Counter::TotalChunks)
    }

    pub fn processing_settled(&self) -> bool {
        self.is_done_enqueuing()
            && self.get(Counter::ChunksProcessed) >= self.get(Counter::TotalChunks)
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            blocks_enqueued: self.get(Counter::BlocksEnqueued),
            blocks_uploaded: self.get(Counter::BlocksUploaded),
            chunks_downloaded: self.get(Counter::ChunksDownloaded),
            chunks_processed: self.get(Counter::ChunksProcessed),
            total_chunks: self.get(Counter::TotalChunks),
            done_enqueuing: self.is_done_enqueuing(),
        }
    }
}

impl Default for ThreadController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_enqueuing_with_zero_counters() {
        let controller = ThreadController::new();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot, ControllerSnapshot::default());
        assert!(!controller.is_done_enqueuing());
        assert!(!controller.uploads_settled());
    }

    #[test]
    fn settles_only_after_enqueuing_is_done() {
        let controller = ThreadController::new();
        controller.increment(Counter::BlocksEnqueued);
        controller.add(Counter::TotalChunks, 2);
        controller.increment(Counter::BlocksUploaded);
        controller.add(Counter::ChunksDownloaded, 2);
        assert!(!controller.uploads_settled());
        assert!(!controller.downloads_settled());

        controller.done_enqueuing();
        controller.done_enqueuing();
        assert!(controller.uploads_settled());
        assert!(controller.downloads_settled());
        assert!(!controller.processing_settled());

        controller.add(Counter::ChunksProcessed, 2);
        assert!(controller.processing_settled());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let controller = ThreadController::new();
        thread::scope(|s| {
            for _ in 0..8 {
                let controller = controller.clone();
                s.spawn(move || {
                    for _ in 0..1000 {
                        controller.increment(Counter::ChunksProcessed);
                    }
                });
            }
        });
        assert_eq!(controller.get(Counter::ChunksProcessed), 8000);
    }
}
