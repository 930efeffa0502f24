use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Summary of one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
    pub retries: usize,
    pub duplicates_skipped: usize,
    pub items_processed: usize,
    pub items_rejected: usize,
    pub elapsed: Duration,
}

impl CrawlStats {
    pub fn tasks_executed(&self) -> usize {
        self.tasks_succeeded + self.tasks_failed
    }
}

/// Lock-free counters updated by workers while a run is in progress.
#[derive(Debug)]
pub(crate) struct StatCollector {
    tasks_succeeded: AtomicUsize,
    tasks_failed: AtomicUsize,
    retries: AtomicUsize,
    duplicates_skipped: AtomicUsize,
    items_processed: AtomicUsize,
    items_rejected: AtomicUsize,
    started: Mutex<Option<Instant>>,
}

impl StatCollector {
    pub(crate) fn new() -> Self {
        Self {
            tasks_succeeded: AtomicUsize::new(0),
            tasks_failed: AtomicUsize::new(0),
            retries: AtomicUsize::new(0),
            duplicates_skipped: AtomicUsize::new(0),
            items_processed: AtomicUsize::new(0),
            items_rejected: AtomicUsize::new(0),
            started: Mutex::new(None),
        }
    }

    pub(crate) fn mark_started(&self) {
        let mut started = self.started.lock().unwrap_or_else(|p| p.into_inner());
        started.get_or_insert_with(Instant::now);
    }

    pub(crate) fn task_succeeded(&self) {
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn duplicate_skipped(&self) {
        self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn item_processed(&self) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn item_rejected(&self) {
        self.items_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CrawlStats {
        let elapsed = self
            .started
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map(|t| t.elapsed())
            .unwrap_or_default();

        CrawlStats {
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            elapsed,
        }
    }
}
