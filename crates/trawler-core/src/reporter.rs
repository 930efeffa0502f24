use std::time::Duration;

use crate::error::{CrawlError, TransportError};
use crate::stats::CrawlStats;

/// Events emitted by the engine for monitoring/logging.
#[derive(Debug, Clone, Copy)]
pub enum CrawlEvent<'a> {
    RunStarted {
        workers: usize,
        pending: usize,
    },
    WorkerStarted {
        worker_id: usize,
    },
    TaskStarted {
        worker_id: usize,
        key: &'a str,
    },
    DuplicateSkipped {
        key: &'a str,
    },
    AttemptFailed {
        key: &'a str,
        attempt: u32,
        error: &'a TransportError,
        retry_in: Option<Duration>,
    },
    TaskCompleted {
        worker_id: usize,
        key: &'a str,
        status: u16,
        discovered: usize,
        items: usize,
    },
    TaskFailed {
        worker_id: usize,
        key: &'a str,
        error: &'a CrawlError,
    },
    ItemRejected {
        key: &'a str,
        stage: &'a str,
        error: &'a CrawlError,
    },
    WorkerStopped {
        worker_id: usize,
    },
    RunFinished {
        stats: &'a CrawlStats,
        cancelled: bool,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::RunStarted { workers, pending } => {
                tracing::info!(%workers, %pending, "Crawl started");
            }
            CrawlEvent::WorkerStarted { worker_id } => {
                tracing::debug!(%worker_id, "Worker started");
            }
            CrawlEvent::TaskStarted { worker_id, key } => {
                tracing::debug!(%worker_id, %key, "Processing task");
            }
            CrawlEvent::DuplicateSkipped { key } => {
                tracing::trace!(%key, "Duplicate task skipped");
            }
            CrawlEvent::AttemptFailed {
                key,
                attempt,
                error,
                retry_in,
            } => match retry_in {
                Some(delay) => tracing::debug!(
                    %key,
                    %attempt,
                    %error,
                    delay_ms = %delay.as_millis(),
                    "Attempt failed, retrying"
                ),
                None => tracing::debug!(%key, %attempt, %error, "Attempt failed, giving up"),
            },
            CrawlEvent::TaskCompleted {
                worker_id,
                key,
                status,
                discovered,
                items,
            } => {
                tracing::info!(%worker_id, %key, %status, %discovered, %items, "Task completed");
            }
            CrawlEvent::TaskFailed {
                worker_id,
                key,
                error,
            } => {
                tracing::warn!(%worker_id, %key, %error, "Task failed");
            }
            CrawlEvent::ItemRejected { key, stage, error } => {
                tracing::warn!(%key, %stage, %error, "Item rejected by pipeline");
            }
            CrawlEvent::WorkerStopped { worker_id } => {
                tracing::debug!(%worker_id, "Worker stopped");
            }
            CrawlEvent::RunFinished { stats, cancelled } => {
                tracing::info!(
                    succeeded = stats.tasks_succeeded,
                    failed = stats.tasks_failed,
                    retries = stats.retries,
                    items = stats.items_processed,
                    rejected = stats.items_rejected,
                    elapsed_ms = %stats.elapsed.as_millis(),
                    %cancelled,
                    "Crawl finished"
                );
            }
        }
    }
}
