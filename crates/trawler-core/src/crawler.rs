//! The crawl engine: a fixed pool of logical workers draining a shared frontier.
//!
//! ```text
//! take task -> request middleware -> transport (+ retry) -> response middleware
//!           -> handler -> enqueue `next` -> items through every stage -> pause
//! ```
//!
//! Workers run as futures joined on the caller's task. A worker finding the
//! frontier empty waits while any sibling is still executing a task (it may
//! discover more work) and stops only once the frontier is empty and
//! nothing is in flight. Every per-task failure is reported and swallowed at
//! the worker loop; it never stops a worker.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::pin;
use std::sync::{Mutex, MutexGuard};

use futures::future::join_all;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, TransportError};
use crate::frontier::Frontier;
use crate::reporter::{CrawlEvent, CrawlReporter, TracingCrawlReporter};
use crate::retry::RetryPolicy;
use crate::stats::{CrawlStats, StatCollector};
use crate::task::{RawResponse, RequestSpec, ResponseContext, Task};
use crate::traits::{PipelineStage, RequestMiddleware, ResponseMiddleware, Transport};

/// Frontier plus the number of tasks currently being executed.
struct Scheduler<I> {
    frontier: Frontier<I>,
    in_flight: usize,
}

enum Next<I> {
    Task(Task<I>),
    Wait,
    Done,
}

/// Per-task summary handed back to the worker loop.
struct TaskOutcome {
    status: u16,
    discovered: usize,
    items: usize,
}

pub struct Crawler<T, I> {
    transport: T,
    config: CrawlerConfig,
    retry: RetryPolicy,
    request_middleware: Vec<Box<dyn RequestMiddleware>>,
    response_middleware: Vec<Box<dyn ResponseMiddleware>>,
    stages: Vec<Box<dyn PipelineStage<I>>>,
    reporter: Box<dyn CrawlReporter>,
    scheduler: Mutex<Scheduler<I>>,
    wake: Notify,
    stats: StatCollector,
}

impl<T, I> Crawler<T, I>
where
    T: Transport,
    I: Send + Sync + 'static,
{
    pub fn new(transport: T, config: CrawlerConfig) -> Result<Self, CrawlError> {
        config.validate()?;
        Ok(Self {
            transport,
            retry: config.retry_policy(),
            config,
            request_middleware: Vec::new(),
            response_middleware: Vec::new(),
            stages: Vec::new(),
            reporter: Box::new(TracingCrawlReporter),
            scheduler: Mutex::new(Scheduler {
                frontier: Frontier::new(),
                in_flight: 0,
            }),
            wake: Notify::new(),
            stats: StatCollector::new(),
        })
    }

    /// Append a request middleware. Registration order is execution order.
    pub fn with_request_middleware(mut self, middleware: impl RequestMiddleware + 'static) -> Self {
        self.request_middleware.push(Box::new(middleware));
        self
    }

    /// Append a response middleware. Registration order is execution order.
    pub fn with_response_middleware(
        mut self,
        middleware: impl ResponseMiddleware + 'static,
    ) -> Self {
        self.response_middleware.push(Box::new(middleware));
        self
    }

    /// Append a pipeline stage. Registration order is execution order.
    pub fn with_stage(mut self, stage: impl PipelineStage<I> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Replace the default [`TracingCrawlReporter`].
    pub fn with_reporter(mut self, reporter: impl CrawlReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Queue a task. Returns false if its key was already accepted once.
    ///
    /// Safe to call while a run is in progress; idle workers are woken.
    pub fn add(&self, task: Task<I>) -> bool {
        let key = task.key().to_string();
        let accepted = self.lock_scheduler().frontier.add(task);
        if accepted {
            self.wake.notify_waiters();
        } else {
            self.stats.duplicate_skipped();
            self.reporter.report(CrawlEvent::DuplicateSkipped { key: &key });
        }
        accepted
    }

    /// Tasks waiting in the frontier.
    pub fn pending(&self) -> usize {
        self.lock_scheduler().frontier.size()
    }

    /// Run until the frontier is drained and no task is in flight.
    pub async fn start(&self) -> CrawlStats {
        self.run(CancellationToken::new()).await
    }

    /// Like [`start`](Self::start), but stops early once `cancel` fires.
    ///
    /// Tasks not yet taken stay in the frontier. A task interrupted during a
    /// retry sleep, a pipeline stage or before it began is reported failed
    /// with [`CrawlError::Cancelled`].
    pub async fn run(&self, cancel: CancellationToken) -> CrawlStats {
        self.stats.mark_started();
        self.reporter.report(CrawlEvent::RunStarted {
            workers: self.config.concurrency,
            pending: self.pending(),
        });

        join_all((0..self.config.concurrency).map(|worker_id| self.worker(worker_id, &cancel)))
            .await;

        let stats = self.stats.snapshot();
        self.reporter.report(CrawlEvent::RunFinished {
            stats: &stats,
            cancelled: cancel.is_cancelled(),
        });
        stats
    }

    async fn worker(&self, worker_id: usize, cancel: &CancellationToken) {
        self.reporter.report(CrawlEvent::WorkerStarted { worker_id });

        while let Some(task) = self.next_task(cancel).await {
            let key = task.key().to_string();
            self.reporter.report(CrawlEvent::TaskStarted {
                worker_id,
                key: &key,
            });

            match self.execute(task, cancel).await {
                Ok(outcome) => {
                    self.stats.task_succeeded();
                    self.reporter.report(CrawlEvent::TaskCompleted {
                        worker_id,
                        key: &key,
                        status: outcome.status,
                        discovered: outcome.discovered,
                        items: outcome.items,
                    });
                }
                Err(error) => {
                    self.stats.task_failed();
                    self.reporter.report(CrawlEvent::TaskFailed {
                        worker_id,
                        key: &key,
                        error: &error,
                    });
                }
            }
            self.finish_task();

            if !self.config.interval.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.config.interval) => {}
                    () = cancel.cancelled() => break,
                }
            }
        }

        self.reporter.report(CrawlEvent::WorkerStopped { worker_id });
    }

    /// Take the next task, waiting while the frontier is empty but siblings
    /// are still busy. `None` means the run is over for this worker.
    async fn next_task(&self, cancel: &CancellationToken) -> Option<Task<I>> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            // Register interest before inspecting state so a wake-up sent
            // between the check and the await is not lost.
            let mut notified = pin!(self.wake.notified());
            notified.as_mut().enable();

            match self.poll_scheduler() {
                Next::Task(task) => return Some(task),
                Next::Done => return None,
                Next::Wait => {}
            }

            tokio::select! {
                () = &mut notified => {}
                () = cancel.cancelled() => return None,
            }
        }
    }

    fn poll_scheduler(&self) -> Next<I> {
        let mut scheduler = self.lock_scheduler();
        match scheduler.frontier.take() {
            Some(task) => {
                scheduler.in_flight += 1;
                Next::Task(task)
            }
            None if scheduler.in_flight == 0 => Next::Done,
            None => Next::Wait,
        }
    }

    fn finish_task(&self) {
        {
            let mut scheduler = self.lock_scheduler();
            scheduler.in_flight = scheduler.in_flight.saturating_sub(1);
        }
        self.wake.notify_waiters();
    }

    async fn execute(
        &self,
        task: Task<I>,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, CrawlError> {
        let (key, request, handler) = task.into_parts();

        let mut spec = request.unwrap_or_else(|| self.config.base_request());
        for middleware in &self.request_middleware {
            spec = middleware.process(&key, spec)?;
        }

        let response = self.fetch_with_retry(&key, &spec, cancel).await?;

        for middleware in &self.response_middleware {
            middleware.inspect(&key, &response)?;
        }

        let ctx = ResponseContext::new(key.clone(), response);
        let result = catch_unwind(AssertUnwindSafe(|| handler(&ctx)))
            .map_err(|payload| CrawlError::handler(panic_message(&*payload)))??;

        let mut discovered = 0;
        for next in result.next {
            if self.add(next) {
                discovered += 1;
            }
        }

        let items = result.items.len();
        for item in &result.items {
            self.process_item(&key, item, cancel).await?;
        }

        Ok(TaskOutcome {
            status: ctx.status,
            discovered,
            items,
        })
    }

    async fn fetch_with_retry(
        &self,
        key: &str,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, CrawlError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = tokio::time::timeout(spec.timeout, self.transport.request(key, spec))
                .await
                .unwrap_or(Err(TransportError::Timeout(spec.timeout)));

            let error = match result {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let retry_in = self
                .retry
                .should_retry(attempt)
                .then(|| self.retry.delay_for_attempt(attempt));
            self.reporter.report(CrawlEvent::AttemptFailed {
                key,
                attempt,
                error: &error,
                retry_in,
            });

            let Some(delay) = retry_in else {
                return Err(CrawlError::Transport {
                    key: key.to_string(),
                    attempts: attempt,
                    source: error,
                });
            };

            self.stats.retried();
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return Err(CrawlError::Cancelled),
            }
        }
    }

    /// Feed one item through every stage in order. A rejection skips the
    /// remaining stages for this item only.
    async fn process_item(
        &self,
        key: &str,
        item: &I,
        cancel: &CancellationToken,
    ) -> Result<(), CrawlError> {
        for stage in &self.stages {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            if let Err(error) = stage.process(item).await {
                self.stats.item_rejected();
                self.reporter.report(CrawlEvent::ItemRejected {
                    key,
                    stage: stage.name(),
                    error: &error,
                });
                return Ok(());
            }
        }
        self.stats.item_processed();
        Ok(())
    }

    /// Acquires the scheduler lock, recovering from poison if necessary.
    fn lock_scheduler(&self) -> MutexGuard<'_, Scheduler<I>> {
        self.scheduler.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned scheduler mutex");
            poisoned.into_inner()
        })
    }
}

/// Turns a handler panic into the message carried by [`CrawlError::Handler`].
fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    format!("handler panicked: {detail}")
}
