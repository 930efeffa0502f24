//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::error::{CrawlError, TransportError};
use crate::reporter::{CrawlEvent, CrawlReporter};
use crate::task::{RawResponse, RequestSpec};
use crate::traits::{PipelineStage, Transport};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// A recorded transport call: (key, spec, time of call).
pub type TransportCall = (String, RequestSpec, Instant);

/// Mock transport replaying a scripted sequence of outcomes.
#[derive(Clone)]
pub struct MockTransport {
    /// Each call pops the front. When empty, `fallback` is returned.
    script: Arc<Mutex<VecDeque<Result<RawResponse, TransportError>>>>,
    fallback: Result<RawResponse, TransportError>,
    latency: Duration,
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl MockTransport {
    /// Every call succeeds with the given status and body.
    pub fn ok(status: u16, body: &str) -> Self {
        Self::scripted(Vec::new(), Ok(RawResponse::new(status, body)))
    }

    /// Every call fails with the given error.
    pub fn always_failing(error: TransportError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    /// The first `failures` calls fail, every later call returns `response`.
    pub fn failing_then_ok(failures: usize, error: TransportError, response: RawResponse) -> Self {
        Self::scripted(vec![Err(error); failures], Ok(response))
    }

    pub fn scripted(
        script: Vec<Result<RawResponse, TransportError>>,
        fallback: Result<RawResponse, TransportError>,
    ) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback,
            latency: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long inside every call before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requested_keys(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _, _)| key.clone())
            .collect()
    }

    pub fn requested_specs(&self) -> Vec<RequestSpec> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, spec, _)| spec.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, at)| *at)
            .collect()
    }
}

impl Transport for MockTransport {
    async fn request(&self, url: &str, spec: &RequestSpec) -> Result<RawResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), spec.clone(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

// ---------------------------------------------------------------------------
// GaugeTransport
// ---------------------------------------------------------------------------

/// Transport that answers `200` after `latency` and records the highest
/// number of calls that were in progress at once.
#[derive(Clone, Default)]
pub struct GaugeTransport {
    latency: Duration,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl GaugeTransport {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Transport for GaugeTransport {
    async fn request(&self, _url: &str, _spec: &RequestSpec) -> Result<RawResponse, TransportError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(RawResponse::new(200, ""))
    }
}

// ---------------------------------------------------------------------------
// RecordingStage / FailingStage
// ---------------------------------------------------------------------------

/// Pipeline stage that records every item it sees.
#[derive(Clone, Default)]
pub struct RecordingStage {
    tag: Option<String>,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `"{tag}:{item}"` into a log shared with other stages.
    pub fn tagged(tag: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            tag: Some(tag.to_string()),
            log,
        }
    }

    pub fn items(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl PipelineStage<String> for RecordingStage {
    fn name(&self) -> &str {
        self.tag.as_deref().unwrap_or("recording")
    }

    fn process<'a>(&'a self, item: &'a String) -> BoxFuture<'a, Result<(), CrawlError>> {
        Box::pin(async move {
            let entry = match &self.tag {
                Some(tag) => format!("{tag}:{item}"),
                None => item.clone(),
            };
            self.log.lock().unwrap().push(entry);
            Ok(())
        })
    }
}

/// Pipeline stage that rejects one specific item and passes the rest.
#[derive(Clone)]
pub struct FailingStage {
    reject: String,
}

impl FailingStage {
    pub fn rejecting(item: &str) -> Self {
        Self {
            reject: item.to_string(),
        }
    }
}

impl PipelineStage<String> for FailingStage {
    fn name(&self) -> &str {
        "failing"
    }

    fn process<'a>(&'a self, item: &'a String) -> BoxFuture<'a, Result<(), CrawlError>> {
        Box::pin(async move {
            if *item == self.reject {
                Err(CrawlError::pipeline("failing", format!("rejected {item}")))
            } else {
                Ok(())
            }
        })
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock reporter that records event labels.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == label)
            .count()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match &event {
            CrawlEvent::RunStarted { .. } => "RunStarted",
            CrawlEvent::WorkerStarted { .. } => "WorkerStarted",
            CrawlEvent::TaskStarted { .. } => "TaskStarted",
            CrawlEvent::DuplicateSkipped { .. } => "DuplicateSkipped",
            CrawlEvent::AttemptFailed { .. } => "AttemptFailed",
            CrawlEvent::TaskCompleted { .. } => "TaskCompleted",
            CrawlEvent::TaskFailed { .. } => "TaskFailed",
            CrawlEvent::ItemRejected { .. } => "ItemRejected",
            CrawlEvent::WorkerStopped { .. } => "WorkerStopped",
            CrawlEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
