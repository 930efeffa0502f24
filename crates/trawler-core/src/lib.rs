//! Core of the trawler crawler: a deduplicating FIFO frontier drained by a
//! fixed pool of logical workers, with pluggable transport, request and
//! response middleware, and item pipeline stages.

pub mod config;
pub mod crawler;
pub mod error;
pub mod frontier;
pub mod reporter;
pub mod retry;
pub mod stats;
pub mod task;
pub mod throttle;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use config::CrawlerConfig;
pub use crawler::Crawler;
pub use error::{CrawlError, TransportError};
pub use frontier::Frontier;
pub use reporter::{CrawlEvent, CrawlReporter, TracingCrawlReporter};
pub use retry::RetryPolicy;
pub use stats::CrawlStats;
pub use task::{Handler, HandlerResult, Method, RawResponse, RequestSpec, ResponseContext, Task};
pub use traits::{
    PipelineStage, RequestMiddleware, ResponseMiddleware, Transport, request_fn, response_fn,
    stage_fn,
};
pub use tokio_util::sync::CancellationToken;
