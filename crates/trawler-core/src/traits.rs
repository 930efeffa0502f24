use std::future::Future;

use futures::future::BoxFuture;

use crate::error::{CrawlError, TransportError};
use crate::task::{RawResponse, RequestSpec};

/// Performs one HTTP request.
///
/// The engine only cares whether the call failed, never which HTTP stack
/// raised the failure. Any status code is a successful response.
pub trait Transport: Send + Sync {
    fn request(
        &self,
        url: &str,
        spec: &RequestSpec,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// Rewrites outgoing request options before the first transport attempt.
///
/// Returning the input unchanged keeps it; returning a different spec
/// replaces it for every middleware that follows.
pub trait RequestMiddleware: Send + Sync {
    fn process(&self, key: &str, spec: RequestSpec) -> Result<RequestSpec, CrawlError>;
}

/// Observes a completed response before the handler runs.
///
/// An `Err` fails the task; the response itself cannot be replaced.
pub trait ResponseMiddleware: Send + Sync {
    fn inspect(&self, key: &str, response: &RawResponse) -> Result<(), CrawlError>;
}

/// Consumes items extracted by handlers (persistence, transformation, export).
pub trait PipelineStage<I>: Send + Sync {
    /// Used in logs and in rejection reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// An `Err` rejects the item and skips the stages after this one.
    fn process<'a>(&'a self, item: &'a I) -> BoxFuture<'a, Result<(), CrawlError>>;
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

/// Request middleware built from a closure. See [`request_fn`].
pub struct FnRequestMiddleware<F>(F);

/// Wrap `|key, spec| -> Result<RequestSpec, CrawlError>` as request middleware.
pub fn request_fn<F>(f: F) -> FnRequestMiddleware<F>
where
    F: Fn(&str, RequestSpec) -> Result<RequestSpec, CrawlError> + Send + Sync,
{
    FnRequestMiddleware(f)
}

impl<F> RequestMiddleware for FnRequestMiddleware<F>
where
    F: Fn(&str, RequestSpec) -> Result<RequestSpec, CrawlError> + Send + Sync,
{
    fn process(&self, key: &str, spec: RequestSpec) -> Result<RequestSpec, CrawlError> {
        (self.0)(key, spec)
    }
}

/// Response middleware built from a closure. See [`response_fn`].
pub struct FnResponseMiddleware<F>(F);

/// Wrap `|key, response| -> Result<(), CrawlError>` as response middleware.
pub fn response_fn<F>(f: F) -> FnResponseMiddleware<F>
where
    F: Fn(&str, &RawResponse) -> Result<(), CrawlError> + Send + Sync,
{
    FnResponseMiddleware(f)
}

impl<F> ResponseMiddleware for FnResponseMiddleware<F>
where
    F: Fn(&str, &RawResponse) -> Result<(), CrawlError> + Send + Sync,
{
    fn inspect(&self, key: &str, response: &RawResponse) -> Result<(), CrawlError> {
        (self.0)(key, response)
    }
}

/// Pipeline stage built from an async closure. See [`stage_fn`].
pub struct FnStage<F> {
    name: String,
    f: F,
}

/// Wrap `|item| async { .. }` as a named pipeline stage.
///
/// The closure receives its own clone of the item.
pub fn stage_fn<I, F, Fut>(name: impl Into<String>, f: F) -> FnStage<F>
where
    I: Clone + Send + Sync,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CrawlError>> + Send + 'static,
{
    FnStage {
        name: name.into(),
        f,
    }
}

impl<I, F, Fut> PipelineStage<I> for FnStage<F>
where
    I: Clone + Send + Sync,
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CrawlError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process<'a>(&'a self, item: &'a I) -> BoxFuture<'a, Result<(), CrawlError>> {
        Box::pin((self.f)(item.clone()))
    }
}
