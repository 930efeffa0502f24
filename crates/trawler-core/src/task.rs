use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// HTTP method of an outgoing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single outgoing request.
///
/// Built once per task execution, then threaded through every request
/// middleware before the first transport attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl RequestSpec {
    /// A `GET` with no headers and no body.
    pub fn get(timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            headers: BTreeMap::new(),
            body: None,
            timeout,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Header names are stored lowercased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What a transport hands back for a completed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body_text: String,
}

impl RawResponse {
    pub fn new(status: u16, body_text: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body_text: body_text.into(),
        }
    }
}

/// A fetched response as seen by a task handler.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub key: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body_text: String,
    /// Populated only when `body_text` is valid JSON.
    pub body_json: Option<serde_json::Value>,
}

impl ResponseContext {
    pub fn new(key: impl Into<String>, response: RawResponse) -> Self {
        let body_json = serde_json::from_str(&response.body_text).ok();
        Self {
            key: key.into(),
            status: response.status,
            headers: response.headers,
            body_text: response.body_text,
            body_json,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Follow-up work and extracted items produced by a handler.
pub struct HandlerResult<I> {
    pub next: Vec<Task<I>>,
    pub items: Vec<I>,
}

impl<I> Default for HandlerResult<I> {
    fn default() -> Self {
        Self {
            next: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl<I> HandlerResult<I> {
    /// Nothing to follow, nothing extracted.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn follow(mut self, task: Task<I>) -> Self {
        self.next.push(task);
        self
    }

    pub fn emit(mut self, item: I) -> Self {
        self.items.push(item);
        self
    }
}

impl<I> fmt::Debug for HandlerResult<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerResult")
            .field("next", &self.next)
            .field("items", &self.items.len())
            .finish()
    }
}

/// Caller logic turning a fetched response into more tasks and items.
///
/// A panic inside the handler is caught and fails only its task with
/// [`CrawlError::Handler`].
pub type Handler<I> =
    Arc<dyn Fn(&ResponseContext) -> Result<HandlerResult<I>, CrawlError> + Send + Sync>;

/// One unit of work: fetch `key` and run `handler` over the response.
///
/// Identity is the key. A task without an explicit request uses the
/// engine's defaults (`GET`, no headers, configured timeout).
pub struct Task<I> {
    key: String,
    request: Option<RequestSpec>,
    handler: Handler<I>,
}

impl<I> Task<I> {
    pub fn new<F>(key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ResponseContext) -> Result<HandlerResult<I>, CrawlError> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            request: None,
            handler: Arc::new(handler),
        }
    }

    /// Build a task around an existing shared handler.
    pub fn with_handler(key: impl Into<String>, handler: Handler<I>) -> Self {
        Self {
            key: key.into(),
            request: None,
            handler,
        }
    }

    /// Override the engine's default request for this task.
    pub fn with_request(mut self, request: RequestSpec) -> Self {
        self.request = Some(request);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn request(&self) -> Option<&RequestSpec> {
        self.request.as_ref()
    }

    pub fn handler(&self) -> &Handler<I> {
        &self.handler
    }

    pub(crate) fn into_parts(self) -> (String, Option<RequestSpec>, Handler<I>) {
        (self.key, self.request, self.handler)
    }
}

impl<I> Clone for Task<I> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            request: self.request.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<I> fmt::Debug for Task<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}
