use std::collections::BTreeMap;

use trawler_core::error::CrawlError;
use trawler_core::task::RequestSpec;
use trawler_core::traits::RequestMiddleware;

/// Request middleware that fills in headers a task did not set itself.
///
/// Headers already present on the request win, so a task override such as
/// a per-page `accept` is never clobbered.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    headers: BTreeMap<String, String>,
}

impl DefaultHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn user_agent(self, value: impl Into<String>) -> Self {
        self.with_header("user-agent", value)
    }
}

impl RequestMiddleware for DefaultHeaders {
    fn process(&self, _key: &str, mut spec: RequestSpec) -> Result<RequestSpec, CrawlError> {
        for (name, value) in &self.headers {
            spec.headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        Ok(spec)
    }
}
