//! Per-domain request throttling for polite crawling.
//!
//! The engine's `interval` paces each worker on its own; with several
//! workers hitting one host that still adds up. [`ThrottledTransport`]
//! wraps any [`Transport`] and spaces requests to the same domain
//! (scheme + host + port) by at least a fixed delay across all workers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use trawler_core::throttle::ThrottledTransport;
//! # use trawler_core::{RawResponse, RequestSpec, TransportError, Transport};
//! # struct MyTransport;
//! # impl Transport for MyTransport {
//! #     async fn request(&self, _: &str, _: &RequestSpec) -> Result<RawResponse, TransportError> { todo!() }
//! # }
//! let transport = ThrottledTransport::new(MyTransport, Duration::from_millis(250));
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::error::TransportError;
use crate::task::{RawResponse, RequestSpec};
use crate::traits::Transport;

/// A [`Transport`] wrapper that enforces a minimum gap per domain.
pub struct ThrottledTransport<T> {
    inner: T,
    delay: Duration,
    /// Earliest instant the next request to each domain may start.
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl<T: Transport> ThrottledTransport<T> {
    pub fn new(inner: T, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Extract the domain key from a URL (scheme://host:port).
    fn domain_key(url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let host = url.host_str()?;
        let port = url
            .port_or_known_default()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        Some(format!("{}://{}{}", url.scheme(), host, port))
    }

    /// Reserve the next free slot for `domain` and sleep until it arrives.
    ///
    /// The slot is claimed under the lock and the sleep happens outside it,
    /// so concurrent callers for one domain queue up `delay` apart without
    /// blocking other domains.
    async fn wait_for_slot(&self, domain: String) {
        let now = Instant::now();
        let start_at = {
            let mut slots = self.next_slot.lock().await;
            let start_at = slots.get(&domain).copied().unwrap_or(now).max(now);
            slots.insert(domain.clone(), start_at + self.delay);
            start_at
        };

        if start_at > now {
            tracing::debug!(
                %domain,
                sleep_ms = %(start_at - now).as_millis(),
                "Throttling request"
            );
            tokio::time::sleep_until(start_at).await;
        }
    }
}

impl<T: Transport> Transport for ThrottledTransport<T> {
    async fn request(&self, url: &str, spec: &RequestSpec) -> Result<RawResponse, TransportError> {
        if !self.delay.is_zero()
            && let Some(domain) = Self::domain_key(url)
        {
            self.wait_for_slot(domain).await;
        }
        self.inner.request(url, spec).await
    }
}
