use std::str::FromStr;
use std::time::Duration;

use crate::error::CrawlError;
use crate::retry::RetryPolicy;
use crate::task::RequestSpec;

/// Engine configuration, fixed for the lifetime of a [`Crawler`](crate::crawler::Crawler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerConfig {
    /// Number of logical workers.
    pub concurrency: usize,
    /// Politeness pause a worker takes between tasks.
    pub interval: Duration,
    /// Additional transport attempts per task.
    pub max_retries: u32,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Backoff unit; retry `n` waits `retry_base_delay * n`.
    pub retry_base_delay: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            interval: Duration::ZERO,
            max_retries: 2,
            timeout: Duration::from_millis(15_000),
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl CrawlerConfig {
    /// Read overrides from environment variables.
    ///
    /// - `TRAWLER_CONCURRENCY` (default 4)
    /// - `TRAWLER_INTERVAL_MS` (default 0)
    /// - `TRAWLER_MAX_RETRIES` (default 2)
    /// - `TRAWLER_TIMEOUT_MS` (default 15000)
    pub fn from_env() -> Result<Self, CrawlError> {
        let defaults = Self::default();
        let config = Self {
            concurrency: env_or("TRAWLER_CONCURRENCY", defaults.concurrency)?,
            interval: Duration::from_millis(env_or(
                "TRAWLER_INTERVAL_MS",
                defaults.interval.as_millis() as u64,
            )?),
            max_retries: env_or("TRAWLER_MAX_RETRIES", defaults.max_retries)?,
            timeout: Duration::from_millis(env_or(
                "TRAWLER_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )?),
            retry_base_delay: defaults.retry_base_delay,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.concurrency == 0 {
            return Err(CrawlError::Config("concurrency must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(CrawlError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay)
    }

    /// The request every task starts from unless it carries its own.
    pub fn base_request(&self) -> RequestSpec {
        RequestSpec::get(self.timeout)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, CrawlError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|_| {
            CrawlError::Config(format!("Invalid {name} '{raw}': expected a non-negative integer"))
        }),
    }
}
