use rand::Rng;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::toc::{toc_query_url, MAX_HITS_PER_TOC};
use crate::extract::extract_hits;

pub const USER_AGENT: &str = concat!(
    "dblp-toc/",
    env!("CARGO_PKG_VERSION"),
    " (offline builder; polite crawler)"
);

// Upper bound on a single wait, whatever the server asks for.
const MAX_WAIT_SECS: f64 = 3600.0;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// HTTP 429; `retry_after` is the server hint in seconds, if it sent a numeric one.
    #[error("rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<f64> },

    #[error("network error: {0}")]
    Transient(#[source] reqwest::Error),

    /// Request could not be built or sent for reasons a retry won't fix
    /// (bad URL, redirect policy).
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("malformed JSON response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Sorts a reqwest failure into network/timeout trouble or a request
    /// that can never succeed.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_body() || (e.is_request() && !e.is_builder())
        {
            Self::Transient(e)
        } else {
            Self::Request(e)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}

/// Exponential backoff with multiplicative jitter. All values are seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base_delay: f64,
    pub jitter: f64,
    pub rate_limit_floor: f64,
    pub transient_floor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: 1.0,
            jitter: 0.25,
            rate_limit_floor: 1.0,
            transient_floor: 0.5,
        }
    }
}

impl Backoff {
    pub fn with_base_delay(base_delay: f64) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    /// `base_delay * 2^attempt`, before jitter.
    pub fn nominal(&self, attempt: u32) -> f64 {
        self.base_delay * 2f64.powi(attempt.min(30) as i32)
    }

    pub fn delay_with<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        hint: Option<f64>,
        floor: f64,
        rng: &mut R,
    ) -> Duration {
        let wait = hint.unwrap_or_else(|| self.nominal(attempt));
        let factor = if self.jitter > 0.0 {
            1.0 + rng.gen_range(-self.jitter..=self.jitter)
        } else {
            1.0
        };
        Duration::from_secs_f64((wait * factor).max(floor).clamp(0.0, MAX_WAIT_SECS))
    }

    /// Wait before retrying after `err`; None if `err` is not retryable.
    pub fn wait_for(&self, err: &FetchError, attempt: u32) -> Option<Duration> {
        let mut rng = rand::thread_rng();
        match err {
            FetchError::RateLimited { retry_after } => {
                Some(self.delay_with(attempt, *retry_after, self.rate_limit_floor, &mut rng))
            }
            FetchError::Transient(_) => {
                Some(self.delay_with(attempt, None, self.transient_floor, &mut rng))
            }
            _ => None,
        }
    }
}

fn retry_after_secs(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// Sequential dblp search client. Every request and every backoff sleep is
/// awaited inline; callers must not fan requests out concurrently.
pub struct DblpClient {
    client: Client,
    api_base: String,
    max_hits: u32,
    retries: u32,
    backoff: Backoff,
}

impl DblpClient {
    pub fn new(
        api_base: impl Into<String>,
        timeout_secs: u64,
        retries: u32,
        backoff: Backoff,
    ) -> Result<Self, FetchError> {
        Self::with_timeout(api_base, Duration::from_secs(timeout_secs), retries, backoff)
    }

    /// Like `new`, with a sub-second request timeout allowed.
    pub fn with_timeout(
        api_base: impl Into<String>,
        timeout: Duration,
        retries: u32,
        backoff: Backoff,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            api_base: api_base.into(),
            max_hits: MAX_HITS_PER_TOC,
            retries,
            backoff,
        })
    }

    pub fn with_max_hits(mut self, max_hits: u32) -> Self {
        self.max_hits = max_hits;
        self
    }

    /// Hits listed under a TOC key; an empty list means dblp has no such TOC.
    pub async fn fetch_toc(&self, toc_key: &str) -> Result<Vec<Value>, FetchError> {
        let url = toc_query_url(&self.api_base, toc_key, self.max_hits);
        let document = self.fetch_json(&url).await?;
        Ok(extract_hits(&document))
    }

    /// At most `retries + 1` attempts; 429s and network errors back off and
    /// retry, anything else fails immediately.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let mut attempt = 0u32;
        loop {
            let err = match self.try_once(url).await {
                Ok(document) => return Ok(document),
                Err(e) => e,
            };

            if attempt >= self.retries {
                return Err(err);
            }
            let wait = match self.backoff.wait_for(&err, attempt) {
                Some(wait) => wait,
                None => return Err(err),
            };

            warn!(
                "{} -> sleeping {:.1}s then retrying (attempt {}/{})",
                err,
                wait.as_secs_f64(),
                attempt + 1,
                self.retries
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    async fn try_once(&self, url: &str) -> Result<Value, FetchError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                retry_after: retry_after_secs(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(FetchError::from_reqwest)?;
        Ok(serde_json::from_slice(&body)?)
    }
}
