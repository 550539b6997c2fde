//! Blocking HTTP transport with timeout, bounded retry, throttle and
//! circuit breaker.
//!
//! Every attempt, retries included, first waits on the shared
//! [`RequestThrottle`], so the provider sees one global request rate no matter
//! how many workers are fetching. The breaker counts requests, not attempts:
//! a request that exhausts its retry budget on transient errors is one
//! failure.

use super::circuit_breaker::CircuitBreaker;
use super::provider::DataError;
use super::throttle::RequestThrottle;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Longest `Retry-After` we are willing to honor before the next attempt.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Timeout and retry knobs for one provider.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            user_agent: concat!("bankpanel/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    throttle: Arc<RequestThrottle>,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpTransport {
    pub fn new(
        settings: &TransportSettings,
        circuit_breaker: Arc<CircuitBreaker>,
        throttle: Arc<RequestThrottle>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            throttle,
            max_retries: settings.max_retries,
            base_delay: settings.base_delay,
        })
    }

    pub fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }

    /// GET `url` with `params` and decode the JSON body.
    ///
    /// `context` names the request in errors; it must not contain secrets.
    /// Error messages never include the URL or its query string.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
        context: &str,
    ) -> Result<T, DataError> {
        let mut attempt = 0;
        loop {
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            self.throttle.acquire();

            let error = match self.send_once(url, params, context) {
                Ok(body) => {
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                return Err(error);
            }
            if attempt >= self.max_retries {
                self.circuit_breaker.record_failure();
                return Err(error);
            }

            attempt += 1;
            let min_wait = match &error {
                DataError::RateLimited { retry_after_secs } => {
                    Duration::from_secs(*retry_after_secs).min(MAX_RETRY_AFTER)
                }
                _ => Duration::ZERO,
            };
            let delay = backoff_delay(self.base_delay, attempt).max(min_wait);
            tracing::debug!(attempt, ?delay, %error, "retrying {context}");
            std::thread::sleep(delay);
        }
    }

    /// One attempt. 403 trips the breaker; classification of everything else
    /// is left to [`DataError::is_transient`].
    fn send_once<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
        context: &str,
    ) -> Result<T, DataError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .map_err(request_error)?;
        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(1);
            return Err(DataError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                context: context.to_string(),
            });
        }

        resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!(
                "failed to parse response for {context}: {}",
                e.without_url()
            ))
        })
    }
}

/// reqwest's `Display` appends the full URL, query string included.
fn request_error(e: reqwest::Error) -> DataError {
    let retryable = e.is_connect() || e.is_timeout();
    let message = e.without_url().to_string();
    if retryable {
        DataError::NetworkUnreachable(message)
    } else {
        DataError::Other(format!("request failed: {message}"))
    }
}

/// Exponential backoff for retry `attempt` (1-based) plus up to 50% jitter.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let jitter_ms = (exp.as_millis() as u64) / 2;
    let jitter = if jitter_ms > 0 {
        Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    } else {
        Duration::ZERO
    };
    exp + jitter
}
