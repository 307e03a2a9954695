//! Blocking HTTP client with bounded retry and a per-vendor circuit breaker.
//!
//! Every vendor client goes through [`HttpClient::get`], which retries
//! connection failures, 429s and 5xx responses with exponential backoff and
//! feeds the outcome into the circuit breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::FinanceError;
use crate::config::HttpConfig;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Upper bound on a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig, breaker: Arc<CircuitBreaker>) -> Result<Self, FinanceError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FinanceError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            breaker,
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
        })
    }

    /// Client with its own breaker named after the vendor.
    pub fn for_provider(name: &str, config: &HttpConfig) -> Result<Self, FinanceError> {
        let breaker = Arc::new(CircuitBreaker::new(name, config.breaker_cooldown()));
        Self::new(config, breaker)
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Check if the vendor is currently reachable (breaker closed).
    pub fn is_available(&self) -> bool {
        self.breaker.is_allowed()
    }

    /// GET `url` and hand back the successful response unread.
    ///
    /// The body is not buffered, so callers may stream it.
    pub fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Response, FinanceError> {
        if !self.breaker.is_allowed() {
            return Err(FinanceError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff(self.base_delay, attempt);
                tracing::debug!(url, attempt, ?delay, "retrying request");
                std::thread::sleep(delay);
            }

            if !self.breaker.is_allowed() {
                return Err(FinanceError::CircuitBreakerTripped);
            }

            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::FORBIDDEN {
                        self.breaker.trip();
                        return Err(FinanceError::CircuitBreakerTripped);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(FinanceError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(FinanceError::AuthenticationRequired(format!(
                            "{} rejected the request credentials",
                            self.breaker.name()
                        )));
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(FinanceError::NotFound(url.to_string()));
                    }

                    if status.is_server_error() {
                        self.breaker.record_failure();
                        last_error = Some(FinanceError::Other(format!("HTTP {status} for {url}")));
                        continue;
                    }

                    if !status.is_success() {
                        return Err(FinanceError::Other(format!("HTTP {status} for {url}")));
                    }

                    self.breaker.record_success();
                    return Ok(resp);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FinanceError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(FinanceError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FinanceError::Other("max retries exceeded".into())))
    }

    /// GET `url` and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, FinanceError> {
        let resp = self.get(url, headers)?;
        let body = resp
            .text()
            .map_err(|e| FinanceError::NetworkUnreachable(format!("read body from {url}: {e}")))?;
        serde_json::from_str(&body).map_err(|e| {
            FinanceError::ResponseFormatChanged(format!("failed to parse response from {url}: {e}"))
        })
    }
}

/// `base * 2^(attempt - 1)`, capped at [`MAX_BACKOFF`].
fn backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://api.tiingo.com/", "iex/aapl"), "https://api.tiingo.com/iex/aapl");
        assert_eq!(join_url("https://api.tiingo.com", "/iex/aapl"), "https://api.tiingo.com/iex/aapl");
        assert_eq!(join_url("http://127.0.0.1:9/", "/a"), "http://127.0.0.1:9/a");
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff(base, 1), Duration::from_millis(500));
        assert_eq!(backoff(base, 3), Duration::from_secs(2));
        assert_eq!(backoff(base, 40), MAX_BACKOFF);
        assert_eq!(backoff(Duration::from_secs(u64::MAX / 2), 2), MAX_BACKOFF);
        assert_eq!(backoff(Duration::ZERO, 40), Duration::ZERO);
    }

    #[test]
    fn many_retries_do_not_overflow() {
        let config = HttpConfig {
            max_retries: 40,
            base_delay_ms: 0,
            ..HttpConfig::default()
        };
        let client = HttpClient::for_provider("test", &config).unwrap();
        let result = client.get("http://127.0.0.1:9/unreachable", &[]);
        assert!(matches!(result, Err(FinanceError::NetworkUnreachable(_))));
    }

    #[test]
    fn tripped_breaker_short_circuits() {
        let client = HttpClient::for_provider("test", &HttpConfig::default()).unwrap();
        client.breaker().trip();
        assert!(!client.is_available());
        // Never leaves the process: the breaker refuses before any I/O.
        let result = client.get("http://127.0.0.1:9/never", &[]);
        assert!(matches!(result, Err(FinanceError::CircuitBreakerTripped)));
    }
}
