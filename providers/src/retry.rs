//! Backoff for the read-only lookups: profile, geocoder and project team.
//!
//! Directory searches and assignments go out once through
//! [`RetryConfig::none`]; a failed search is retried by the user, never here.
//!
//! A lookup is repeated on 408, 429, any 5xx, or a connect/timeout failure.
//! The wait doubles from [`RetryConfig::initial_delay`] up to
//! [`RetryConfig::max_delay`], shortened by a random jitter, unless the server
//! names its own wait via `Retry-After-Ms` or `Retry-After`. Every attempt of
//! one lookup shares an `Idempotency-Key` and reports its number in
//! `X-Retry-Count`.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Repeats after the first attempt. `http.max_retries` in the config file.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Largest fraction shaved off a computed wait.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// One attempt. Directory searches and assignments.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Server-requested wait, if it is positive and under a minute.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let in_range = |d: Duration| d > Duration::ZERO && d < Duration::from_secs(60);

    if let Some(val) = headers.get("retry-after-ms")
        && let Ok(s) = val.to_str()
        && let Ok(ms) = s.trim().parse::<f64>()
        && ms.is_finite()
        && ms > 0.0
    {
        let duration = Duration::from_secs_f64(ms / 1000.0);
        if in_range(duration) {
            return Some(duration);
        }
    }

    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        let duration = Duration::from_secs(secs);
        if in_range(duration) {
            return Some(duration);
        }
    }

    None
}

#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500..=599)
}

/// Wait before repeat number `backoff_step + 1`.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    config: &RetryConfig,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(delay) = headers.and_then(parse_retry_after) {
        return delay;
    }

    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

#[must_use]
pub fn generate_idempotency_key() -> String {
    format!("proxima-{}", Uuid::new_v4())
}

/// Result of a lookup after its last attempt.
#[derive(Debug)]
pub enum RetryOutcome {
    Success(Response),
    HttpError(Response),
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
    /// A transport error repeating cannot fix, such as a bad request body.
    NonRetryable(reqwest::Error),
}

impl RetryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Send the request built by `build_request`, repeating it per `config`.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let idempotency_key = generate_idempotency_key();
    let mut attempt: u32 = 0;

    loop {
        let is_last = attempt >= config.max_retries;
        let request = build_request()
            .header("X-Retry-Count", attempt.to_string())
            .header("Idempotency-Key", &idempotency_key);

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return RetryOutcome::Success(response);
                }
                if is_last || !should_retry(status) {
                    return RetryOutcome::HttpError(response);
                }
                let delay = calculate_retry_delay(attempt, config, Some(response.headers()));
                tracing::debug!(
                    status = %status,
                    retry_count = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Repeating lookup after error status"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    return RetryOutcome::NonRetryable(e);
                }
                if is_last {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt + 1,
                        source: e,
                    };
                }
                let delay = calculate_retry_delay(attempt, config, None);
                tracing::debug!(
                    error = %e,
                    retry_count = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Repeating lookup after connection error"
                );
                tokio::time::sleep(delay).await;
            }
        }

        attempt += 1;
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}
