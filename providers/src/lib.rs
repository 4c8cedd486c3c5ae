//! HTTP clients for the services the discovery engine depends on.
//!
//! # Architecture
//!
//! Every external endpoint gets a small typed client:
//!
//! - [`profile`] - `GET /users/{id}`, the stored-profile location fallback
//! - [`geocoder`] - `GET /geocode?q=`, last-resort city lookup (third party)
//! - [`directory`] - `GET /professionals/nearby`, the proximity search
//! - [`projects`] - `POST /projects/{id}/assign` and `GET /projects/{id}/team`
//!
//! All clients share one hardened [`reqwest::Client`] built from [`HttpOptions`]
//! and report failures as [`ServiceError`].
//!
//! # Retries
//!
//! Reads go through [`retry::send_with_retry`] with the configured
//! [`retry::RetryConfig`]. Assignment is a write and is sent exactly once; the
//! caller decides whether to offer the user a retry.
//!
//! # Wire types
//!
//! Each module owns private wire structs that tolerate the field spellings the
//! services are known to emit (`subCategory` and `sub_category`, numeric strings
//! for coordinates) and converts them into `proxima_types` values at the edge.

pub mod directory;
pub mod geocoder;
pub mod profile;
pub mod projects;
pub mod retry;

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub use proxima_types;
pub use reqwest::StatusCode;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Failure talking to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {service} failed after {attempts} attempt(s): {source}")]
    Transport {
        service: &'static str,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} responded {status}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{service} returned an unreadable body: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },
    #[error("invalid {service} URL: {reason}")]
    Url {
        service: &'static str,
        reason: String,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ServiceError {
    #[must_use]
    pub fn service(&self) -> &'static str {
        match self {
            Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. }
            | Self::Url { service, .. } => service,
            Self::Client(_) => "http",
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error body as returned by the server, if the failure was an HTTP status.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Connection settings shared by every client.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Refuse plain-HTTP endpoints. Off only for local mocks.
    pub https_only: bool,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            https_only: true,
            user_agent: format!("proxima/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub fn build_http_client(options: &HttpOptions) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .connect_timeout(options.connect_timeout)
        .timeout(options.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(3))
        .https_only(options.https_only)
        .user_agent(options.user_agent.clone())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .build()
        .map_err(ServiceError::Client)
}

/// Bearer token for the marketplace API.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    /// Returns `None` for blank tokens so an unset `${ENV}` reference does not
    /// produce an empty `Authorization` header.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

// Manual Debug impl to prevent leaking tokens in logs.
impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// Base URL of a service plus the credentials sent to it.
#[derive(Debug, Clone)]
pub struct Endpoint {
    service: &'static str,
    base: Url,
    token: Option<ApiToken>,
}

impl Endpoint {
    pub fn parse(service: &'static str, base: &str) -> Result<Self, ServiceError> {
        let mut base = Url::parse(base).map_err(|e| ServiceError::Url {
            service,
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ServiceError::Url {
                service,
                reason: format!("{base} cannot be used as a base URL"),
            });
        }
        // Url::join replaces the last segment unless the path ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            service,
            base,
            token: None,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<ApiToken>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Resolve `segments` below the base path, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| ServiceError::Url {
                service: self.service,
                reason: "base URL has no path".to_string(),
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    pub(crate) fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Turn a retry outcome into a 2xx response or a [`ServiceError`].
pub(crate) async fn expect_success(
    service: &'static str,
    outcome: retry::RetryOutcome,
) -> Result<reqwest::Response, ServiceError> {
    match outcome {
        retry::RetryOutcome::Success(response) => Ok(response),
        retry::RetryOutcome::HttpError(response) => {
            let status = response.status();
            let body = read_capped_error_body(response).await;
            Err(ServiceError::Status {
                service,
                status,
                body,
            })
        }
        retry::RetryOutcome::ConnectionError { attempts, source } => Err(ServiceError::Transport {
            service,
            attempts,
            source,
        }),
        retry::RetryOutcome::NonRetryable(source) => Err(ServiceError::Transport {
            service,
            attempts: 1,
            source,
        }),
    }
}

pub(crate) async fn decode_json<T>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, ServiceError>
where
    T: serde::de::DeserializeOwned,
{
    let bytes = response
        .bytes()
        .await
        .map_err(|source| ServiceError::Transport {
            service,
            attempts: 1,
            source,
        })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(%e, service, payload_bytes = bytes.len(), "Failed to decode response");
        ServiceError::Decode {
            service,
            reason: e.to_string(),
        }
    })
}

/// Accept a number or a numeric string. Geocoders commonly send `"18.5204"`.
pub(crate) fn de_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    match <NumOrText as serde::Deserialize>::deserialize(deserializer)? {
        NumOrText::Num(n) => Ok(n),
        NumOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Optional variant of [`de_lenient_f64`]; `null`, absent and `""` all map to `None`.
pub(crate) fn de_lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }

    match <Option<NumOrText> as serde::Deserialize>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrText::Num(n)) => Ok(Some(n)),
        Some(NumOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumOrText::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiToken, Endpoint, ServiceError};

    #[test]
    fn endpoint_joins_segments_below_base_path() {
        let endpoint = Endpoint::parse("api", "https://api.example.com/v1").unwrap();
        let url = endpoint.url(&["users", "u 1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/users/u%201");
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let endpoint = Endpoint::parse("api", "https://api.example.com/").unwrap();
        let url = endpoint.url(&["professionals", "nearby"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/professionals/nearby");
    }

    #[test]
    fn endpoint_rejects_garbage() {
        let err = Endpoint::parse("api", "not a url").unwrap_err();
        assert!(matches!(err, ServiceError::Url { service: "api", .. }));
    }

    #[test]
    fn blank_token_is_none() {
        assert!(ApiToken::new("  ").is_none());
        let token = ApiToken::new("secret").unwrap();
        assert_eq!(format!("{token:?}"), "ApiToken([REDACTED])");
    }

    #[test]
    fn lenient_numbers_accept_strings() {
        #[derive(serde::Deserialize)]
        struct Pair {
            #[serde(deserialize_with = "super::de_lenient_f64")]
            a: f64,
            #[serde(default, deserialize_with = "super::de_lenient_opt_f64")]
            b: Option<f64>,
        }

        let p: Pair = serde_json::from_str(r#"{"a": "18.52", "b": ""}"#).unwrap();
        assert!((p.a - 18.52).abs() < f64::EPSILON);
        assert!(p.b.is_none());

        let p: Pair = serde_json::from_str(r#"{"a": 73.85, "b": "1.5"}"#).unwrap();
        assert_eq!(p.b, Some(1.5));

        assert!(serde_json::from_str::<Pair>(r#"{"a": "north"}"#).is_err());
    }
}
