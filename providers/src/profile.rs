//! User profiles: `GET /users/{id}`.

use proxima_types::{Coordinate, UserId};
use serde::Deserialize;

use crate::retry::{RetryConfig, send_with_retry};
use crate::{Endpoint, ServiceError, de_lenient_opt_f64, decode_json, expect_success};

pub const SERVICE: &str = "profile";

/// The parts of a user profile the location fallback needs. The viewer's own
/// category comes from the session context, not from here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    /// Present only when both latitude and longitude are stored and valid.
    pub coordinate: Option<Coordinate>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireProfile {
    #[serde(default, alias = "lat", deserialize_with = "de_lenient_opt_f64")]
    latitude: Option<f64>,
    #[serde(
        default,
        alias = "lon",
        alias = "lng",
        deserialize_with = "de_lenient_opt_f64"
    )]
    longitude: Option<f64>,
    #[serde(default)]
    city: Option<String>,
}

/// Some deployments wrap the record as `{ "user": { ... } }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireEnvelope {
    Wrapped { user: WireProfile },
    Bare(WireProfile),
}

impl From<WireProfile> for UserProfile {
    fn from(wire: WireProfile) -> Self {
        let coordinate = Coordinate::from_parts(wire.latitude, wire.longitude);
        if coordinate.is_none() && (wire.latitude.is_some() || wire.longitude.is_some()) {
            tracing::warn!(
                latitude = wire.latitude,
                longitude = wire.longitude,
                "Ignoring incomplete or invalid stored coordinate"
            );
        }
        Self {
            coordinate,
            city: wire
                .city
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    retry: RetryConfig,
}

impl ProfileClient {
    #[must_use]
    pub fn new(http: reqwest::Client, endpoint: Endpoint, retry: RetryConfig) -> Self {
        Self {
            http,
            endpoint,
            retry,
        }
    }

    pub async fn fetch(&self, user: &UserId) -> Result<UserProfile, ServiceError> {
        let url = self.endpoint.url(&["users", user.as_str()])?;
        let outcome = send_with_retry(
            || self.endpoint.authorize(self.http.get(url.clone())),
            &self.retry,
        )
        .await;
        let response = expect_success(SERVICE, outcome).await?;
        let envelope: WireEnvelope = decode_json(SERVICE, response).await?;
        let wire = match envelope {
            WireEnvelope::Wrapped { user } | WireEnvelope::Bare(user) => user,
        };
        Ok(wire.into())
    }
}
