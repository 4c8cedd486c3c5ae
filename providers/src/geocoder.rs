//! Free-text place lookup against an OSM-style `/geocode` endpoint.

use proxima_types::Coordinate;
use serde::Deserialize;

use crate::retry::{RetryConfig, send_with_retry};
use crate::{Endpoint, ServiceError, de_lenient_f64, decode_json, expect_success};

pub const SERVICE: &str = "geocoder";

#[derive(Debug, Clone)]
pub struct GeocoderClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct WireHit {
    #[serde(deserialize_with = "de_lenient_f64")]
    lat: f64,
    #[serde(deserialize_with = "de_lenient_f64")]
    lon: f64,
}

impl GeocoderClient {
    #[must_use]
    pub fn new(http: reqwest::Client, endpoint: Endpoint, retry: RetryConfig) -> Self {
        Self {
            http,
            endpoint,
            retry,
        }
    }

    /// Resolve `place` to the first matching coordinate.
    ///
    /// `Ok(None)` means the service answered but found nothing usable.
    pub async fn locate(&self, place: &str) -> Result<Option<Coordinate>, ServiceError> {
        let place = place.trim();
        if place.is_empty() {
            return Ok(None);
        }

        let url = self.endpoint.url(&["geocode"])?;
        let outcome = send_with_retry(
            || {
                self.endpoint.authorize(
                    self.http
                        .get(url.clone())
                        .query(&[("q", place), ("format", "json"), ("limit", "1")]),
                )
            },
            &self.retry,
        )
        .await;
        let response = expect_success(SERVICE, outcome).await?;
        let hits: Vec<WireHit> = decode_json(SERVICE, response).await?;

        let Some(first) = hits.into_iter().next() else {
            tracing::info!(place, "Geocoder returned no matches");
            return Ok(None);
        };
        match Coordinate::new(first.lat, first.lon) {
            Ok(coordinate) => Ok(Some(coordinate)),
            Err(e) => {
                tracing::warn!(place, %e, "Geocoder returned an invalid coordinate");
                Ok(None)
            }
        }
    }
}
