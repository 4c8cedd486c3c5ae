//! Professional directory: `GET /professionals/nearby`.

use proxima_types::{Category, Coordinate, ProfessionalId, ProfessionalRecord, SearchQuery};
use serde::Deserialize;
use serde_json::Value;

use crate::retry::{RetryConfig, send_with_retry};
use crate::{Endpoint, ServiceError, de_lenient_f64, de_lenient_opt_f64, decode_json, expect_success};

pub const SERVICE: &str = "directory";

/// Searches are sent once. A failure surfaces to the view, which offers an
/// explicit retry.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl DirectoryClient {
    #[must_use]
    pub fn new(http: reqwest::Client, endpoint: Endpoint) -> Self {
        Self { http, endpoint }
    }

    /// Look up professionals within `query.radius` of `query.origin`.
    ///
    /// The response is returned as the server ordered it. Distance, matching
    /// and ordering are the server's responsibility. Malformed records are
    /// skipped; the rest are kept.
    pub async fn search(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<ProfessionalRecord>, ServiceError> {
        let url = self.endpoint.url(&["professionals", "nearby"])?;
        let params = query_params(query);

        tracing::debug!(
            origin = %query.origin,
            radius_km = query.radius.get(),
            category = query.filter.category(),
            sub_category = query.filter.sub_category(),
            "Directory search"
        );

        let outcome = send_with_retry(
            || self.endpoint.authorize(self.http.get(url.clone()).query(&params)),
            &RetryConfig::none(),
        )
        .await;
        let response = expect_success(SERVICE, outcome).await?;
        let items: Vec<Value> = decode_json(SERVICE, response).await?;

        Ok(items.into_iter().enumerate().filter_map(decode_record).collect())
    }
}

fn decode_record((index, item): (usize, Value)) -> Option<ProfessionalRecord> {
    let record = serde_json::from_value::<WireProfessional>(item)
        .map_err(|e| ServiceError::Decode {
            service: SERVICE,
            reason: e.to_string(),
        })
        .and_then(WireProfessional::into_record);
    match record {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(index, %e, "Skipping malformed directory record");
            None
        }
    }
}

fn query_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("lat", query.origin.lat().to_string()),
        ("lon", query.origin.lon().to_string()),
        ("radius", query.radius.get().to_string()),
    ];
    if let Some(category) = query.filter.category() {
        params.push(("category", category.to_string()));
    }
    if let Some(sub_category) = query.filter.sub_category() {
        params.push(("sub_category", sub_category.to_string()));
    }
    params
}

#[derive(Debug, Deserialize)]
struct WireProfessional {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(alias = "role")]
    category: String,
    #[serde(default, alias = "subCategory")]
    sub_category: Option<String>,
    #[serde(alias = "lat", deserialize_with = "de_lenient_f64")]
    latitude: f64,
    #[serde(alias = "lon", alias = "lng", deserialize_with = "de_lenient_f64")]
    longitude: f64,
    #[serde(
        alias = "distanceKm",
        alias = "distance",
        deserialize_with = "de_lenient_f64"
    )]
    distance_km: f64,
    #[serde(default, deserialize_with = "de_lenient_opt_f64")]
    rating: Option<f64>,
    #[serde(default, alias = "experienceYears", alias = "experience")]
    experience_years: Option<u32>,
    #[serde(default, alias = "resumePath", alias = "resume")]
    resume_path: Option<String>,
    #[serde(default, alias = "portfolioUrl", alias = "portfolio")]
    portfolio_url: Option<String>,
    #[serde(default)]
    bio: Option<String>,
}

impl WireProfessional {
    fn into_record(self) -> Result<ProfessionalRecord, ServiceError> {
        let coordinate =
            Coordinate::new(self.latitude, self.longitude).map_err(|e| ServiceError::Decode {
                service: SERVICE,
                reason: format!("professional {}: {e}", self.id),
            })?;
        Ok(ProfessionalRecord {
            id: ProfessionalId::new(self.id),
            name: self.name,
            category: Category::parse(&self.category),
            sub_category: self.sub_category.filter(|s| !s.trim().is_empty()),
            coordinate,
            distance_km: self.distance_km,
            rating: self.rating.map(|r| r as f32),
            experience_years: self.experience_years,
            resume_path: self.resume_path,
            portfolio_url: self.portfolio_url,
            bio: self.bio,
        })
    }
}
