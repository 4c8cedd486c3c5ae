//! Collaborator seams.
//!
//! The session and resolver talk to the outside world only through these
//! traits. [`HttpBackend`] is the production implementation; tests substitute
//! in-memory fakes.

use std::future::Future;

use proxima_providers::directory::DirectoryClient;
use proxima_providers::geocoder::GeocoderClient;
use proxima_providers::profile::{ProfileClient, UserProfile};
use proxima_providers::projects::{ProjectClient, TeamMember};
use proxima_providers::{Endpoint, ServiceError, build_http_client};
use proxima_types::{
    Category, Coordinate, ProfessionalId, ProfessionalRecord, ProjectId, SearchQuery, UserId,
};

use crate::config::{ConfigError, ProximaConfig};

pub trait DirectoryService: Send + Sync + 'static {
    fn search_nearby(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<Vec<ProfessionalRecord>, ServiceError>> + Send;
}

pub trait GeocodingService: Send + Sync + 'static {
    /// `Ok(None)` when the service answered with no usable match.
    fn geocode(
        &self,
        place: &str,
    ) -> impl Future<Output = Result<Option<Coordinate>, ServiceError>> + Send;
}

pub trait ProfileService: Send + Sync + 'static {
    fn fetch_profile(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<UserProfile, ServiceError>> + Send;
}

pub trait ProjectService: Send + Sync + 'static {
    fn assign(
        &self,
        project: &ProjectId,
        professional: &ProfessionalId,
        role: &Category,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn team(
        &self,
        project: &ProjectId,
    ) -> impl Future<Output = Result<Vec<TeamMember>, ServiceError>> + Send;
}

/// Everything a discovery session needs from the network.
pub trait DiscoveryBackend:
    DirectoryService + GeocodingService + ProfileService + ProjectService
{
}

impl<T> DiscoveryBackend for T where
    T: DirectoryService + GeocodingService + ProfileService + ProjectService
{
}

/// HTTP implementation backed by the provider clients.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    directory: DirectoryClient,
    geocoder: GeocoderClient,
    profiles: ProfileClient,
    projects: ProjectClient,
}

impl HttpBackend {
    #[must_use]
    pub fn new(
        directory: DirectoryClient,
        geocoder: GeocoderClient,
        profiles: ProfileClient,
        projects: ProjectClient,
    ) -> Self {
        Self {
            directory,
            geocoder,
            profiles,
            projects,
        }
    }

    /// Build all four clients from one configuration, sharing a single
    /// connection pool.
    pub fn from_config(config: &ProximaConfig) -> Result<Self, ConfigError> {
        let http = build_http_client(&config.http_options()).map_err(ConfigError::from)?;
        let token = config.api_token();
        let api_base = config.api_base_url()?;
        let geocoder_base = config.geocoder_base_url()?;

        let api = |service: &'static str| {
            Endpoint::parse(service, &api_base)
                .map(|e| e.with_token(token.clone()))
                .map_err(ConfigError::from)
        };
        let geocoder_endpoint =
            Endpoint::parse(proxima_providers::geocoder::SERVICE, &geocoder_base)
                .map_err(ConfigError::from)?;

        let read_retry = config.read_retry();
        Ok(Self::new(
            DirectoryClient::new(http.clone(), api(proxima_providers::directory::SERVICE)?),
            GeocoderClient::new(http.clone(), geocoder_endpoint, read_retry.clone()),
            ProfileClient::new(
                http.clone(),
                api(proxima_providers::profile::SERVICE)?,
                read_retry.clone(),
            ),
            ProjectClient::new(http, api(proxima_providers::projects::SERVICE)?, read_retry),
        ))
    }
}

impl DirectoryService for HttpBackend {
    async fn search_nearby(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<ProfessionalRecord>, ServiceError> {
        self.directory.search(query).await
    }
}

impl GeocodingService for HttpBackend {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinate>, ServiceError> {
        self.geocoder.locate(place).await
    }
}

impl ProfileService for HttpBackend {
    async fn fetch_profile(&self, user: &UserId) -> Result<UserProfile, ServiceError> {
        self.profiles.fetch(user).await
    }
}

impl ProjectService for HttpBackend {
    async fn assign(
        &self,
        project: &ProjectId,
        professional: &ProfessionalId,
        role: &Category,
    ) -> Result<(), ServiceError> {
        self.projects.assign(project, professional, role).await
    }

    async fn team(&self, project: &ProjectId) -> Result<Vec<TeamMember>, ServiceError> {
        self.projects.team(project).await
    }
}
