use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

use proxima_providers::retry::RetryConfig;
use proxima_providers::{ApiToken, HttpOptions, ServiceError};
use proxima_types::RadiusKm;

use crate::controller::{DiscoveryPolicy, Surface};
use crate::positioning::WatchOptions;

// Default value function for serde (bool::default() is false, so only true needs a fn)
pub(crate) const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct ProximaConfig {
    pub services: Option<ServicesConfig>,
    pub http: Option<HttpConfig>,
    pub positioning: Option<PositioningConfig>,
    pub discovery: Option<DiscoveryConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config is missing `{field}`")]
    Missing { field: &'static str },
    #[error("config `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Default, Deserialize)]
pub struct ServicesConfig {
    /// Marketplace API root serving users, professionals and projects.
    pub api_base_url: Option<String>,
    /// Geocoder root. Falls back to `api_base_url` when unset.
    pub geocoder_url: Option<String>,
    pub api_token: Option<String>,
    pub user_agent: Option<String>,
}

// Manual Debug impl to prevent leaking the API token in logs.
impl std::fmt::Debug for ServicesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesConfig")
            .field("api_base_url", &self.api_base_url)
            .field("geocoder_url", &self.geocoder_url)
            .field(
                "api_token",
                &if self.api_token.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    /// Retries for profile, geocoder and team reads. Directory searches and
    /// assignments are sent once.
    pub max_retries: Option<u32>,
    #[serde(default = "default_true")]
    pub https_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct PositioningConfig {
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub maximum_age_secs: u64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_secs: None,
            maximum_age_secs: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryConfig {
    pub map: Option<SurfaceConfig>,
    pub list: Option<SurfaceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct SurfaceConfig {
    pub radius_km: Option<f64>,
    #[serde(default = "default_true")]
    pub suppress_same_category: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            radius_km: None,
            suppress_same_category: true,
        }
    }
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find('}') {
            let var = &after[..end];
            if !var.is_empty() {
                out.push_str(&env::var(var).unwrap_or_default());
            }
            rest = &after[end + 1..];
        } else {
            out.push_str(&rest[start..]);
            rest = "";
        }
    }
    out.push_str(rest);

    out
}

impl ProximaConfig {
    /// Load `~/.proxima/config.toml`. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    fn services(&self) -> Option<&ServicesConfig> {
        self.services.as_ref()
    }

    pub fn api_base_url(&self) -> Result<String, ConfigError> {
        self.services()
            .and_then(|s| s.api_base_url.as_deref())
            .map(expand_env_vars)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing {
                field: "services.api_base_url",
            })
    }

    pub fn geocoder_base_url(&self) -> Result<String, ConfigError> {
        match self
            .services()
            .and_then(|s| s.geocoder_url.as_deref())
            .map(expand_env_vars)
            .filter(|url| !url.trim().is_empty())
        {
            Some(url) => Ok(url),
            None => self.api_base_url(),
        }
    }

    #[must_use]
    pub fn api_token(&self) -> Option<ApiToken> {
        self.services()
            .and_then(|s| s.api_token.as_deref())
            .map(expand_env_vars)
            .and_then(ApiToken::new)
    }

    #[must_use]
    pub fn http_options(&self) -> HttpOptions {
        let mut options = HttpOptions::default();
        if let Some(http) = &self.http {
            if let Some(secs) = http.connect_timeout_secs {
                options.connect_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = http.request_timeout_secs {
                options.request_timeout = Duration::from_secs(secs);
            }
            options.https_only = http.https_only;
        }
        if let Some(agent) = self.services().and_then(|s| s.user_agent.as_deref())
            && !agent.trim().is_empty()
        {
            options.user_agent = agent.trim().to_string();
        }
        options
    }

    #[must_use]
    pub fn read_retry(&self) -> RetryConfig {
        let config = RetryConfig::default();
        match self.http.as_ref().and_then(|h| h.max_retries) {
            Some(max_retries) => config.with_max_retries(max_retries),
            None => config,
        }
    }

    #[must_use]
    pub fn watch_options(&self) -> WatchOptions {
        let defaults = WatchOptions::default();
        let Some(positioning) = &self.positioning else {
            return defaults;
        };
        WatchOptions {
            high_accuracy: positioning.high_accuracy,
            timeout: positioning
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
            maximum_age: Duration::from_secs(positioning.maximum_age_secs),
        }
    }

    /// Discovery policy for `surface`, with the radius validated.
    pub fn policy(&self, surface: Surface) -> Result<DiscoveryPolicy, ConfigError> {
        let section = self.discovery.as_ref().and_then(|d| match surface {
            Surface::Map => d.map.as_ref(),
            Surface::List => d.list.as_ref(),
        });
        let mut policy = DiscoveryPolicy::for_surface(surface);
        let Some(section) = section else {
            return Ok(policy);
        };

        if let Some(raw) = section.radius_km {
            policy.radius = RadiusKm::new(raw).map_err(|e| ConfigError::Invalid {
                field: match surface {
                    Surface::Map => "discovery.map.radius_km",
                    Surface::List => "discovery.list.radius_km",
                },
                reason: e.to_string(),
            })?;
        }
        policy.suppress_same_category = section.suppress_same_category;
        Ok(policy)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".proxima").join("config.toml"))
}
