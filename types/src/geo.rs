//! Coordinates and their provenance.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// A WGS84 position in decimal degrees.
///
/// Valid by construction: both parts are finite and in range. Values are never
/// mutated after creation; a new device fix produces a new `Coordinate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Build a coordinate from optional parts, as profile records carry them.
    ///
    /// Returns `None` unless both parts are present and valid.
    #[must_use]
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        Self::new(lat?, lon?).ok()
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lon(self) -> f64 {
        self.lon
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lon)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(value: Coordinate) -> Self {
        Self {
            lat: value.lat,
            lon: value.lon,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lon)
    }
}

/// Which resolution step produced a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationSource {
    LiveGps,
    StoredProfile,
    GeocodedCity,
}

impl LocationSource {
    /// Higher is better. Live positioning beats anything read from the profile.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::LiveGps => 3,
            Self::StoredProfile => 2,
            Self::GeocodedCity => 1,
        }
    }

    #[must_use]
    pub fn outranks(self, other: Self) -> bool {
        self.precedence() > other.precedence()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LiveGps => "live_gps",
            Self::StoredProfile => "stored_profile",
            Self::GeocodedCity => "geocoded_city",
        }
    }
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted resolution: a coordinate plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub coordinate: Coordinate,
    pub source: LocationSource,
}

impl Fix {
    #[must_use]
    pub const fn new(coordinate: Coordinate, source: LocationSource) -> Self {
        Self { coordinate, source }
    }
}
