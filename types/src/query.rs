//! Proximity search queries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("search radius must be finite and in (0, {max}] km, got {value}")]
pub struct RadiusError {
    pub value: f64,
    pub max: f64,
}

/// Search radius in kilometres. Always positive, never larger than half the
/// planet's circumference.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RadiusKm(f64);

impl RadiusKm {
    pub const MAX: f64 = 20_000.0;

    /// Default radius for map-style discovery.
    pub const MAP_DEFAULT: Self = Self(50.0);

    /// Default radius for list-style discovery.
    pub const LIST_DEFAULT: Self = Self(100.0);

    pub fn new(value: f64) -> Result<Self, RadiusError> {
        if value.is_finite() && value > 0.0 && value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(RadiusError {
                value,
                max: Self::MAX,
            })
        }
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for RadiusKm {
    type Error = RadiusError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RadiusKm> for f64 {
    fn from(value: RadiusKm) -> Self {
        value.0
    }
}

/// Optional category / sub-category narrowing.
///
/// Blank strings are treated as "no filter" so that a cleared select box
/// does not produce `category=` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    category: Option<String>,
    sub_category: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CategoryFilter {
    #[must_use]
    pub fn new(category: Option<String>, sub_category: Option<String>) -> Self {
        Self {
            category: non_blank(category),
            sub_category: non_blank(sub_category),
        }
    }

    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn sub_category(&self) -> Option<&str> {
        self.sub_category.as_deref()
    }
}

/// A single directory lookup. Created fresh for every origin or filter change.
///
/// There is no way to build a query without an origin: "no location yet" is a
/// state of the controller, not an empty search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub origin: Coordinate,
    pub radius: RadiusKm,
    pub filter: CategoryFilter,
}

impl SearchQuery {
    #[must_use]
    pub fn new(origin: Coordinate, radius: RadiusKm, filter: CategoryFilter) -> Self {
        Self {
            origin,
            radius,
            filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryFilter, RadiusKm};

    #[test]
    fn radius_rejects_non_positive_and_huge() {
        assert!(RadiusKm::new(0.0).is_err());
        assert!(RadiusKm::new(-5.0).is_err());
        assert!(RadiusKm::new(f64::NAN).is_err());
        assert!(RadiusKm::new(25_000.0).is_err());
        assert!((RadiusKm::new(50.0).unwrap().get() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn blank_filters_collapse_to_none() {
        let filter = CategoryFilter::new(Some("  ".to_string()), Some(String::new()));
        assert_eq!(filter, CategoryFilter::any());

        let filter = CategoryFilter::new(Some(" Architect ".to_string()), None);
        assert_eq!(filter.category(), Some("Architect"));
        assert_eq!(filter.sub_category(), None);
    }
}
