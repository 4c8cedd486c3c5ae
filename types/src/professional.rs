//! Professional directory records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Coordinate, ProfessionalId};

/// Trade of a marketplace participant.
///
/// Parsing is case- and separator-insensitive so that `"Land Owner"`,
/// `"land_owner"` and `"landowner"` all name the same category. Unknown
/// trades are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    LandOwner,
    Contractor,
    Architect,
    Engineer,
    InteriorDesigner,
    Labour,
    Supplier,
    Other(String),
}

impl Category {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "landowner" | "owner" | "landlord" => Self::LandOwner,
            "contractor" | "builder" => Self::Contractor,
            "architect" => Self::Architect,
            "engineer" | "civilengineer" | "structuralengineer" => Self::Engineer,
            "interiordesigner" | "interior" => Self::InteriorDesigner,
            "labour" | "labor" | "worker" => Self::Labour,
            "supplier" | "vendor" => Self::Supplier,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::LandOwner => "land_owner",
            Self::Contractor => "contractor",
            Self::Architect => "architect",
            Self::Engineer => "engineer",
            Self::InteriorDesigner => "interior_designer",
            Self::Labour => "labour",
            Self::Supplier => "supplier",
            Self::Other(raw) => raw,
        }
    }

    /// Land owners commission work; they are never candidates for hire.
    #[must_use]
    pub fn is_hireable(&self) -> bool {
        !matches!(self, Self::LandOwner)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A professional as returned by the directory, annotated with the
/// server-computed distance from the query origin.
///
/// Read-only from the engine's perspective; distance is never recomputed
/// client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalRecord {
    pub id: ProfessionalId,
    pub name: String,
    pub category: Category,
    pub sub_category: Option<String>,
    pub coordinate: Coordinate,
    pub distance_km: f64,
    pub rating: Option<f32>,
    pub experience_years: Option<u32>,
    pub resume_path: Option<String>,
    pub portfolio_url: Option<String>,
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Category;

    #[test]
    fn parse_normalizes_separators_and_case() {
        assert_eq!(Category::parse("Land Owner"), Category::LandOwner);
        assert_eq!(Category::parse("land_owner"), Category::LandOwner);
        assert_eq!(Category::parse("CONTRACTOR"), Category::Contractor);
        assert_eq!(
            Category::parse("interior-designer"),
            Category::InteriorDesigner
        );
    }

    #[test]
    fn unknown_category_round_trips_verbatim() {
        let c = Category::parse(" Plumber ");
        assert_eq!(c, Category::Other("Plumber".to_string()));
        assert_eq!(c.as_str(), "Plumber");
    }

    #[test]
    fn land_owner_is_not_hireable() {
        assert!(!Category::LandOwner.is_hireable());
        assert!(Category::Contractor.is_hireable());
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&Category::InteriorDesigner).unwrap();
        assert_eq!(json, "\"interior_designer\"");
        let back: Category = serde_json::from_str("\"Architect\"").unwrap();
        assert_eq!(back, Category::Architect);
    }
}
