use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of the acting (signed-in) user.
    UserId
);

string_id!(
    /// Identifier of a professional in the directory.
    ///
    /// Professionals are users too; the project service addresses them by the
    /// same id when assigning.
    ProfessionalId
);

string_id!(
    /// Identifier of a construction project.
    ProjectId
);

impl From<&ProfessionalId> for UserId {
    fn from(value: &ProfessionalId) -> Self {
        Self::new(value.as_str())
    }
}
