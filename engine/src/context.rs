//! Explicit session identity handed to the engine by the host.

use proxima_types::{Category, UserId};

/// Who is discovering. Supplied by the host's auth layer; the engine never
/// reads ambient storage for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub user: Option<UserId>,
    /// The acting user's own trade, used to hide same-trade peers.
    pub category: Option<Category>,
}

impl SessionContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: Some(user),
            category: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }
}
