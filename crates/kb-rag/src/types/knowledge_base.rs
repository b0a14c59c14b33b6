//! Knowledge base: a named, owned collection of documents searchable as one unit

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Knowledge base visibility
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to the owner only
    #[default]
    Private,
    /// Visible to everyone
    Public,
}

impl Visibility {
    /// Parse from the stored string form
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "public" => Self::Public,
            _ => Self::Private,
        }
    }

    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

/// A named collection of documents owned by a single user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Unique knowledge base ID
    pub id: Uuid,
    /// Owning user ID
    pub owner_id: Uuid,
    /// Display name
    pub name: String,
    /// Visibility
    pub visibility: Visibility,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last update timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl KnowledgeBase {
    /// Create a new private knowledge base
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            visibility: Visibility::Private,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}
