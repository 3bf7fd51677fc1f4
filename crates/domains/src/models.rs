//! # Domain Models
//!
//! These structs represent the entities WorldFeed persists. All four entity
//! kinds live as arrays inside one [`Document`] per bucket; the field names
//! match the persisted JSON layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format tag written into every document. Informational only.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Generates an opaque entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A topic space that news items are posted into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// User id of the creator
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    /// Denormalized; best-effort only
    #[serde(default)]
    pub news_count: u64,
    /// Denormalized; best-effort only
    #[serde(default)]
    pub total_upvotes: u64,
}

/// A post ("news item").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub community_id: String,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Reference of the content blob, when one was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs_hash: Option<String>,
    #[serde(default)]
    pub upvotes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A news item joined with display data for one viewer. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsView {
    #[serde(flatten)]
    pub item: NewsItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_name: Option<String>,
    pub user_upvoted: bool,
}

/// One row per (post, user) pair; presence means "upvoted".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upvote {
    pub id: String,
    pub news_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the user id
    pub id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub total_communities: u64,
    pub total_news: u64,
    pub total_upvotes: u64,
    pub total_users: u64,
}

/// The whole state of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub communities: Vec<Community>,
    pub news: Vec<NewsItem>,
    pub upvotes: Vec<Upvote>,
    pub profiles: Vec<Profile>,
    pub stats: Stats,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub version: String,
    /// Monotonic write counter, bumped on every successful store
    pub sequence: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            communities: Vec::new(),
            news: Vec::new(),
            upvotes: Vec::new(),
            profiles: Vec::new(),
            stats: Stats::default(),
            last_updated: Utc::now(),
            version: DOCUMENT_VERSION.to_string(),
            sequence: 0,
        }
    }
}

impl Document {
    pub fn community(&self, id: &str) -> Option<&Community> {
        self.communities.iter().find(|c| c.id == id)
    }

    pub fn community_mut(&mut self, id: &str) -> Option<&mut Community> {
        self.communities.iter_mut().find(|c| c.id == id)
    }

    pub fn news_item_mut(&mut self, id: &str) -> Option<&mut NewsItem> {
        self.news.iter_mut().find(|n| n.id == id)
    }

    pub fn profile(&self, user_id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == user_id)
    }

    pub fn has_upvote(&self, news_id: &str, user_id: &str) -> bool {
        self.upvotes
            .iter()
            .any(|u| u.news_id == news_id && u.user_id == user_id)
    }

    /// Recomputes the document-level stats block from the arrays.
    pub fn refresh_stats(&mut self) {
        self.stats = Stats {
            total_communities: self.communities.len() as u64,
            total_news: self.news.len() as u64,
            total_upvotes: self.upvotes.len() as u64,
            total_users: self.profiles.len() as u64,
        };
    }
}

/// Standalone content blob stored alongside a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The caller of a domain operation: who is acting, and under which display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A signed-in user, held by the auth provider rather than in any document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub world_id_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id_verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id_nullifier_hash: Option<String>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.display_name.clone())
    }
}
