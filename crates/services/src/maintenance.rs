//! Operator tooling behind the debug routes: cache control, raw state dumps,
//! counter audits, demo seeding and the stored-blob listing.

use std::sync::Arc;

use domains::{Actor, Community, NewsView, PinnedBlob, Result, DOCUMENT_VERSION};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::BucketState;
use crate::feed::{FeedService, NewCommunity, NewsFilter};

/// Posts created by the seed binary.
pub const DEMO_NEWS: [(&str, &str); 5] = [
    (
        "Breaking: Major Technology Breakthrough",
        "Scientists have announced a groundbreaking discovery that could revolutionize the tech industry. This breakthrough promises to change how we interact with technology in our daily lives.",
    ),
    (
        "Industry Report: Market Trends 2024",
        "The latest industry report shows significant growth in emerging technologies. Market analysts predict continued expansion in the sector over the next quarter.",
    ),
    (
        "New Innovation Hub Opens Downtown",
        "A state-of-the-art innovation hub has opened its doors to startups and entrepreneurs. The facility offers cutting-edge resources and collaborative spaces for the tech community.",
    ),
    (
        "Conference Highlights: Key Insights",
        "Industry leaders gathered to share insights on future trends and challenges. The conference featured presentations on sustainability, innovation, and digital transformation.",
    ),
    (
        "Product Launch: Revolutionary Platform",
        "A new platform has been launched that promises to streamline workflows and improve productivity. Early users report significant improvements in efficiency and collaboration.",
    ),
];

#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    pub communities: usize,
    pub news: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityAudit {
    #[serde(flatten)]
    pub community: Community,
    pub actual_news_count: u64,
    pub actual_total_upvotes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpStats {
    pub total_communities: usize,
    pub total_news: usize,
    pub total_upvotes: u64,
    pub average_news_per_community: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDump {
    pub communities: Vec<CommunityAudit>,
    pub news: Vec<NewsView>,
    pub stats: DumpStats,
    pub buckets: Vec<BucketState>,
    pub data_structure_version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub migrated: bool,
    /// Always false: the recomputed counters are reported, not written.
    pub persisted: bool,
    pub communities: usize,
    pub news: usize,
    pub updated_communities: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeededCommunity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub message: String,
    pub user: String,
    pub communities_created: usize,
    pub communities: Vec<SeededCommunity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinListing {
    pub backend: &'static str,
    pub total_files: usize,
    pub files: Vec<PinnedBlob>,
}

pub struct MaintenanceService {
    feed: Arc<FeedService>,
}

impl MaintenanceService {
    pub fn new(feed: Arc<FeedService>) -> Self {
        Self { feed }
    }

    pub async fn clear_cache(&self) {
        self.feed.cache().clear().await;
    }

    pub async fn reload(&self, viewer: Option<&Actor>) -> ReloadSummary {
        self.clear_cache().await;
        let communities = self.feed.list_communities().await.len();
        let news = self.feed.list_news(&NewsFilter::default(), viewer).await.len();
        info!(communities, news, "buckets reloaded");
        ReloadSummary { communities, news }
    }

    pub async fn dump(&self, viewer: Option<&Actor>) -> DataDump {
        let communities = self.feed.list_communities().await;
        let news = self.feed.list_news(&NewsFilter::default(), viewer).await;
        let audits = audit(&communities, &news);

        let total_upvotes = news.iter().map(|n| n.item.upvotes).sum();
        let average_news_per_community = if communities.is_empty() {
            0.0
        } else {
            news.len() as f64 / communities.len() as f64
        };

        DataDump {
            stats: DumpStats {
                total_communities: communities.len(),
                total_news: news.len(),
                total_upvotes,
                average_news_per_community,
            },
            communities: audits,
            news,
            buckets: self.feed.cache().snapshot().await,
            data_structure_version: DOCUMENT_VERSION,
        }
    }

    /// Recomputes community counters from the visible posts. Nothing is written.
    pub async fn migrate(&self, viewer: Option<&Actor>) -> MigrationReport {
        self.clear_cache().await;
        let communities = self.feed.list_communities().await;
        let news = self.feed.list_news(&NewsFilter::default(), viewer).await;

        let updated_communities = audit(&communities, &news)
            .iter()
            .filter(|a| {
                a.actual_news_count != a.community.news_count
                    || a.actual_total_upvotes != a.community.total_upvotes
            })
            .count();
        let migrated = updated_communities > 0;

        info!(updated_communities, "counter audit finished");
        MigrationReport {
            migrated,
            persisted: false,
            communities: communities.len(),
            news: news.len(),
            updated_communities,
            message: if migrated {
                "Counters recomputed (dry run, not persisted)".into()
            } else {
                "No migration needed, data is already up to date".into()
            },
        }
    }

    /// Creates the demo communities for `user`; individual failures are skipped.
    pub async fn seed(&self, user: &Actor) -> SeedReport {
        let mut created = Vec::new();
        for (name, description) in demo_communities(&user.display_name) {
            let input = NewCommunity {
                name: name.clone(),
                description,
            };
            match self.feed.create_community(input, user).await {
                Ok(c) => created.push(SeededCommunity { id: c.id, name: c.name }),
                Err(err) => warn!(community = %name, error = %err, "demo community not created"),
            }
        }

        SeedReport {
            message: format!("Demo data seeded successfully for {}", user.display_name),
            user: user.display_name.clone(),
            communities_created: created.len(),
            communities: created,
        }
    }

    pub async fn pins(&self) -> Result<PinListing> {
        let store = self.feed.cache().store();
        let files = store.list().await?;
        Ok(PinListing {
            backend: store.backend(),
            total_files: files.len(),
            files,
        })
    }
}

fn audit(communities: &[Community], news: &[NewsView]) -> Vec<CommunityAudit> {
    communities
        .iter()
        .map(|community| {
            let posts = news.iter().filter(|n| n.item.community_id == community.id);
            let (count, upvotes) = posts.fold((0, 0), |(c, u), n| (c + 1, u + n.item.upvotes));
            CommunityAudit {
                community: community.clone(),
                actual_news_count: count,
                actual_total_upvotes: upvotes,
            }
        })
        .collect()
}

/// Demo communities differ per user so bucket isolation is visible.
fn demo_communities(display_name: &str) -> Vec<(String, String)> {
    match display_name.trim().to_lowercase().as_str() {
        "alice" => vec![
            ("Alice's Reading Club".into(), "Book discussions and reviews".into()),
            ("Science Fiction".into(), "Sci-fi books and movies".into()),
            ("Fantasy Worlds".into(), "Fantasy literature discussions".into()),
        ],
        "bob" => vec![
            ("Bob's Tech Hub".into(), "Technology news and discussions".into()),
            ("Programming Tips".into(), "Coding tutorials and tips".into()),
            ("Web Development".into(), "Frontend and backend development".into()),
        ],
        _ => vec![
            (
                format!("{display_name}'s Community"),
                format!("Personal community for {display_name}"),
            ),
            ("General Discussion".into(), "General topics and conversations".into()),
            ("Announcements".into(), "Important updates and news".into()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use domains::{AppError, BlobRef, Bucket, MockBlobStore};

    use super::*;
    use crate::cache::BucketCache;
    use crate::feed::NewNews;

    fn accepting_store() -> MockBlobStore {
        let mut store = MockBlobStore::new();
        store.expect_latest().returning(|_| Ok(None));
        store
            .expect_store()
            .returning(|bucket, doc| Ok(BlobRef::Local(format!("{}-{}", bucket.key(), doc.sequence))));
        store.expect_backend().return_const("local");
        store
            .expect_list()
            .returning(|| Err(AppError::Internal("listing unavailable".into())));
        store
    }

    fn services() -> (Arc<FeedService>, MaintenanceService) {
        let cache = Arc::new(BucketCache::new(Arc::new(accepting_store())));
        let feed = Arc::new(FeedService::new(cache));
        (feed.clone(), MaintenanceService::new(feed))
    }

    #[test]
    fn demo_communities_depend_on_the_user() {
        assert_eq!(demo_communities(" Alice")[0].0, "Alice's Reading Club");
        assert_eq!(demo_communities("bob")[0].0, "Bob's Tech Hub");
        assert_eq!(demo_communities("Carol")[0].0, "Carol's Community");
    }

    #[tokio::test]
    async fn seed_creates_three_communities() {
        let (feed, maintenance) = services();
        let report = maintenance.seed(&Actor::new("u1", "Bob")).await;
        assert_eq!(report.communities_created, 3);
        assert_eq!(feed.list_communities().await.len(), 3);
    }

    #[tokio::test]
    async fn dump_reports_actual_counts_next_to_stored_ones() {
        let (feed, maintenance) = services();
        let alice = Actor::new("u1", "Alice");
        let community = feed
            .create_community(NewCommunity { name: "Rust".into(), ..Default::default() }, &alice)
            .await
            .unwrap();
        let news = feed
            .create_news(
                NewNews {
                    title: "t".into(),
                    content: "c".into(),
                    community_id: community.id.clone(),
                    ipfs_hash: Some("QmGiven".into()),
                },
                &alice,
            )
            .await
            .unwrap();
        feed.toggle_upvote(&news.item.id, &alice).await.unwrap();

        let dump = maintenance.dump(Some(&alice)).await;
        assert_eq!(dump.stats.total_communities, 1);
        assert_eq!(dump.stats.total_news, 1);
        assert_eq!(dump.stats.total_upvotes, 1);
        assert_eq!(dump.communities[0].actual_news_count, 1);
        assert_eq!(dump.communities[0].community.news_count, 1);
        assert!(dump
            .buckets
            .iter()
            .any(|b| b.bucket == Bucket::for_display_name(Some("alice")).key()));
    }

    #[tokio::test]
    async fn listing_errors_surface() {
        let (_, maintenance) = services();
        assert!(maintenance.pins().await.is_err());
    }
}
