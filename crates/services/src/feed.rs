//! # Feed service
//!
//! Entity-level operations over the bucket cache. Communities live in the
//! global bucket; posts, upvotes and profiles live in the bucket of the
//! acting user's display name. Operations that touch both buckets run two
//! independent load/mutate/persist cycles.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use domains::{
    new_id, Actor, AppError, Bucket, Community, Document, NewsItem, NewsView, PostContent, Profile,
    Result, Upvote,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{BucketCache, Change};

#[derive(Debug, Clone, Default)]
pub struct NewCommunity {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewNews {
    pub title: String,
    pub content: String,
    pub community_id: String,
    /// Pre-stored content reference; one is created when absent
    pub ipfs_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewsFilter {
    pub community_id: Option<String>,
    pub author_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpvoteOutcome {
    pub upvoted: bool,
    pub upvotes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityNews {
    pub community: Community,
    pub news: Vec<NewsView>,
    #[serde(rename = "totalNews")]
    pub total_news: usize,
}

pub struct FeedService {
    cache: Arc<BucketCache>,
}

impl FeedService {
    pub fn new(cache: Arc<BucketCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<BucketCache> {
        &self.cache
    }

    pub async fn list_communities(&self) -> Vec<Community> {
        self.cache.read(&Bucket::Global).await.communities
    }

    pub async fn create_community(&self, input: NewCommunity, creator: &Actor) -> Result<Community> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("Community name is required".into()));
        }

        let community = Community {
            id: new_id(),
            name: name.to_string(),
            description: input.description.trim().to_string(),
            created_at: Utc::now(),
            created_by: creator.id.clone(),
            created_by_name: Some(creator.display_name.clone()),
            news_count: 0,
            total_upvotes: 0,
        };

        self.cache
            .update(&Bucket::Global, |doc| {
                doc.communities.push(community.clone());
                doc.refresh_stats();
                Ok(Change::Persist(()))
            })
            .await?;

        info!(community_id = %community.id, name = %community.name, creator = %creator.display_name, "community created");
        Ok(community)
    }

    /// Posts visible to `viewer` (the global bucket when anonymous), ranked.
    pub async fn list_news(&self, filter: &NewsFilter, viewer: Option<&Actor>) -> Vec<NewsView> {
        let bucket = viewer_bucket(viewer);
        let posts = self.cache.read(&bucket).await;
        let global = self.cache.read(&Bucket::Global).await;

        let items = posts.news.iter().filter(|item| {
            filter
                .community_id
                .as_deref()
                .map_or(true, |id| item.community_id == id)
                && filter
                    .author_id
                    .as_deref()
                    .map_or(true, |id| item.author_id == id)
        });

        let mut views = join(items, &global, &posts, viewer);
        rank(&mut views);
        views
    }

    pub async fn community_news(
        &self,
        community_id: &str,
        viewer: Option<&Actor>,
    ) -> Result<CommunityNews> {
        let global = self.cache.read(&Bucket::Global).await;
        let community = global
            .community(community_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Community", community_id))?;

        let posts = self.cache.read(&viewer_bucket(viewer)).await;
        let items = posts
            .news
            .iter()
            .filter(|item| item.community_id == community_id);

        let mut news = join(items, &global, &posts, viewer);
        rank(&mut news);
        Ok(CommunityNews {
            total_news: news.len(),
            community,
            news,
        })
    }

    pub async fn create_news(&self, input: NewNews, author: &Actor) -> Result<NewsView> {
        let title = input.title.trim();
        let content = input.content.trim();
        let community_id = input.community_id.trim();
        if title.is_empty() || content.is_empty() || community_id.is_empty() {
            return Err(AppError::ValidationError("Missing required fields".into()));
        }

        let community = self.find_community(community_id).await?;

        let ipfs_hash = match input.ipfs_hash.filter(|h| !h.trim().is_empty()) {
            Some(hash) => Some(hash),
            None => self.store_content(title, content).await,
        };

        let now = Utc::now();
        let item = NewsItem {
            id: new_id(),
            title: title.to_string(),
            content: content.to_string(),
            community_id: community.id.clone(),
            author_id: author.id.clone(),
            author_name: Some(author.display_name.clone()),
            ipfs_hash,
            upvotes: 0,
            created_at: now,
            updated_at: now,
        };

        let bucket = Bucket::for_display_name(Some(author.display_name.as_str()));
        self.cache
            .update(&bucket, |doc| {
                doc.news.push(item.clone());
                doc.refresh_stats();
                Ok(Change::Persist(()))
            })
            .await?;
        info!(news_id = %item.id, %bucket, community_id = %community.id, "news item created");

        let counted = self
            .cache
            .update(&Bucket::Global, |doc| match doc.community_mut(&community.id) {
                Some(c) => {
                    c.news_count += 1;
                    Ok(Change::Persist(()))
                }
                None => Ok(Change::Unchanged(())),
            })
            .await;
        if let Err(err) = counted {
            warn!(community_id = %community.id, error = %err, "news count not updated");
        }

        Ok(NewsView {
            item,
            community_name: Some(community.name),
            user_upvoted: false,
        })
    }

    /// Flips the (post, voter) upvote state.
    pub async fn toggle_upvote(&self, news_id: &str, voter: &Actor) -> Result<UpvoteOutcome> {
        let bucket = Bucket::for_display_name(Some(voter.display_name.as_str()));

        let (outcome, community_id) = self
            .cache
            .update(&bucket, |doc| {
                let upvoted = !doc.has_upvote(news_id, &voter.id);
                let (upvotes, community_id) = {
                    let item = doc
                        .news_item_mut(news_id)
                        .ok_or_else(|| AppError::not_found("News item", news_id))?;
                    item.upvotes = if upvoted {
                        item.upvotes + 1
                    } else {
                        item.upvotes.saturating_sub(1)
                    };
                    (item.upvotes, item.community_id.clone())
                };

                if upvoted {
                    doc.upvotes.push(Upvote {
                        id: new_id(),
                        news_id: news_id.to_string(),
                        user_id: voter.id.clone(),
                        created_at: Utc::now(),
                    });
                } else {
                    doc.upvotes
                        .retain(|u| !(u.news_id == news_id && u.user_id == voter.id));
                }
                doc.refresh_stats();

                Ok(Change::Persist((UpvoteOutcome { upvoted, upvotes }, community_id)))
            })
            .await?;

        let adjusted = self
            .cache
            .update(&Bucket::Global, |doc| match doc.community_mut(&community_id) {
                Some(c) => {
                    c.total_upvotes = if outcome.upvoted {
                        c.total_upvotes + 1
                    } else {
                        c.total_upvotes.saturating_sub(1)
                    };
                    Ok(Change::Persist(()))
                }
                None => Ok(Change::Unchanged(())),
            })
            .await;
        if let Err(err) = adjusted {
            warn!(%community_id, error = %err, "community upvote total not updated");
        }

        info!(news_id, voter = %voter.id, upvoted = outcome.upvoted, upvotes = outcome.upvotes, "upvote toggled");
        Ok(outcome)
    }

    /// Ids of the posts the user has upvoted in their bucket.
    pub async fn user_upvotes(&self, user: &Actor) -> Vec<String> {
        let doc = self
            .cache
            .read(&Bucket::for_display_name(Some(user.display_name.as_str())))
            .await;
        doc.upvotes
            .into_iter()
            .filter(|u| u.user_id == user.id)
            .map(|u| u.news_id)
            .collect()
    }

    /// Returns the existing profile, or creates it.
    pub async fn ensure_profile(&self, user_id: &str, display_name: &str) -> Result<Profile> {
        let profile = Profile {
            id: user_id.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };

        self.cache
            .update(&Bucket::for_display_name(Some(display_name)), |doc| {
                if let Some(existing) = doc.profile(user_id) {
                    return Ok(Change::Unchanged(existing.clone()));
                }
                doc.profiles.push(profile.clone());
                doc.refresh_stats();
                Ok(Change::Persist(profile.clone()))
            })
            .await
    }

    pub async fn profile(&self, user_id: &str, display_name: &str) -> Option<Profile> {
        self.cache
            .read(&Bucket::for_display_name(Some(display_name)))
            .await
            .profile(user_id)
            .cloned()
    }

    /// Looks a community up, forcing one reload of the global bucket on a miss.
    async fn find_community(&self, community_id: &str) -> Result<Community> {
        if let Some(c) = self.cache.read(&Bucket::Global).await.community(community_id) {
            return Ok(c.clone());
        }

        warn!(community_id, "community not cached, reloading global bucket");
        self.cache.invalidate(&Bucket::Global).await;
        self.cache
            .read(&Bucket::Global)
            .await
            .community(community_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Community", community_id))
    }

    async fn store_content(&self, title: &str, content: &str) -> Option<String> {
        let blob = PostContent {
            title: title.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        match self.cache.store().store_content(&blob).await {
            Ok(reference) => Some(reference.to_string()),
            Err(err) => {
                warn!(error = %err, "content blob not stored, continuing without it");
                None
            }
        }
    }
}

fn viewer_bucket(viewer: Option<&Actor>) -> Bucket {
    Bucket::for_display_name(viewer.map(|v| v.display_name.as_str()))
}

/// Denormalizes community and author names onto each post.
fn join<'a>(
    items: impl Iterator<Item = &'a NewsItem>,
    global: &Document,
    posts: &Document,
    viewer: Option<&Actor>,
) -> Vec<NewsView> {
    let upvoted: HashSet<&str> = match viewer {
        Some(v) => posts
            .upvotes
            .iter()
            .filter(|u| u.user_id == v.id)
            .map(|u| u.news_id.as_str())
            .collect(),
        None => HashSet::new(),
    };

    items
        .map(|item| {
            let mut item = item.clone();
            if let Some(profile) = posts.profile(&item.author_id) {
                item.author_name = Some(profile.display_name.clone());
            }
            NewsView {
                community_name: global.community(&item.community_id).map(|c| c.name.clone()),
                user_upvoted: upvoted.contains(item.id.as_str()),
                item,
            }
        })
        .collect()
}

/// Orders by upvotes descending, newest first on ties.
pub fn rank(news: &mut [NewsView]) {
    news.sort_by(|a, b| {
        b.item
            .upvotes
            .cmp(&a.item.upvotes)
            .then_with(|| b.item.created_at.cmp(&a.item.created_at))
    });
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use domains::{BlobRef, MockBlobStore};

    use super::*;

    fn view(id: &str, upvotes: u64, secs: i64) -> NewsView {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        NewsView {
            item: NewsItem {
                id: id.into(),
                title: id.into(),
                content: String::new(),
                community_id: "c".into(),
                author_id: "u".into(),
                author_name: None,
                ipfs_hash: None,
                upvotes,
                created_at: at,
                updated_at: at,
            },
            community_name: None,
            user_upvoted: false,
        }
    }

    /// Store that starts empty and accepts every write.
    fn accepting_store() -> MockBlobStore {
        let mut store = MockBlobStore::new();
        store.expect_latest().returning(|_| Ok(None));
        store
            .expect_store()
            .returning(|bucket, doc| Ok(BlobRef::Remote(format!("Qm{}{}", bucket.key(), doc.sequence))));
        store
            .expect_store_content()
            .returning(|_| Ok(BlobRef::Remote("QmContent".into())));
        store
    }

    fn service(store: MockBlobStore) -> FeedService {
        FeedService::new(Arc::new(BucketCache::new(Arc::new(store))))
    }

    #[test]
    fn rank_orders_by_upvotes_then_recency() {
        let mut news = vec![view("A", 2, 1), view("B", 2, 2), view("C", 5, 0)];
        rank(&mut news);
        let ids: Vec<_> = news.iter().map(|n| n.item.id.as_str()).collect();
        assert_eq!(ids, ["C", "B", "A"]);
    }

    #[tokio::test]
    async fn new_community_is_listed_with_zero_counters() {
        let feed = service(accepting_store());
        let alice = Actor::new("u1", "Alice");

        let created = feed
            .create_community(
                NewCommunity {
                    name: "Rustaceans".into(),
                    description: "All things Rust".into(),
                },
                &alice,
            )
            .await
            .unwrap();

        let listed = feed.list_communities().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].news_count, 0);
        assert_eq!(listed[0].total_upvotes, 0);
    }

    #[tokio::test]
    async fn blank_community_name_is_rejected() {
        let mut store = MockBlobStore::new();
        store.expect_store().times(0);
        let feed = service(store);

        let err = feed
            .create_community(NewCommunity::default(), &Actor::new("u1", "Alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn news_under_unknown_community_is_not_found_and_writes_nothing() {
        let mut store = MockBlobStore::new();
        // Initial load plus the forced reload.
        store.expect_latest().times(2).returning(|_| Ok(None));
        store.expect_store().times(0);
        store.expect_store_content().times(0);
        let feed = service(store);

        let err = feed
            .create_news(
                NewNews {
                    title: "Hello".into(),
                    content: "World".into(),
                    community_id: "missing".into(),
                    ipfs_hash: None,
                },
                &Actor::new("u1", "Alice"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, AppError::not_found("Community", "missing"));
    }

    #[tokio::test]
    async fn posting_bumps_news_count_and_records_content_reference() {
        let feed = service(accepting_store());
        let alice = Actor::new("u1", "Alice");
        let community = feed
            .create_community(NewCommunity { name: "Rust".into(), ..Default::default() }, &alice)
            .await
            .unwrap();

        let news = feed
            .create_news(
                NewNews {
                    title: "Edition 2024".into(),
                    content: "Shipped".into(),
                    community_id: community.id.clone(),
                    ipfs_hash: None,
                },
                &alice,
            )
            .await
            .unwrap();

        assert_eq!(news.item.ipfs_hash.as_deref(), Some("QmContent"));
        assert_eq!(news.community_name.as_deref(), Some("Rust"));
        assert_eq!(feed.list_communities().await[0].news_count, 1);

        // Visible to its author, not to anonymous viewers of the global bucket.
        let mine = feed.list_news(&NewsFilter::default(), Some(&alice)).await;
        assert_eq!(mine.len(), 1);
        assert!(feed.list_news(&NewsFilter::default(), None).await.is_empty());
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_count() {
        let feed = service(accepting_store());
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

        let first = feed.toggle_upvote(&news.item.id, &alice).await.unwrap();
        assert_eq!(first, UpvoteOutcome { upvoted: true, upvotes: 1 });
        assert_eq!(feed.user_upvotes(&alice).await, vec![news.item.id.clone()]);
        assert_eq!(feed.list_communities().await[0].total_upvotes, 1);

        let second = feed.toggle_upvote(&news.item.id, &alice).await.unwrap();
        assert_eq!(second, UpvoteOutcome { upvoted: false, upvotes: 0 });
        assert!(feed.user_upvotes(&alice).await.is_empty());
        assert_eq!(feed.list_communities().await[0].total_upvotes, 0);
    }

    #[tokio::test]
    async fn upvoting_unknown_post_is_not_found() {
        let feed = service(accepting_store());
        let err = feed
            .toggle_upvote("nope", &Actor::new("u1", "Alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("News item", _)));
    }

    #[tokio::test]
    async fn ensure_profile_is_idempotent() {
        let mut store = MockBlobStore::new();
        store.expect_latest().returning(|_| Ok(None));
        store
            .expect_store()
            .times(1)
            .returning(|_, _| Ok(BlobRef::Remote("QmProfile".into())));
        let feed = service(store);

        let first = feed.ensure_profile("u1", "Alice").await.unwrap();
        let again = feed.ensure_profile("u1", " ALICE ").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(again.display_name, "Alice");
        assert!(feed.profile("u1", "alice").await.is_some());
    }

    #[tokio::test]
    async fn unreachable_store_lists_nothing() {
        let mut store = MockBlobStore::new();
        store
            .expect_latest()
            .returning(|_| Err(AppError::Internal("connection refused".into())));
        let feed = service(store);

        assert!(feed.list_communities().await.is_empty());
        assert!(feed
            .list_news(&NewsFilter::default(), Some(&Actor::new("u1", "Alice")))
            .await
            .is_empty());
    }
}
