//! # seed
//!
//! Populates the configured store with demo content: a community when none
//! exists, five posts, and upvotes on each of them.

use anyhow::Context;
use configs::Settings;
use domains::AuthProvider;
use services::{NewCommunity, NewNews, DEMO_NEWS};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    worldfeed::init_tracing(&settings.logging);
    let stack = worldfeed::build_stack(&settings)?;
    let feed = &stack.feed;

    let user = stack.auth.sign_in(Some("demo@example.com".into()), None);
    let actor = user.actor();
    feed.ensure_profile(&actor.id, &actor.display_name).await?;
    info!(user = %actor.display_name, "seeding as demo user");

    let community = match feed.list_communities().await.into_iter().next() {
        Some(existing) => existing,
        None => {
            let created = feed
                .create_community(
                    NewCommunity {
                        name: "Tech News".into(),
                        description: "Latest technology news and updates".into(),
                    },
                    &actor,
                )
                .await
                .context("creating demo community")?;
            info!(community = %created.name, "demo community created");
            created
        }
    };

    let mut posted = Vec::new();
    for (title, content) in DEMO_NEWS {
        let input = NewNews {
            title: title.into(),
            content: content.into(),
            community_id: community.id.clone(),
            ipfs_hash: None,
        };
        match feed.create_news(input, &actor).await {
            Ok(news) => {
                info!(news_id = %news.item.id, title, "demo post created");
                posted.push(news.item.id);
            }
            Err(err) => warn!(title, error = %err, "demo post not created"),
        }
    }

    for news_id in &posted {
        match feed.toggle_upvote(news_id, &actor).await {
            Ok(outcome) => info!(%news_id, upvotes = outcome.upvotes, "demo upvote recorded"),
            Err(err) => warn!(%news_id, error = %err, "demo upvote failed"),
        }
    }

    info!(community = %community.name, posts = posted.len(), "seeding finished");
    Ok(())
}
