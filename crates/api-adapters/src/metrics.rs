//! Prometheus counters for the user-facing write paths.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

pub struct Metrics {
    registry: Registry,
    pub logins: Counter,
    pub communities_created: Counter,
    pub posts_created: Counter,
    pub upvote_toggles: Counter,
    pub payment_confirmations: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("worldfeed");
        let logins = Counter::default();
        let communities_created = Counter::default();
        let posts_created = Counter::default();
        let upvote_toggles = Counter::default();
        let payment_confirmations = Counter::default();

        registry.register("logins", "Sessions issued", logins.clone());
        registry.register("communities_created", "Communities created", communities_created.clone());
        registry.register("posts_created", "News items created", posts_created.clone());
        registry.register("upvote_toggles", "Upvotes added or removed", upvote_toggles.clone());
        registry.register(
            "payment_confirmations",
            "Tips confirmed",
            payment_confirmations.clone(),
        );

        Self {
            registry,
            logins,
            communities_created,
            posts_created,
            upvote_toggles,
            payment_confirmations,
        }
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}
