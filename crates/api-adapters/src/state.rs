use std::sync::Arc;

use domains::{AuthProvider, IdentityVerifier};
use services::{FeedService, MaintenanceService, PaymentService};

use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub max_age_secs: i64,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            max_age_secs: 24 * 60 * 60,
            secure: false,
        }
    }
}

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedService>,
    pub maintenance: Arc<MaintenanceService>,
    pub payments: Arc<PaymentService>,
    pub auth: Arc<dyn AuthProvider>,
    /// Absent when no app id is configured; proofs are then not checked.
    pub identity: Option<Arc<dyn IdentityVerifier>>,
    pub cookies: CookieSettings,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        feed: Arc<FeedService>,
        payments: Arc<PaymentService>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            maintenance: Arc::new(MaintenanceService::new(feed.clone())),
            feed,
            payments,
            auth,
            identity: None,
            cookies: CookieSettings::default(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_identity_verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.identity = Some(verifier);
        self
    }

    pub fn with_cookies(mut self, cookies: CookieSettings) -> Self {
        self.cookies = cookies;
        self
    }
}
