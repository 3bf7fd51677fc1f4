//! # WorldFeed assembly
//!
//! Wires adapters into services from `Settings`. Shared by the server and the
//! seed binary so both see the same stores.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{AppState, CookieSettings};
use auth_adapters::CookieAuthProvider;
use configs::{LogFormat, LoggingSettings, Settings};
use domains::{BlobRef, BlobStore, IdentityVerifier, PaymentVerifier};
use minikit_adapters::{DevPortalPayments, WorldIdVerifier};
use secrecy::SecretString;
use services::{BucketCache, FeedService, PaymentService};
use storage_adapters::LocalBlobStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Everything a process needs to serve or seed.
pub struct Stack {
    pub feed: Arc<FeedService>,
    pub payments: Arc<PaymentService>,
    pub auth: Arc<CookieAuthProvider>,
    pub identity: Option<Arc<dyn IdentityVerifier>>,
}

/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[cfg(feature = "pinata")]
fn blob_store(settings: &Settings) -> anyhow::Result<Arc<dyn BlobStore>> {
    use storage_adapters::{PinataBlobStore, PinataConfig};

    let config = PinataConfig {
        jwt: settings.pinata.jwt.clone(),
        api_url: settings.pinata.api_url.clone(),
        gateway_url: settings.pinata.gateway_url.clone(),
        timeout: settings.pinata_timeout(),
        page_limit: settings.pinata.page_limit,
    };
    let local = LocalBlobStore::new(&settings.storage.data_dir);
    let store = PinataBlobStore::new(config, local).context("pinata store")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "pinata"))]
fn blob_store(settings: &Settings) -> anyhow::Result<Arc<dyn BlobStore>> {
    if settings.pinata.jwt.is_some() {
        warn!("pinata credentials ignored, built without the pinata feature");
    }
    Ok(Arc::new(LocalBlobStore::new(&settings.storage.data_dir)))
}

pub fn build_stack(settings: &Settings) -> anyhow::Result<Stack> {
    let store = blob_store(settings)?;
    info!(backend = store.backend(), data_dir = %settings.storage.data_dir.display(), "document store ready");

    let fallback = settings.storage.main_data_hash.as_deref().map(BlobRef::parse);
    let cache = Arc::new(BucketCache::new(store).with_global_fallback(fallback));
    let feed = Arc::new(FeedService::new(cache));

    let ttl = chrono::Duration::from_std(settings.session_ttl()).context("session ttl out of range")?;
    let auth = Arc::new(CookieAuthProvider::new(settings.auth.session_secret.as_ref(), ttl));

    let minikit = &settings.minikit;
    let timeout = settings.pinata_timeout();

    let identity: Option<Arc<dyn IdentityVerifier>> = match &minikit.app_id {
        Some(app_id) => Some(Arc::new(
            WorldIdVerifier::new(app_id.clone(), minikit.api_url.clone(), timeout)
                .context("identity verifier")?,
        )),
        None => {
            info!("no app id configured, identity proofs are not checked");
            None
        }
    };

    let payment_verifier: Option<Arc<dyn PaymentVerifier>> =
        match (&minikit.app_id, &minikit.dev_portal_api_key) {
            (Some(app_id), Some(key)) => Some(Arc::new(
                DevPortalPayments::new(
                    app_id.clone(),
                    SecretString::clone(key),
                    minikit.api_url.clone(),
                    timeout,
                )
                .context("payment verifier")?,
            )),
            _ => {
                warn!("developer portal not configured, payments confirm in dev mode");
                None
            }
        };

    Ok(Stack {
        feed,
        payments: Arc::new(PaymentService::new(payment_verifier)),
        auth,
        identity,
    })
}

pub fn app_state(stack: &Stack, settings: &Settings) -> AppState {
    let cookies = CookieSettings {
        max_age_secs: i64::try_from(settings.session_ttl().as_secs()).unwrap_or(i64::MAX),
        secure: settings.auth.secure_cookie,
    };
    let state = AppState::new(stack.feed.clone(), stack.payments.clone(), stack.auth.clone())
        .with_cookies(cookies);
    match &stack.identity {
        Some(verifier) => state.with_identity_verifier(verifier.clone()),
        None => state,
    }
}
