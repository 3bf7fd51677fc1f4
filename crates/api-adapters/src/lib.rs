//! # api-adapters
//!
//! The HTTP layer for WorldFeed, built on axum.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod session;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use error::{ApiError, ApiResult};
pub use metrics::Metrics;
pub use session::SESSION_COOKIE;
pub use state::{AppState, CookieSettings};

/// Builds the API router.
///
/// # Developer Note
/// Routes carry no prefix so the binary can mount the API wherever it wants
/// (e.g., `/api`).
pub fn router(state: AppState, debug_routes: bool) -> Router {
    let mut app: Router<AppState> = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/user", get(handlers::auth::current_user))
        .route(
            "/communities",
            get(handlers::communities::list).post(handlers::communities::create),
        )
        .route("/communities/{id}/news", get(handlers::communities::news))
        .route("/news", get(handlers::news::list).post(handlers::news::create))
        .route("/news/{id}/upvote", post(handlers::news::upvote))
        .route("/initiate-payment", post(handlers::payments::initiate))
        .route("/confirm-payment", post(handlers::payments::confirm))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics));

    if debug_routes {
        app = app
            .route("/debug/cache/clear", post(handlers::debug::clear_cache))
            .route("/debug/reload", post(handlers::debug::reload))
            .route(
                "/debug/seed",
                get(handlers::debug::seed_usage).post(handlers::debug::seed),
            )
            .route("/debug/data", get(handlers::debug::data))
            .route("/debug/pinata", get(handlers::debug::pins))
            .route("/debug/migrate", post(handlers::debug::migrate));
    }

    app.layer(middleware::trace_layer())
        .layer(middleware::cors_policy())
        .with_state(state)
}
