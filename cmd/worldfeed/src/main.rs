//! # WorldFeed server
//!
//! Loads settings, assembles the stack and serves the API under `/api`.

use anyhow::Context;
use axum::Router;
use configs::Settings;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    worldfeed::init_tracing(&settings.logging);

    let stack = worldfeed::build_stack(&settings)?;
    let state = worldfeed::app_state(&stack, &settings);
    let app = Router::new().nest("/api", api_adapters::router(state, settings.server.debug_routes));

    let address = settings.bind_addr();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, debug_routes = settings.server.debug_routes, "WorldFeed listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
