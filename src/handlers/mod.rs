//! HTTP routers for the service binaries.
//!
//! Each module exposes `router(state) -> Router`, separated from serving so
//! tests can drive it with `tower::ServiceExt::oneshot`.

pub mod catalog;
pub mod error;
pub mod random;
pub mod ratings;
pub mod submission;

use std::future::Future;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// `"connected"` / `"disconnected"`, as health endpoints report it.
pub fn connection_label(connected: bool) -> &'static str {
    if connected {
        "connected"
    } else {
        "disconnected"
    }
}

/// Request tracing and permissive CORS, shared by every router.
pub(crate) fn with_common_layers(router: Router) -> Router {
    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve `app` on `addr` until `shutdown` resolves.
pub async fn serve<F>(
    app: Router,
    addr: &str,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(address = %local, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
