//! Bootstrap utilities for reelrate binaries.
//!
//! Shared initialization code for all service binaries.

use std::future::Future;

use backon::{ExponentialBuilder, Retryable};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LOG_ENV_VAR, LOG_FORMAT_ENV_VAR};

/// Initialize tracing with REELRATE_LOG environment variable.
///
/// Defaults to "info" level if REELRATE_LOG is not set. Output is JSON when
/// REELRATE_LOG_FORMAT is `json`, human-readable otherwise.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn json_logs() -> bool {
    std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Connect to a backing service with exponential backoff retry.
///
/// # Arguments
/// * `service_name` - Human-readable name for logging (e.g., "rabbitmq", "mongodb")
/// * `address` - Where the service is expected, for logging
/// * `backoff` - Delay schedule; its attempt bound ends the retries
/// * `connect` - Async function that attempts to establish a connection
///
/// # Returns
/// The connected client on success, or the last error once the backoff is
/// exhausted.
pub async fn connect_with_retry<T, E, F, Fut>(
    service_name: &str,
    address: &str,
    backoff: ExponentialBuilder,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let result = connect
        .retry(backoff)
        .notify(|e: &E, delay| {
            warn!(
                service = service_name,
                address = address,
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "Connection failed, retrying"
            );
        })
        .await;

    match &result {
        Ok(_) => info!(service = service_name, address = address, "Connected"),
        Err(e) => error!(
            service = service_name,
            address = address,
            error = %e,
            "Giving up on connection"
        ),
    }
    result
}

/// Resolves when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
