//! reelrate-catalog: Movie catalog service
//!
//! Serves listing, lookup, search and editing of the `movies` collection.
//!
//! ## Configuration
//! - REELRATE__STORAGE__URI / MONGO_URI: MongoDB connection string
//! - REELRATE__STORAGE__DATABASE: database name (default: moviesdb)
//! - PORT: listen port (default: 3002)

use std::sync::Arc;

use tracing::info;

use reelrate::config::{Config, ServiceKind};
use reelrate::handlers::{self, catalog};
use reelrate::storage::mongodb as mongo_store;
use reelrate::storage::{MongoCatalogStore, StorageError};
use reelrate::utils::bootstrap::{connect_with_retry, init_tracing, shutdown_signal};
use reelrate::utils::retry::connection_backoff;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let kind = ServiceKind::Catalog;
    info!(service = %kind, "Starting reelrate-catalog");

    let storage = &config.storage;
    let client = connect_with_retry(
        "mongodb",
        &storage.database,
        connection_backoff(&config.retry),
        || async move {
            let client = mongo_store::connect(storage).await?;
            mongo_store::ping(&client.database(&storage.database)).await?;
            Ok::<_, StorageError>(client)
        },
    )
    .await?;

    let store = Arc::new(MongoCatalogStore::new(&client, storage).await?);

    handlers::serve(
        catalog::router(store),
        &config.bind_address(kind),
        shutdown_signal(),
    )
    .await?;

    client.shutdown().await;
    info!("reelrate-catalog stopped");
    Ok(())
}
