//! MongoDB implementations of storage interfaces.

mod catalog_store;
mod rating_store;

use std::time::Duration;

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::info;

pub use catalog_store::MongoCatalogStore;
pub use rating_store::MongoRatingStore;

use super::{Result, StorageConfig, StorageError};

/// Application name reported to the server.
const APP_NAME: &str = "reelrate";

/// Build a client with the configured timeouts.
///
/// The driver connects lazily; call [`ping`] to verify the server is up.
pub async fn connect(config: &StorageConfig) -> Result<Client> {
    let mut options = ClientOptions::parse(&config.uri).await?;
    let timeout = Duration::from_millis(config.timeout_ms);
    options.server_selection_timeout = Some(timeout);
    options.connect_timeout = Some(timeout);
    options.app_name = Some(APP_NAME.to_string());

    let client = Client::with_options(options)?;
    info!(database = %config.database, "MongoDB client created");
    Ok(client)
}

/// Run the `ping` command against `database`.
pub async fn ping(database: &Database) -> Result<()> {
    database.run_command(doc! { "ping": 1 }).await?;
    Ok(())
}

/// Hex form of an ObjectId, as used for keys outside the store.
pub(crate) fn key_of(oid: &ObjectId) -> String {
    oid.to_hex()
}

pub(crate) fn parse_key(key: &str) -> Result<ObjectId> {
    ObjectId::parse_str(key).map_err(|_| StorageError::InvalidKey(key.to_string()))
}

/// `_id` of a fetched document.
pub(crate) fn document_key(document: &Document) -> Result<String> {
    document
        .get_object_id("_id")
        .map(|oid| key_of(&oid))
        .map_err(|e| StorageError::Decode(format!("_id: {}", e)))
}

/// Genres with the legacy singular field as fallback.
pub(crate) fn genres_expr() -> mongodb::bson::Bson {
    doc! { "$ifNull": ["$movie.genres", "$movie.genre"] }.into()
}
