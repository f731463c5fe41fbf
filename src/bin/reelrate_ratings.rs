//! reelrate-ratings: Rating consumer and aggregation queries
//!
//! Consumes the rating queue, resolves each request against the catalog and
//! stores the rating. Serves the stored ratings over HTTP.
//!
//! ## Architecture
//! ```text
//! [calificaciones_queue] -> [RatingConsumer] -> [MongoDB ratings]
//!          |                       |                   |
//!          v                       v                   v
//!   reconnect loop        [dead-letter queue]   [REST API :3004]
//! ```
//!
//! ## Configuration
//! - REELRATE__MESSAGING__URL / RABBITMQ_URL: AMQP connection URL
//! - REELRATE__STORAGE__URI / MONGO_URI: MongoDB connection string
//! - REELRATE__MESSAGING__DEAD_LETTERS_ENABLED: park discarded messages
//! - PORT: listen port (default: 3004)

use std::sync::Arc;

use tracing::info;

use reelrate::bus::{AmqpConfig, AmqpRatingQueue};
use reelrate::config::{Config, ServiceKind};
use reelrate::dlq;
use reelrate::handlers::{self, ratings, ratings::RatingsState};
use reelrate::services::{MovieResolver, RatingConsumer};
use reelrate::storage::mongodb as mongo_store;
use reelrate::storage::{MongoCatalogStore, MongoRatingStore, StorageError};
use reelrate::utils::bootstrap::{connect_with_retry, init_tracing, shutdown_signal};
use reelrate::utils::retry::{connection_backoff, reconnect_backoff};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let kind = ServiceKind::Ratings;
    info!(service = %kind, queue = %config.messaging.queue, "Starting reelrate-ratings");

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

    let catalog = Arc::new(MongoCatalogStore::new(&client, storage).await?);
    let rating_store = Arc::new(MongoRatingStore::new(&client, storage).await?);

    let queue = AmqpRatingQueue::new(AmqpConfig::from(&config.messaging))?;
    connect_with_retry(
        "rabbitmq",
        &config.messaging.queue,
        connection_backoff(&config.retry),
        || queue.connect(),
    )
    .await?;

    let dead_letters = dlq::create_publisher(&config.messaging, queue.pool());
    let consumer = Arc::new(RatingConsumer::new(
        MovieResolver::new(catalog),
        rating_store.clone(),
        dead_letters,
    ));
    let consumer_task = queue.consume(consumer, reconnect_backoff(&config.retry));

    let state = RatingsState {
        store: rating_store,
        consumer: queue.connection_state(),
    };
    handlers::serve(
        ratings::router(state),
        &config.bind_address(kind),
        shutdown_signal(),
    )
    .await?;

    consumer_task.abort();
    queue.close();
    client.shutdown().await;
    info!("reelrate-ratings stopped");
    Ok(())
}
