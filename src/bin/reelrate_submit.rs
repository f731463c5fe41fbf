//! reelrate-submit: Rating submission endpoint
//!
//! Validates ratings and publishes them to the durable rating queue. Nothing
//! is buffered: when the broker is down, submissions fail with 500.
//!
//! ## Configuration
//! - REELRATE__MESSAGING__URL / RABBITMQ_URL: AMQP connection URL
//! - REELRATE__MESSAGING__QUEUE / QUEUE_NAME: rating queue
//! - PORT: listen port (default: 3003)

use std::sync::Arc;

use tracing::info;

use reelrate::bus::{AmqpConfig, AmqpRatingQueue};
use reelrate::config::{Config, ServiceKind};
use reelrate::handlers::{self, submission};
use reelrate::services::SubmissionService;
use reelrate::utils::bootstrap::{connect_with_retry, init_tracing, shutdown_signal};
use reelrate::utils::retry::connection_backoff;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let kind = ServiceKind::Submit;
    info!(service = %kind, queue = %config.messaging.queue, "Starting reelrate-submit");

    let queue = Arc::new(AmqpRatingQueue::new(AmqpConfig::from(&config.messaging))?);
    connect_with_retry(
        "rabbitmq",
        &config.messaging.queue,
        connection_backoff(&config.retry),
        || queue.connect(),
    )
    .await?;

    let service = Arc::new(SubmissionService::new(queue.clone()));

    handlers::serve(
        submission::router(service),
        &config.bind_address(kind),
        shutdown_signal(),
    )
    .await?;

    queue.close();
    info!("reelrate-submit stopped");
    Ok(())
}
