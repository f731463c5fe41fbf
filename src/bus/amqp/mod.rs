//! AMQP (RabbitMQ) rating queue implementation.
//!
//! Requests are published through the default exchange straight to a durable
//! queue, as persistent messages with publisher confirms. The consumer side
//! runs a supervised loop that reconnects with exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use deadpool_lapin::{Manager, Pool, PoolError};
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use super::{
    BusError, ConnectionState, DeliveryHandler, Disposition, MessagingConfig, RatingQueue, Result,
};
use crate::model::RatingRequest;

/// Consumer tag announced to the broker.
const CONSUMER_TAG: &str = "reelrate-consumer";

/// Configuration for AMQP connection.
#[derive(Clone, Debug)]
pub struct AmqpConfig {
    /// AMQP connection URL (e.g., amqp://localhost:5672).
    pub url: String,
    /// Durable queue for rating requests.
    pub queue: String,
    /// Unacknowledged deliveries held by the consumer.
    pub prefetch: u16,
    /// Upper bound on a publish, confirmation included.
    pub publish_timeout: Duration,
}

impl AmqpConfig {
    /// Create config for a queue with default limits.
    pub fn new(url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
            prefetch: 1,
            publish_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&MessagingConfig> for AmqpConfig {
    fn from(config: &MessagingConfig) -> Self {
        Self {
            url: config.url.clone(),
            queue: config.queue.clone(),
            prefetch: config.prefetch.max(1),
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
        }
    }
}

/// AMQP rating queue using RabbitMQ.
///
/// Owns the connection pool and the connectivity flag. Created once at
/// startup and shared through `Arc`; [`AmqpRatingQueue::close`] releases the
/// pool on shutdown.
pub struct AmqpRatingQueue {
    pool: Pool,
    config: AmqpConfig,
    state: ConnectionState,
}

impl AmqpRatingQueue {
    /// Create the queue client. No connection is opened until
    /// [`AmqpRatingQueue::connect`] or the first publish.
    pub fn new(config: AmqpConfig) -> Result<Self> {
        let manager = Manager::new(config.url.clone(), Default::default());
        let pool = Pool::builder(manager)
            .max_size(10)
            .build()
            .map_err(|e| BusError::Connection(format!("Failed to create pool: {}", e)))?;

        Ok(Self {
            pool,
            config,
            state: ConnectionState::new(),
        })
    }

    /// Open a connection and declare the durable queue.
    pub async fn connect(&self) -> Result<()> {
        let result = async {
            let channel = get_channel(&self.pool).await?;
            declare_queue(&channel, &self.config.queue).await
        }
        .await;

        self.state.set_connected(result.is_ok());
        if result.is_ok() {
            info!(
                queue = %self.config.queue,
                url = %self.config.url,
                "Connected to AMQP"
            );
        }
        result
    }

    /// Connectivity flag shared with health endpoints.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.clone()
    }

    /// Connection pool, for publishers sharing this broker connection.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    /// Close the pool; open connections are dropped.
    pub fn close(&self) {
        self.pool.close();
        self.state.set_connected(false);
        info!(queue = %self.config.queue, "AMQP pool closed");
    }

    /// Start consuming in a background task.
    ///
    /// The task reconnects forever; abort the returned handle to stop it.
    pub fn consume(
        &self,
        handler: Arc<dyn DeliveryHandler>,
        backoff: ExponentialBuilder,
    ) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let config = self.config.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            Self::consume_with_reconnect(pool, config, state, handler, backoff).await;
        })
    }

    /// Consumer loop with automatic reconnection and exponential backoff with jitter.
    async fn consume_with_reconnect(
        pool: Pool,
        config: AmqpConfig,
        state: ConnectionState,
        handler: Arc<dyn DeliveryHandler>,
        backoff_builder: ExponentialBuilder,
    ) {
        use futures::StreamExt;

        const FALLBACK_DELAY: Duration = Duration::from_secs(30);

        let mut backoff_iter = backoff_builder.build();

        loop {
            match Self::setup_consumer(&pool, &config).await {
                Ok(mut consumer) => {
                    state.set_connected(true);
                    info!(
                        queue = %config.queue,
                        prefetch = config.prefetch,
                        "Consumer connected, processing messages"
                    );
                    // Reset backoff on successful connection
                    backoff_iter = backoff_builder.build();

                    // One delivery at a time keeps processing in broker order
                    while let Some(delivery) = consumer.next().await {
                        match delivery {
                            Ok(delivery) => {
                                Self::process_delivery(delivery, handler.as_ref()).await;
                            }
                            Err(e) => {
                                error!(error = %e, "Consumer delivery error, will reconnect");
                                break;
                            }
                        }
                    }

                    state.set_connected(false);
                    info!(queue = %config.queue, "Consumer stream ended, reconnecting...");
                }
                Err(e) => {
                    state.set_connected(false);
                    let delay = backoff_iter.next().unwrap_or(FALLBACK_DELAY);
                    error!(
                        error = %e,
                        backoff_ms = %delay.as_millis(),
                        queue = %config.queue,
                        "Failed to set up consumer, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            // Brief pause before reconnecting after stream end (not error)
            let delay = backoff_iter.next().unwrap_or(FALLBACK_DELAY);
            tokio::time::sleep(delay).await;
        }
    }

    /// Set up consumer channel, queue and prefetch.
    async fn setup_consumer(pool: &Pool, config: &AmqpConfig) -> Result<lapin::Consumer> {
        let channel = get_channel(pool).await?;
        declare_queue(&channel, &config.queue).await?;

        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to set prefetch: {}", e)))?;

        channel
            .basic_consume(
                &config.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))
    }

    /// Hand one delivery to the handler and settle it with the broker.
    async fn process_delivery(delivery: lapin::message::Delivery, handler: &dyn DeliveryHandler) {
        let span = tracing::info_span!(
            "queue.consume",
            delivery_tag = delivery.delivery_tag,
            redelivered = delivery.redelivered
        );

        async {
            debug!(bytes = delivery.data.len(), "Received delivery");

            match handler.handle(&delivery.data).await {
                Disposition::Ack => {
                    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                        error!(error = %e, "Failed to ack message");
                    }
                }
                Disposition::Reject => {
                    let options = BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    };
                    if let Err(e) = delivery.nack(options).await {
                        error!(error = %e, "Failed to nack message");
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl RatingQueue for AmqpRatingQueue {
    #[tracing::instrument(name = "queue.publish", skip_all, fields(queue = %self.config.queue))]
    async fn publish(&self, request: &RatingRequest) -> Result<()> {
        let payload = serde_json::to_vec(request)?;
        let timeout = self.config.publish_timeout;

        let result = match tokio::time::timeout(
            timeout,
            publish_persistent(&self.pool, &self.config.queue, &payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout(timeout.as_millis() as u64)),
        };

        match &result {
            Ok(()) => {
                self.state.set_connected(true);
                debug!(user_id = %request.user_id, movie_id = %request.movie_id, "Published rating request");
            }
            Err(BusError::Connection(_)) | Err(BusError::Timeout(_)) => {
                self.state.set_connected(false);
                warn!(error = ?result, "Publish failed, broker unreachable");
            }
            Err(e) => {
                warn!(error = %e, "Publish failed");
            }
        }

        result
    }

    fn queue_name(&self) -> &str {
        &self.config.queue
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}

// ============================================================================
// Channel helpers
// ============================================================================

/// Get a channel from the pool.
async fn get_channel(pool: &Pool) -> Result<Channel> {
    let conn = pool.get().await.map_err(|e: PoolError| {
        BusError::Connection(format!("Failed to get connection from pool: {}", e))
    })?;

    conn.create_channel()
        .await
        .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))
}

/// Declare a durable queue. Idempotent.
async fn declare_queue(channel: &Channel, queue: &str) -> Result<()> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))?;
    Ok(())
}

/// Publish a JSON payload as a persistent message and wait for the broker
/// to confirm it.
///
/// The queue is declared first: publishing through the default exchange to
/// a missing queue would silently drop the message.
pub(crate) async fn publish_persistent(pool: &Pool, queue: &str, payload: &[u8]) -> Result<()> {
    let channel = get_channel(pool).await?;
    declare_queue(&channel, queue).await?;

    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(|e| BusError::Publish(format!("Failed to enable confirms: {}", e)))?;

    let properties = BasicProperties::default()
        .with_content_type("application/json".into())
        .with_delivery_mode(2); // persistent

    let confirmation = channel
        .basic_publish("", queue, BasicPublishOptions::default(), payload, properties)
        .await
        .map_err(|e| BusError::Publish(format!("Failed to publish: {}", e)))?
        .await
        .map_err(|e| BusError::Publish(format!("Publish confirmation failed: {}", e)))?;

    if confirmation.is_nack() {
        return Err(BusError::Publish("Broker refused message".to_string()));
    }

    Ok(())
}
