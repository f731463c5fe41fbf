//! Dead Letter Queue (DLQ) infrastructure.
//!
//! Every rating message the consumer discards is parked here instead of
//! vanishing, so operators can inspect and replay it.
//!
//! ## Message Format
//!
//! JSON [`DeadLetter`]:
//! - `reason`: why the message was discarded
//! - `detail`: human-readable explanation
//! - `payload`: the original message body (lossy UTF-8)
//! - `metadata`: attempted identifiers and similar context
//!
//! ## Usage
//!
//! ```ignore
//! let dlq: Arc<dyn DeadLetterPublisher> =
//!     Arc::new(AmqpDeadLetterPublisher::new(
//!         queue.pool(),
//!         "calificaciones_queue.dead-letter",
//!         Duration::from_secs(5),
//!     ));
//!
//! let dead_letter = DeadLetter::new(RejectionReason::UnresolvedMovie, "no tier matched", body)
//!     .with_metadata("movie_id", "9999");
//! dlq.publish(dead_letter).await?;
//! ```

use std::collections::BTreeMap;
#[cfg(feature = "amqp")]
use std::fmt;
#[cfg(feature = "amqp")]
use std::future::Future;
#[cfg(feature = "amqp")]
use std::sync::Arc;
#[cfg(feature = "amqp")]
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors that can occur during DLQ operations.
#[derive(Debug, thiserror::Error)]
pub enum DlqError {
    #[error("Failed to serialize message: {0}")]
    Serialization(String),

    #[error("Failed to publish to DLQ: {0}")]
    PublishFailed(String),
}

/// Why a message was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Body was not valid JSON of the expected shape.
    Malformed,
    /// `userId`, `movieId` or `rating` absent.
    MissingFields,
    /// `rating` outside 1..5.
    InvalidRating,
    /// No resolution tier found the movie.
    UnresolvedMovie,
    /// The store failed while resolving or persisting.
    StoreFailure,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Malformed => "malformed",
            RejectionReason::MissingFields => "missing_fields",
            RejectionReason::InvalidRating => "invalid_rating",
            RejectionReason::UnresolvedMovie => "unresolved_movie",
            RejectionReason::StoreFailure => "store_failure",
        }
    }
}

/// Dead letter queue entry for a discarded rating message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: Uuid,
    pub reason: RejectionReason,
    /// Human-readable reason for rejection.
    pub detail: String,
    /// Original message body.
    pub payload: String,
    pub occurred_at: DateTime<Utc>,
    /// Which component sent to DLQ.
    pub source_component: String,
    /// Additional context.
    pub metadata: BTreeMap<String, String>,
}

impl DeadLetter {
    pub fn new(reason: RejectionReason, detail: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4(),
            reason,
            detail: detail.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            occurred_at: Utc::now(),
            source_component: "rating-consumer".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add metadata to the dead letter.
    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Trait for publishing messages to a dead letter queue.
///
/// Implementations handle the actual transport (AMQP, in-memory, none).
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    /// Publish a dead letter to the queue.
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError>;
}

/// No-op DLQ publisher that logs but doesn't actually send anywhere.
///
/// Used when dead letters are disabled.
pub struct NoopDeadLetterPublisher;

#[async_trait]
impl DeadLetterPublisher for NoopDeadLetterPublisher {
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError> {
        warn!(
            reason = dead_letter.reason.as_str(),
            detail = %dead_letter.detail,
            source = %dead_letter.source_component,
            "DLQ disabled, dropping dead letter"
        );
        Ok(())
    }
}

/// In-memory DLQ publisher using a channel.
///
/// Used for testing.
pub struct ChannelDeadLetterPublisher {
    sender: mpsc::UnboundedSender<DeadLetter>,
}

impl ChannelDeadLetterPublisher {
    /// Create a new channel-based DLQ publisher.
    ///
    /// Returns the publisher and a receiver for consuming dead letters.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeadLetter>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeadLetterPublisher for ChannelDeadLetterPublisher {
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError> {
        debug!(reason = dead_letter.reason.as_str(), "Publishing to channel DLQ");
        self.sender
            .send(dead_letter)
            .map_err(|e| DlqError::PublishFailed(e.to_string()))
    }
}

/// DLQ publisher writing to a durable RabbitMQ queue.
#[cfg(feature = "amqp")]
pub struct AmqpDeadLetterPublisher {
    pool: deadpool_lapin::Pool,
    queue: String,
    publish_timeout: Duration,
}

#[cfg(feature = "amqp")]
impl AmqpDeadLetterPublisher {
    /// Share an existing pool; dead letters ride the same connection as ratings.
    ///
    /// `publish_timeout` bounds the publish including the broker confirm.
    pub fn new(
        pool: deadpool_lapin::Pool,
        queue: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            queue: queue.into(),
            publish_timeout,
        }
    }
}

#[cfg(feature = "amqp")]
#[async_trait]
impl DeadLetterPublisher for AmqpDeadLetterPublisher {
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError> {
        let payload = serde_json::to_vec(&dead_letter)
            .map_err(|e| DlqError::Serialization(e.to_string()))?;

        within(
            self.publish_timeout,
            crate::bus::amqp::publish_persistent(&self.pool, &self.queue, &payload),
        )
        .await?;

        info!(
            queue = %self.queue,
            id = %dead_letter.id,
            reason = dead_letter.reason.as_str(),
            "Parked message on dead-letter queue"
        );
        Ok(())
    }
}

/// Await a publish, giving up once `limit` elapses.
#[cfg(feature = "amqp")]
async fn within<F, E>(limit: Duration, publish: F) -> Result<(), DlqError>
where
    F: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    match tokio::time::timeout(limit, publish).await {
        Ok(result) => result.map_err(|e| DlqError::PublishFailed(e.to_string())),
        Err(_) => Err(DlqError::PublishFailed(format!(
            "no broker confirm within {}ms",
            limit.as_millis()
        ))),
    }
}

/// Create a DLQ publisher based on configuration.
///
/// Returns NoopDeadLetterPublisher when dead letters are disabled.
#[cfg(feature = "amqp")]
pub fn create_publisher(
    config: &crate::bus::MessagingConfig,
    pool: deadpool_lapin::Pool,
) -> Arc<dyn DeadLetterPublisher> {
    if config.dead_letters_enabled {
        let queue = config.dead_letter_queue();
        info!(queue = %queue, "Dead letters enabled");
        Arc::new(AmqpDeadLetterPublisher::new(
            pool,
            queue,
            Duration::from_millis(config.publish_timeout_ms),
        ))
    } else {
        debug!("Dead letters disabled, using noop publisher");
        Arc::new(NoopDeadLetterPublisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_letter_keeps_payload() {
        let dl = DeadLetter::new(
            RejectionReason::UnresolvedMovie,
            "Movie not found",
            br#"{"movieId":9999}"#,
        );

        assert_eq!(dl.reason, RejectionReason::UnresolvedMovie);
        assert_eq!(dl.payload, r#"{"movieId":9999}"#);
        assert_eq!(dl.source_component, "rating-consumer");
    }

    #[test]
    fn test_dead_letter_lossy_payload() {
        let dl = DeadLetter::new(RejectionReason::Malformed, "Invalid JSON", &[0xff, b'{']);
        assert!(dl.payload.ends_with('{'));
    }

    #[test]
    fn test_with_metadata() {
        let dl = DeadLetter::new(RejectionReason::UnresolvedMovie, "not found", b"{}")
            .with_metadata("movie_id", 9999)
            .with_metadata("movie_name", "NoSuchTitle");

        assert_eq!(dl.metadata.get("movie_id"), Some(&"9999".to_string()));
        assert_eq!(
            dl.metadata.get("movie_name"),
            Some(&"NoSuchTitle".to_string())
        );
    }

    #[test]
    fn test_dead_letter_json() {
        let dl = DeadLetter::new(RejectionReason::StoreFailure, "insert failed", b"{}");
        let value = serde_json::to_value(&dl).unwrap();

        assert_eq!(value["reason"], "store_failure");
        assert_eq!(value["sourceComponent"], "rating-consumer");
        assert!(value["occurredAt"].is_string());
    }

    #[test]
    fn test_reason_names_match_serde() {
        for reason in [
            RejectionReason::Malformed,
            RejectionReason::MissingFields,
            RejectionReason::InvalidRating,
            RejectionReason::UnresolvedMovie,
            RejectionReason::StoreFailure,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.as_str());
        }
    }

    #[tokio::test]
    async fn test_noop_publisher_succeeds() {
        let publisher = NoopDeadLetterPublisher;
        let dl = DeadLetter::new(RejectionReason::Malformed, "bad", b"x");

        assert!(publisher.publish(dl).await.is_ok());
    }

    #[tokio::test]
    async fn test_channel_publisher_preserves_order() {
        let (publisher, mut receiver) = ChannelDeadLetterPublisher::new();

        for i in 0..3 {
            let dl = DeadLetter::new(RejectionReason::MissingFields, format!("msg-{}", i), b"{}");
            publisher.publish(dl).await.unwrap();
        }

        for i in 0..3 {
            let received = receiver.recv().await.expect("Should receive");
            assert_eq!(received.detail, format!("msg-{}", i));
        }
    }

    #[tokio::test]
    async fn test_channel_publisher_closed_receiver() {
        let (publisher, receiver) = ChannelDeadLetterPublisher::new();
        drop(receiver);

        let dl = DeadLetter::new(RejectionReason::Malformed, "bad", b"x");
        let result = publisher.publish(dl).await;
        assert!(matches!(result, Err(DlqError::PublishFailed(_))));
    }

    #[test]
    fn test_dlq_error_display() {
        let err = DlqError::PublishFailed("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[cfg(feature = "amqp")]
    #[tokio::test]
    async fn test_unconfirmed_publish_times_out() {
        let stalled = std::future::pending::<Result<(), String>>();
        let result = within(Duration::from_millis(20), stalled).await;

        match result {
            Err(DlqError::PublishFailed(msg)) => assert!(msg.contains("20ms")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[cfg(feature = "amqp")]
    #[tokio::test]
    async fn test_publish_error_within_limit_is_reported() {
        let refused = async { Err::<(), _>("connection refused") };
        let result = within(Duration::from_secs(1), refused).await;
        assert!(matches!(result, Err(DlqError::PublishFailed(m)) if m == "connection refused"));

        assert!(within(Duration::from_secs(1), async { Ok::<(), String>(()) })
            .await
            .is_ok());
    }
}
