//! Durable rating queue.
//!
//! This module contains:
//! - `RatingQueue` trait: publishing rating requests
//! - `DeliveryHandler` trait: processing deliveries, deciding ack / nack
//! - `ConnectionState`: owned connectivity flag reported by health endpoints
//! - Queue configuration types
//! - Implementations: AMQP (RabbitMQ), Mock

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::RatingRequest;

// Implementation modules
#[cfg(feature = "amqp")]
pub mod amqp;
pub mod mock;

// Re-exports
#[cfg(feature = "amqp")]
pub use amqp::{AmqpConfig, AmqpRatingQueue};
pub use mock::MockRatingQueue;

/// Well-known queue carrying rating requests.
pub const DEFAULT_QUEUE: &str = "calificaciones_queue";

/// Suffix appended to the rating queue name for its dead-letter queue.
pub const DEAD_LETTER_SUFFIX: &str = "dead-letter";

// ============================================================================
// Traits
// ============================================================================

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish timed out after {0} ms")]
    Timeout(u64),
}

/// What the broker should do with a delivery once it has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Consume the message. Used for every terminal outcome, including
    /// deliberate discards.
    Ack,
    /// Negative-acknowledge without requeue: the broker drops the message.
    Reject,
}

/// Handler for raw deliveries from the queue.
///
/// Deliveries are handed over one at a time, in broker order.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Process one message body and decide its disposition.
    async fn handle(&self, payload: &[u8]) -> Disposition;
}

/// Interface for publishing rating requests.
///
/// Implementations:
/// - `AmqpRatingQueue`: RabbitMQ via AMQP
/// - `MockRatingQueue`: In-memory queue for testing
#[async_trait]
pub trait RatingQueue: Send + Sync {
    /// Publish one request as a persistent message.
    ///
    /// No buffering and no retry: a failure is returned to the caller.
    async fn publish(&self, request: &RatingRequest) -> Result<()>;

    /// Name of the queue requests are published to.
    fn queue_name(&self) -> &str;

    /// Whether the last interaction with the broker succeeded.
    fn is_connected(&self) -> bool;
}

// ============================================================================
// Connection state
// ============================================================================

/// Shared connectivity flag owned by a queue client.
///
/// Cloning shares the flag; the client flips it as connections come and go
/// and health endpoints read it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState(Arc<AtomicBool>);

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `"connected"` / `"disconnected"`, as health endpoints report it.
    pub fn label(&self) -> &'static str {
        if self.is_connected() {
            "connected"
        } else {
            "disconnected"
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Messaging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// AMQP connection URL.
    pub url: String,
    /// Queue carrying rating requests.
    pub queue: String,
    /// Dead-letter queue; defaults to `{queue}.dead-letter`.
    pub dead_letter_queue: Option<String>,
    /// Park discarded messages on the dead-letter queue.
    pub dead_letters_enabled: bool,
    /// Upper bound on a publish, broker confirmation included.
    pub publish_timeout_ms: u64,
    /// Unacknowledged deliveries the consumer may hold.
    pub prefetch: u16,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost:5672".to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            dead_letter_queue: None,
            dead_letters_enabled: true,
            publish_timeout_ms: 5_000,
            prefetch: 1,
        }
    }
}

impl MessagingConfig {
    /// Resolved dead-letter queue name.
    pub fn dead_letter_queue(&self) -> String {
        self.dead_letter_queue
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.queue, DEAD_LETTER_SUFFIX))
    }
}
