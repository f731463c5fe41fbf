//! In-memory rating queue for testing.
//!
//! Behaves like a single durable queue: published payloads wait until
//! [`MockRatingQueue::deliver_all`] hands them to a consumer. Acknowledged and
//! rejected messages both leave the queue; nothing is requeued.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BusError, ConnectionState, DeliveryHandler, Disposition, RatingQueue, Result};
use crate::model::RatingRequest;

/// Mock rating queue for testing.
pub struct MockRatingQueue {
    queue_name: String,
    pending: RwLock<VecDeque<Vec<u8>>>,
    published: RwLock<Vec<Vec<u8>>>,
    fail_on_publish: RwLock<bool>,
    state: ConnectionState,
}

impl Default for MockRatingQueue {
    fn default() -> Self {
        Self::new(super::DEFAULT_QUEUE)
    }
}

impl MockRatingQueue {
    pub fn new(queue_name: impl Into<String>) -> Self {
        let state = ConnectionState::new();
        state.set_connected(true);
        Self {
            queue_name: queue_name.into(),
            pending: RwLock::new(VecDeque::new()),
            published: RwLock::new(Vec::new()),
            fail_on_publish: RwLock::new(false),
            state,
        }
    }

    /// Simulate a broker outage: publishes fail and health reports disconnected.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
        self.state.set_connected(!fail);
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    /// Every payload ever published, in order.
    pub async fn published(&self) -> Vec<Vec<u8>> {
        self.published.read().await.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Enqueue a raw body, bypassing validation. Lets tests inject
    /// malformed or hand-built messages.
    pub async fn push_raw(&self, payload: impl Into<Vec<u8>>) {
        self.pending.write().await.push_back(payload.into());
    }

    /// Deliver every pending message to `handler`, in order.
    ///
    /// Returns the disposition of each delivery.
    pub async fn deliver_all(&self, handler: &dyn DeliveryHandler) -> Vec<Disposition> {
        let mut dispositions = Vec::new();
        loop {
            let next = self.pending.write().await.pop_front();
            let Some(payload) = next else {
                break;
            };
            dispositions.push(handler.handle(&payload).await);
        }
        dispositions
    }
}

#[async_trait]
impl RatingQueue for MockRatingQueue {
    async fn publish(&self, request: &RatingRequest) -> Result<()> {
        if *self.fail_on_publish.read().await {
            return Err(BusError::Connection("Mock publish failure".to_string()));
        }
        let payload = serde_json::to_vec(request)?;
        self.published.write().await.push(payload.clone());
        self.pending.write().await.push_back(payload);
        Ok(())
    }

    fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }
}
