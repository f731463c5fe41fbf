//! Rating submission.
//!
//! Validates an incoming rating, stamps it with the send time and publishes
//! it once to the durable queue. No buffering, no deduplication.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::bus::{BusError, RatingQueue};
use crate::model::{RatingMessage, RatingRequest, ValidationError};

/// Errors from [`SubmissionService::submit`].
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Queue unavailable: {0}")]
    Queue(#[from] BusError),
}

/// Publishes validated ratings.
pub struct SubmissionService {
    queue: Arc<dyn RatingQueue>,
}

impl SubmissionService {
    pub fn new(queue: Arc<dyn RatingQueue>) -> Self {
        Self { queue }
    }

    /// Validate `message` and publish it.
    ///
    /// Returns the request exactly as published.
    pub async fn submit(&self, message: RatingMessage) -> Result<RatingRequest, SubmissionError> {
        let mut request = message.validate()?;
        request.timestamp = Some(Utc::now());

        if let Err(e) = self.queue.publish(&request).await {
            warn!(user_id = %request.user_id, movie_id = %request.movie_id, error = %e, "Rating not queued");
            return Err(e.into());
        }

        info!(
            user_id = %request.user_id,
            movie_id = %request.movie_id,
            rating = request.rating,
            queue = self.queue.queue_name(),
            "Rating queued"
        );
        Ok(request)
    }

    pub fn queue_name(&self) -> &str {
        self.queue.queue_name()
    }

    pub fn is_connected(&self) -> bool {
        self.queue.is_connected()
    }
}
