//! Rating resolution and persistence consumer.
//!
//! Handles one delivery at a time:
//! 1. parse the JSON body
//! 2. check required fields and the rating range
//! 3. resolve the movie (see [`MovieResolver`])
//! 4. persist the rating
//!
//! Every discard is acknowledged and parked on the dead-letter queue, except
//! store failures, which are rejected without requeue and parked as well.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::bus::{DeliveryHandler, Disposition};
use crate::dlq::{DeadLetter, DeadLetterPublisher, RejectionReason};
use crate::model::{Rating, RatingMessage, RatingRequest, ValidationError};
use crate::storage::RatingStore;

use super::resolver::{MovieResolver, ResolutionTier};

/// Identifiers a request tried to resolve with.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted {
    pub movie_id: String,
    pub movie_name: Option<String>,
    pub year: Option<i32>,
}

impl From<&RatingRequest> for Attempted {
    fn from(request: &RatingRequest) -> Self {
        Self {
            movie_id: request.movie_id.to_string(),
            movie_name: request.movie_name.clone(),
            year: request.year,
        }
    }
}

/// Result of processing one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rating persisted.
    Stored {
        rating: Rating,
        tier: ResolutionTier,
    },
    /// Body was not a rating message.
    Malformed(String),
    MissingFields,
    InvalidRating(i64),
    /// No tier found the movie.
    Unresolved(Attempted),
    /// The store failed during resolution or insert.
    StoreFailure { attempted: Attempted, error: String },
}

impl Outcome {
    /// Broker disposition for this outcome.
    pub fn disposition(&self) -> Disposition {
        match self {
            Outcome::StoreFailure { .. } => Disposition::Reject,
            _ => Disposition::Ack,
        }
    }

    /// Why the message is being dropped; `None` when it was stored.
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            Outcome::Stored { .. } => None,
            Outcome::Malformed(_) => Some(RejectionReason::Malformed),
            Outcome::MissingFields => Some(RejectionReason::MissingFields),
            Outcome::InvalidRating(_) => Some(RejectionReason::InvalidRating),
            Outcome::Unresolved(_) => Some(RejectionReason::UnresolvedMovie),
            Outcome::StoreFailure { .. } => Some(RejectionReason::StoreFailure),
        }
    }

    fn dead_letter(&self, payload: &[u8]) -> Option<DeadLetter> {
        let reason = self.rejection_reason()?;
        let detail = match self {
            Outcome::Malformed(e) => format!("Invalid JSON: {}", e),
            Outcome::MissingFields => ValidationError::MissingFields.to_string(),
            Outcome::InvalidRating(r) => ValidationError::RatingOutOfRange(*r).to_string(),
            Outcome::Unresolved(_) => "Movie not found".to_string(),
            Outcome::StoreFailure { error, .. } => error.clone(),
            Outcome::Stored { .. } => return None,
        };

        let mut dead_letter = DeadLetter::new(reason, detail, payload);
        if let Outcome::Unresolved(attempted) | Outcome::StoreFailure { attempted, .. } = self {
            dead_letter = dead_letter.with_metadata("movie_id", &attempted.movie_id);
            if let Some(name) = &attempted.movie_name {
                dead_letter = dead_letter.with_metadata("movie_name", name);
            }
            if let Some(year) = attempted.year {
                dead_letter = dead_letter.with_metadata("year", year);
            }
        }
        Some(dead_letter)
    }
}

/// Consumes rating requests from the queue.
pub struct RatingConsumer {
    resolver: MovieResolver,
    ratings: Arc<dyn RatingStore>,
    dead_letters: Arc<dyn DeadLetterPublisher>,
}

impl RatingConsumer {
    pub fn new(
        resolver: MovieResolver,
        ratings: Arc<dyn RatingStore>,
        dead_letters: Arc<dyn DeadLetterPublisher>,
    ) -> Self {
        Self {
            resolver,
            ratings,
            dead_letters,
        }
    }

    /// Parse, validate, resolve and persist one message body.
    ///
    /// Logs the outcome once; dead-lettering is left to the caller.
    pub async fn process(&self, payload: &[u8]) -> Outcome {
        let message: RatingMessage = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Invalid JSON, discarding message");
                return Outcome::Malformed(e.to_string());
            }
        };

        let request = match message.validate() {
            Ok(request) => request,
            Err(ValidationError::RatingOutOfRange(rating)) => {
                warn!(rating, "Rating out of range, discarding");
                return Outcome::InvalidRating(rating);
            }
            Err(_) => {
                warn!("Message missing userId, movieId or rating, discarding");
                return Outcome::MissingFields;
            }
        };

        let attempted = Attempted::from(&request);

        let resolution = match self.resolver.resolve(&request).await {
            Ok(Some(resolution)) => resolution,
            Ok(None) => {
                warn!(
                    user_id = %request.user_id,
                    movie_id = %attempted.movie_id,
                    movie_name = attempted.movie_name.as_deref().unwrap_or(""),
                    year = attempted.year,
                    "Movie not found, discarding rating"
                );
                return Outcome::Unresolved(attempted);
            }
            Err(e) => {
                error!(
                    user_id = %request.user_id,
                    movie_id = %attempted.movie_id,
                    error = %e,
                    "Catalog lookup failed"
                );
                return Outcome::StoreFailure {
                    attempted,
                    error: e.to_string(),
                };
            }
        };

        let tier = resolution.tier;
        let title = resolution.movie.movie.title.clone();
        let new_rating = request.into_new_rating(resolution.movie.key, Utc::now());

        match self.ratings.insert(new_rating).await {
            Ok(rating) => {
                info!(
                    user_id = %rating.user_id,
                    movie_id = %attempted.movie_id,
                    movie_name = attempted.movie_name.as_deref().unwrap_or(""),
                    year = attempted.year,
                    tier = tier.as_str(),
                    title = %title,
                    rating = rating.rating,
                    "Rating stored"
                );
                Outcome::Stored { rating, tier }
            }
            Err(e) => {
                error!(
                    movie_id = %attempted.movie_id,
                    error = %e,
                    "Failed to store rating"
                );
                Outcome::StoreFailure {
                    attempted,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl DeliveryHandler for RatingConsumer {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        let outcome = self.process(payload).await;

        if let Some(dead_letter) = outcome.dead_letter(payload) {
            if let Err(e) = self.dead_letters.publish(dead_letter).await {
                error!(error = %e, "Failed to publish dead letter");
            }
        }

        outcome.disposition()
    }
}
