//! Mock RatingStore implementation for testing.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{MovieRatingSummary, NewRating, Rating, RatingDetail};
use crate::storage::helpers::{join_details, summarize};
use crate::storage::{RatingStore, Result, StorageError};

use super::{next_key, MockCatalogStore};

/// Mock rating store joined against a shared [`MockCatalogStore`].
pub struct MockRatingStore {
    catalog: Arc<MockCatalogStore>,
    ratings: RwLock<Vec<Rating>>,
    next_key: AtomicU64,
    fail_on_insert: RwLock<bool>,
    fail_on_read: RwLock<bool>,
}

impl MockRatingStore {
    pub fn new(catalog: Arc<MockCatalogStore>) -> Self {
        Self {
            catalog,
            ratings: RwLock::new(Vec::new()),
            next_key: AtomicU64::new(0),
            fail_on_insert: RwLock::new(false),
            fail_on_read: RwLock::new(false),
        }
    }

    pub async fn set_fail_on_insert(&self, fail: bool) {
        *self.fail_on_insert.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Every stored rating, in insertion order.
    pub async fn ratings(&self) -> Vec<Rating> {
        self.ratings.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.ratings.read().await.len()
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("Mock read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RatingStore for MockRatingStore {
    async fn insert(&self, rating: NewRating) -> Result<Rating> {
        if *self.fail_on_insert.read().await {
            return Err(StorageError::Unavailable("Mock insert failure".to_string()));
        }
        let stored = Rating::from_new(next_key(&self.next_key), rating);
        self.ratings.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn rating_details(&self) -> Result<Vec<RatingDetail>> {
        self.check_read().await?;
        let movies = self.catalog.all().await;
        Ok(join_details(&self.ratings.read().await, &movies))
    }

    async fn movie_summaries(&self) -> Result<Vec<MovieRatingSummary>> {
        self.check_read().await?;
        let movies = self.catalog.all().await;
        Ok(summarize(&self.ratings.read().await, &movies))
    }

    async fn ping(&self) -> Result<()> {
        self.check_read().await
    }
}
