//! Mock CatalogStore implementation for testing.

use std::sync::atomic::AtomicU64;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{Movie, StoredMovie};
use crate::storage::helpers::{literal_matcher, movie_matches};
use crate::storage::{CatalogStore, Result, StorageError};

use super::next_key;

/// Mock catalog that keeps movies in insertion order.
#[derive(Default)]
pub struct MockCatalogStore {
    movies: RwLock<Vec<StoredMovie>>,
    next_key: AtomicU64,
    fail_on_read: RwLock<bool>,
    fail_on_write: RwLock<bool>,
}

impl MockCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-loaded with `movies`, in order.
    pub async fn with_movies(movies: impl IntoIterator<Item = Movie>) -> Self {
        let store = Self::new();
        for movie in movies {
            store.seed(movie).await;
        }
        store
    }

    /// Add a movie without the duplicate-id check, the way an external
    /// seeder would.
    pub async fn seed(&self, movie: Movie) -> StoredMovie {
        let stored = StoredMovie {
            key: next_key(&self.next_key),
            movie,
        };
        self.movies.write().await.push(stored.clone());
        stored
    }

    /// Delete a movie by external id, leaving its ratings orphaned.
    pub async fn remove(&self, id: i64) -> Option<StoredMovie> {
        let mut movies = self.movies.write().await;
        let index = movies.iter().position(|m| m.movie.id == id)?;
        Some(movies.remove(index))
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    /// Snapshot of every stored movie.
    pub async fn all(&self) -> Vec<StoredMovie> {
        self.movies.read().await.clone()
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("Mock read failure".to_string()));
        }
        Ok(())
    }

    async fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(StorageError::Unavailable("Mock write failure".to_string()));
        }
        Ok(())
    }

    async fn find_first(&self, predicate: impl Fn(&Movie) -> bool) -> Result<Option<StoredMovie>> {
        self.check_read().await?;
        Ok(self
            .movies
            .read()
            .await
            .iter()
            .find(|m| predicate(&m.movie))
            .cloned())
    }
}

#[async_trait]
impl CatalogStore for MockCatalogStore {
    async fn find_by_external_id(&self, id: i64) -> Result<Option<StoredMovie>> {
        self.find_first(|m| m.id == id).await
    }

    async fn find_by_title(&self, title: &str, year: Option<i32>) -> Result<Option<StoredMovie>> {
        self.find_first(|m| m.title == title && year.map_or(true, |y| m.year == y))
            .await
    }

    async fn find_matching(&self, needle: &str) -> Result<Option<StoredMovie>> {
        let matcher = literal_matcher(needle)?;
        self.find_first(|m| movie_matches(m, &matcher)).await
    }

    async fn search(&self, needle: &str) -> Result<Vec<Movie>> {
        self.check_read().await?;
        let matcher = literal_matcher(needle)?;
        Ok(self
            .movies
            .read()
            .await
            .iter()
            .filter(|m| movie_matches(&m.movie, &matcher))
            .map(|m| m.movie.clone())
            .collect())
    }

    async fn list(&self, offset: u64, limit: i64) -> Result<Vec<Movie>> {
        self.check_read().await?;
        let mut movies: Vec<Movie> = self
            .movies
            .read()
            .await
            .iter()
            .map(|m| m.movie.clone())
            .collect();
        movies.sort_by_key(|m| m.id);

        Ok(movies
            .into_iter()
            .skip(offset as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn insert(&self, movie: Movie) -> Result<StoredMovie> {
        self.check_write().await?;
        if self.find_by_external_id(movie.id).await?.is_some() {
            return Err(StorageError::Conflict(movie.id));
        }
        Ok(self.seed(movie).await)
    }

    async fn replace(&self, movie: Movie) -> Result<Option<StoredMovie>> {
        self.check_write().await?;
        let mut movies = self.movies.write().await;
        let Some(slot) = movies.iter_mut().find(|m| m.movie.id == movie.id) else {
            return Ok(None);
        };
        slot.movie = movie;
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, id: i64) -> Result<Option<StoredMovie>> {
        self.check_write().await?;
        Ok(self.remove(id).await)
    }

    async fn ping(&self) -> Result<()> {
        self.check_read().await
    }
}
