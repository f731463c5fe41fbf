//! Mock movie source for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ClientError, MovieSource};
use crate::model::Movie;

/// In-memory catalog pages. Records every requested window.
#[derive(Default)]
pub struct MockMovieSource {
    movies: Vec<Movie>,
    requests: RwLock<Vec<(u64, u64)>>,
    fail: RwLock<bool>,
}

impl MockMovieSource {
    pub fn new(movies: Vec<Movie>) -> Self {
        Self {
            movies,
            ..Default::default()
        }
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// `(offset, limit)` of every call so far.
    pub async fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl MovieSource for MockMovieSource {
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<Movie>, ClientError> {
        self.requests.write().await.push((offset, limit));
        if *self.fail.read().await {
            return Err(ClientError::Unavailable("Mock catalog failure".to_string()));
        }
        Ok(self
            .movies
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
