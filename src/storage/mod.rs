//! Movie catalog and rating persistence.
//!
//! - [`CatalogStore`]: movie lookups used by the resolver and the catalog API
//! - [`RatingStore`]: rating inserts and the aggregation views
//! - Implementations: MongoDB, Mock

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{Movie, MovieRatingSummary, NewRating, Rating, RatingDetail, StoredMovie};

pub mod helpers;
pub mod mock;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use mock::{MockCatalogStore, MockRatingStore};

#[cfg(feature = "mongodb")]
pub use self::mongodb::{MongoCatalogStore, MongoRatingStore};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Movie not found: {0}")]
    NotFound(String),

    #[error("Movie with id {0} already exists")]
    Conflict(i64),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed document: {0}")]
    Decode(String),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] ::mongodb::error::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON decode error: {0}")]
    Bson(#[from] ::mongodb::bson::de::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] ::mongodb::bson::ser::Error),
}

/// Read and write access to the movie catalog.
///
/// Implementations:
/// - `MongoCatalogStore`: MongoDB `movies` collection
/// - `MockCatalogStore`: in-memory, insertion ordered
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Movie whose external `id` equals `id`.
    async fn find_by_external_id(&self, id: i64) -> Result<Option<StoredMovie>>;

    /// Movie whose title equals `title` exactly, and whose year equals
    /// `year` when one is given.
    async fn find_by_title(&self, title: &str, year: Option<i32>) -> Result<Option<StoredMovie>>;

    /// First movie, in the store's natural order, whose title, a genre or a
    /// director contains `needle` case-insensitively. `needle` is matched
    /// literally.
    async fn find_matching(&self, needle: &str) -> Result<Option<StoredMovie>>;

    /// Every movie [`CatalogStore::find_matching`] would consider.
    async fn search(&self, needle: &str) -> Result<Vec<Movie>>;

    /// One page of the catalog ordered by external id.
    async fn list(&self, offset: u64, limit: i64) -> Result<Vec<Movie>>;

    /// Insert a movie. Fails with [`StorageError::Conflict`] when the
    /// external id is taken.
    async fn insert(&self, movie: Movie) -> Result<StoredMovie>;

    /// Replace the movie with the same external id, keeping its key.
    /// `None` when no such movie exists.
    async fn replace(&self, movie: Movie) -> Result<Option<StoredMovie>>;

    /// Delete the movie with external id `id`, returning it. Ratings that
    /// point at it are left in place.
    async fn delete(&self, id: i64) -> Result<Option<StoredMovie>>;

    /// Round-trip to the backing store.
    async fn ping(&self) -> Result<()>;
}

/// Rating persistence and aggregation.
///
/// Implementations:
/// - `MongoRatingStore`: MongoDB `ratings` collection, joined with `movies`
/// - `MockRatingStore`: in-memory, joined with a `MockCatalogStore`
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Persist a rating; the store assigns its id.
    async fn insert(&self, rating: NewRating) -> Result<Rating>;

    /// Every rating joined with its movie. Ratings whose movie is gone are
    /// left out.
    async fn rating_details(&self) -> Result<Vec<RatingDetail>>;

    /// Per-movie statistics for movies with at least one rating, ordered by
    /// title then movie key.
    async fn movie_summaries(&self) -> Result<Vec<MovieRatingSummary>>;

    /// Round-trip to the backing store.
    async fn ping(&self) -> Result<()>;
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// MongoDB connection string.
    pub uri: String,
    pub database: String,
    pub movies_collection: String,
    pub ratings_collection: String,
    /// Server selection and connect timeout.
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "moviesdb".to_string(),
            movies_collection: "movies".to_string(),
            ratings_collection: "ratings".to_string(),
            timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.database, "moviesdb");
        assert_eq!(config.movies_collection, "movies");
        assert_eq!(config.ratings_collection, "ratings");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Conflict(7);
        assert_eq!(err.to_string(), "Movie with id 7 already exists");

        let err = StorageError::InvalidKey("xyz".to_string());
        assert!(err.to_string().contains("xyz"));
    }
}
