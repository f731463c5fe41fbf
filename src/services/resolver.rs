//! Three-tier movie resolution.
//!
//! Tiers are tried in order and the first match wins:
//! 1. external identifier
//! 2. exact title, narrowed by year when one is given
//! 3. literal case-insensitive match on title, genres or directors

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::model::{RatingRequest, StoredMovie};
use crate::storage::{self, CatalogStore};

/// Which tier found the movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Identifier,
    ExactTitle,
    Fuzzy,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Identifier => "identifier",
            ResolutionTier::ExactTitle => "exact_title",
            ResolutionTier::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved movie and the tier that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tier: ResolutionTier,
    pub movie: StoredMovie,
}

/// Resolves rating requests against the catalog.
pub struct MovieResolver {
    catalog: Arc<dyn CatalogStore>,
}

impl MovieResolver {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Find the movie `request` refers to.
    ///
    /// `Ok(None)` when no tier matches. A store error from any tier stops
    /// resolution.
    pub async fn resolve(&self, request: &RatingRequest) -> storage::Result<Option<Resolution>> {
        if let Some(id) = request.movie_id.as_id() {
            if let Some(movie) = self.catalog.find_by_external_id(id).await? {
                return Ok(Some(Resolution {
                    tier: ResolutionTier::Identifier,
                    movie,
                }));
            }
            debug!(movie_id = id, "No movie with this identifier");
        }

        let Some(name) = request.lookup_name() else {
            return Ok(None);
        };

        if let Some(movie) = self.catalog.find_by_title(name, request.year).await? {
            return Ok(Some(Resolution {
                tier: ResolutionTier::ExactTitle,
                movie,
            }));
        }

        Ok(self
            .catalog
            .find_matching(name)
            .await?
            .map(|movie| Resolution {
                tier: ResolutionTier::Fuzzy,
                movie,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Movie, MovieRef};
    use crate::storage::{MockCatalogStore, StorageError};

    fn movie(id: i64, title: &str, year: i32, genres: &[&str], directors: &[&str]) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            year,
            genres: genres.iter().map(|s| s.to_string()).collect(),
            directors: directors.iter().map(|s| s.to_string()).collect(),
            plot: String::new(),
        }
    }

    fn request(movie_id: MovieRef, movie_name: Option<&str>, year: Option<i32>) -> RatingRequest {
        RatingRequest {
            user_id: "u1".to_string(),
            movie_id,
            movie_name: movie_name.map(str::to_string),
            year,
            rating: 4,
            comment: String::new(),
            timestamp: None,
        }
    }

    async fn resolver() -> (Arc<MockCatalogStore>, MovieResolver) {
        let catalog = Arc::new(
            MockCatalogStore::with_movies([
                movie(1, "The Heat", 2013, &["Comedy"], &["Paul Feig"]),
                movie(7, "Interstellar", 2014, &["Sci-Fi"], &["Christopher Nolan"]),
                movie(3, "Heat", 1995, &["Crime"], &["Michael Mann"]),
                movie(12, "Heat", 1986, &["Action"], &["Dick Richards"]),
            ])
            .await,
        );
        (catalog.clone(), MovieResolver::new(catalog))
    }

    #[tokio::test]
    async fn test_identifier_tier() {
        let (_, resolver) = resolver().await;

        let resolution = resolver
            .resolve(&request(MovieRef::Number(7), Some("Heat"), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.tier, ResolutionTier::Identifier);
        assert_eq!(resolution.movie.movie.title, "Interstellar");
    }

    #[tokio::test]
    async fn test_numeric_text_identifier() {
        let (_, resolver) = resolver().await;

        let resolution = resolver
            .resolve(&request(MovieRef::Text("7".to_string()), None, None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.movie.movie.id, 7);
    }

    #[tokio::test]
    async fn test_exact_title_beats_fuzzy() {
        let (_, resolver) = resolver().await;

        // "The Heat" comes first in natural order and fuzzy-matches "Heat"
        let resolution = resolver
            .resolve(&request(MovieRef::Number(9999), Some("Heat"), Some(1986)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.tier, ResolutionTier::ExactTitle);
        assert_eq!(resolution.movie.movie.id, 12);
    }

    #[tokio::test]
    async fn test_exact_title_trims_name() {
        let (_, resolver) = resolver().await;

        let resolution = resolver
            .resolve(&request(MovieRef::Number(9999), Some("  Interstellar "), None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.tier, ResolutionTier::ExactTitle);
    }

    #[tokio::test]
    async fn test_year_mismatch_falls_through_to_fuzzy() {
        let (_, resolver) = resolver().await;

        let resolution = resolver
            .resolve(&request(MovieRef::Number(9999), Some("Heat"), Some(2020)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.tier, ResolutionTier::Fuzzy);
        assert_eq!(resolution.movie.movie.title, "The Heat");
    }

    #[tokio::test]
    async fn test_fuzzy_matches_director() {
        let (_, resolver) = resolver().await;

        let resolution = resolver
            .resolve(&request(
                MovieRef::Text("tt0816692".to_string()),
                Some("nolan"),
                None,
            ))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolution.tier, ResolutionTier::Fuzzy);
        assert_eq!(resolution.movie.movie.id, 7);
    }

    #[tokio::test]
    async fn test_fuzzy_treats_name_literally() {
        let (_, resolver) = resolver().await;

        let resolution = resolver
            .resolve(&request(MovieRef::Number(9999), Some("H.at"), None))
            .await
            .unwrap();
        assert!(resolution.is_none());
    }

    #[tokio::test]
    async fn test_unresolvable() {
        let (_, resolver) = resolver().await;

        let by_name = resolver
            .resolve(&request(MovieRef::Number(9999), Some("NoSuchTitle"), None))
            .await
            .unwrap();
        assert!(by_name.is_none());

        let without_name = resolver
            .resolve(&request(MovieRef::Number(9999), None, None))
            .await
            .unwrap();
        assert!(without_name.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (catalog, resolver) = resolver().await;
        catalog.set_fail_on_read(true).await;

        let result = resolver
            .resolve(&request(MovieRef::Number(7), None, None))
            .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
