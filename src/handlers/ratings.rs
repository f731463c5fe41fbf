//! Rating aggregation API.
//!
//! - `GET /ratings`: every rating joined with its movie
//! - `GET /movies-with-ratings`: per-movie averages and counts
//! - `GET /health`: broker flag plus a live database ping

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use super::{connection_label, with_common_layers, ApiError};
use crate::bus::ConnectionState;
use crate::model::{MovieRatingSummary, RatingDetail};
use crate::storage::RatingStore;

/// Shared state for the aggregation handlers.
#[derive(Clone)]
pub struct RatingsState {
    pub store: Arc<dyn RatingStore>,
    /// Connectivity of the consumer feeding the store.
    pub consumer: ConnectionState,
}

/// Build the aggregation router.
pub fn router(state: RatingsState) -> Router {
    let routes = Router::new()
        .route("/ratings", get(ratings))
        .route("/movies-with-ratings", get(movies_with_ratings))
        .route("/health", get(health))
        .with_state(state);
    with_common_layers(routes)
}

#[derive(Serialize)]
struct RatingsResponse {
    count: usize,
    ratings: Vec<RatingDetail>,
}

async fn ratings(State(state): State<RatingsState>) -> Result<Json<RatingsResponse>, ApiError> {
    let ratings = state
        .store
        .rating_details()
        .await
        .map_err(|e| ApiError::internal("Error fetching ratings", e))?;

    Ok(Json(RatingsResponse {
        count: ratings.len(),
        ratings,
    }))
}

async fn movies_with_ratings(
    State(state): State<RatingsState>,
) -> Result<Json<Vec<MovieRatingSummary>>, ApiError> {
    let summaries = state
        .store
        .movie_summaries()
        .await
        .map_err(|e| ApiError::internal("Error fetching movies with ratings", e))?;
    Ok(Json(summaries))
}

async fn health(State(state): State<RatingsState>) -> Json<serde_json::Value> {
    let mongodb = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database ping failed");
            false
        }
    };

    Json(json!({
        "status": "ok",
        "rabbitmq": state.consumer.label(),
        "mongodb": connection_label(mongodb),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use chrono::Utc;
    use http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::model::{Movie, NewRating};
    use crate::storage::{MockCatalogStore, MockRatingStore};

    fn movie(id: i64, title: &str) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            year: 2014,
            genres: vec!["Sci-Fi".to_string()],
            directors: Vec::new(),
            plot: "plot".to_string(),
        }
    }

    fn new_rating(key: &str, rating: u8, comment: &str) -> NewRating {
        NewRating {
            movie_key: key.to_string(),
            user_id: "u1".to_string(),
            rating,
            comment: comment.to_string(),
            timestamp: Utc::now(),
        }
    }

    async fn setup() -> (Router, Arc<MockRatingStore>, ConnectionState) {
        let catalog = Arc::new(MockCatalogStore::new());
        let interstellar = catalog.seed(movie(7, "Interstellar")).await;
        let store = Arc::new(MockRatingStore::new(catalog));
        store.insert(new_rating(&interstellar.key, 3, "")).await.unwrap();
        store
            .insert(new_rating(&interstellar.key, 5, "great"))
            .await
            .unwrap();

        let consumer = ConnectionState::new();
        let app = router(RatingsState {
            store: store.clone(),
            consumer: consumer.clone(),
        });
        (app, store, consumer)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_ratings_lists_details() {
        let (app, _, _) = setup().await;

        let (status, json) = get_json(app, "/ratings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 2);

        let first = &json["ratings"][0];
        assert_eq!(first["userId"], "u1");
        assert!(first["_id"].is_string());
        assert!(first["movieId"].is_string());
        assert_eq!(first["movie"]["title"], "Interstellar");
        assert_eq!(first["movie"]["year"], 2014);
    }

    #[tokio::test]
    async fn test_movies_with_ratings_summary() {
        let (app, _, _) = setup().await;

        let (status, json) = get_json(app, "/movies-with-ratings").await;
        assert_eq!(status, StatusCode::OK);

        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "Interstellar");
        assert_eq!(rows[0]["averageRating"], 4.0);
        assert_eq!(rows[0]["ratingCount"], 2);
        assert_eq!(rows[0]["commentsCount"], 1);
    }

    #[tokio::test]
    async fn test_read_failure_is_500() {
        let (app, store, _) = setup().await;
        store.set_fail_on_read(true).await;

        let (status, json) = get_json(app.clone(), "/ratings").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Error fetching ratings");
        assert!(json["details"].is_string());

        let (status, _) = get_json(app, "/movies-with-ratings").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health_reports_both_backends() {
        let (app, store, consumer) = setup().await;

        let (_, json) = get_json(app.clone(), "/health").await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["rabbitmq"], "disconnected");
        assert_eq!(json["mongodb"], "connected");

        consumer.set_connected(true);
        store.set_fail_on_read(true).await;
        let (_, json) = get_json(app, "/health").await;
        assert_eq!(json["rabbitmq"], "connected");
        assert_eq!(json["mongodb"], "disconnected");
    }
}
