//! Movie catalog API.
//!
//! Routes under `/api/movies`:
//! - `GET /api/movies?limit=&offset=`: one page ordered by id
//! - `GET /api/movies/search?q=`: case-insensitive literal match
//! - `GET|PUT|DELETE /api/movies/:id`: by external id
//! - `POST /api/movies`: create
//!
//! Plus `GET /health` with a live database ping.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::{info, warn};

use super::{connection_label, with_common_layers, ApiError};
use crate::config::ServiceKind;
use crate::model::{Movie, MovieDraft};
use crate::storage::{CatalogStore, StorageError};

/// Page size when `limit` is absent or unparsable.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 500;

type AppState = Arc<dyn CatalogStore>;
type Params = HashMap<String, String>;

/// Build the catalog router.
pub fn router(store: Arc<dyn CatalogStore>) -> Router {
    let routes = Router::new()
        .route("/api/movies", get(list_movies).post(create_movie))
        .route("/api/movies/search", get(search_movies))
        .route(
            "/api/movies/:id",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .route("/health", get(health))
        .with_state(store);
    with_common_layers(routes)
}

/// `(offset, limit)` from raw query parameters. Values that do not parse
/// fall back to the defaults.
fn page_params(params: &Params) -> (u64, i64) {
    let limit = params
        .get("limit")
        .and_then(|l| l.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = params
        .get("offset")
        .and_then(|o| o.trim().parse::<u64>().ok())
        .unwrap_or(0);
    (offset, limit)
}

fn movie_not_found() -> ApiError {
    ApiError::not_found("Movie not found")
}

/// External id from the path; anything that is not an integer cannot
/// name a movie.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim().parse().map_err(|_| movie_not_found())
}

async fn list_movies(
    State(store): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let (offset, limit) = page_params(&params);
    let movies = store
        .list(offset, limit)
        .await
        .map_err(|e| ApiError::internal("Error fetching movies", e))?;
    Ok(Json(movies))
}

async fn search_movies(
    State(store): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let needle = params
        .get("q")
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing query parameter q"))?;

    let movies = store
        .search(needle)
        .await
        .map_err(|e| ApiError::internal("Error searching movies", e))?;
    Ok(Json(movies))
}

async fn get_movie(
    State(store): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    let id = parse_id(&raw_id)?;
    let stored = store
        .find_by_external_id(id)
        .await
        .map_err(|e| ApiError::internal("Error fetching movie", e))?
        .ok_or_else(movie_not_found)?;
    Ok(Json(stored.movie))
}

async fn create_movie(
    State(store): State<AppState>,
    body: Result<Json<MovieDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Movie>), ApiError> {
    let Json(draft) = body?;
    let movie = draft
        .into_movie()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    match store.insert(movie).await {
        Ok(stored) => {
            info!(id = stored.movie.id, title = %stored.movie.title, "Movie created");
            Ok((StatusCode::CREATED, Json(stored.movie)))
        }
        Err(e @ StorageError::Conflict(_)) => Err(ApiError::conflict(e.to_string())),
        Err(e) => Err(ApiError::internal("Error creating movie", e)),
    }
}

async fn update_movie(
    State(store): State<AppState>,
    Path(raw_id): Path<String>,
    body: Result<Json<MovieDraft>, JsonRejection>,
) -> Result<Json<Movie>, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(draft) = body?;

    let mut movie = store
        .find_by_external_id(id)
        .await
        .map_err(|e| ApiError::internal("Error updating movie", e))?
        .ok_or_else(movie_not_found)?
        .movie;
    draft.apply_to(&mut movie);

    let stored = store
        .replace(movie)
        .await
        .map_err(|e| ApiError::internal("Error updating movie", e))?
        .ok_or_else(movie_not_found)?;

    info!(id, "Movie updated");
    Ok(Json(stored.movie))
}

async fn delete_movie(
    State(store): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&raw_id)?;
    let deleted = store
        .delete(id)
        .await
        .map_err(|e| ApiError::internal("Error deleting movie", e))?
        .ok_or_else(movie_not_found)?;

    info!(id, "Movie deleted");
    Ok(Json(json!({
        "message": "Deleted",
        "title": deleted.movie.title,
    })))
}

async fn health(State(store): State<AppState>) -> Json<serde_json::Value> {
    let connected = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database ping failed");
            false
        }
    };

    Json(json!({
        "status": "ok",
        "service": ServiceKind::Catalog.name(),
        "database": connection_label(connected),
    }))
}
