//! Random movie selection over the catalog API.
//!
//! Picks a random window of the catalog, fetches twice the requested count
//! from it and returns a shuffled subset.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::clients::{ClientError, MovieSource};
use crate::model::Movie;

/// Movies returned when no count is requested.
pub const DEFAULT_COUNT: u64 = 5;
/// Upper bound on a single request.
pub const MAX_COUNT: u64 = 50;

/// Requested count clamped to `1..=MAX_COUNT`; absent or non-positive
/// values fall back to [`DEFAULT_COUNT`].
pub fn clamp_count(requested: Option<i64>) -> u64 {
    match requested {
        Some(n) if n > 0 => (n as u64).min(MAX_COUNT),
        _ => DEFAULT_COUNT,
    }
}

/// Offset in `0..=size_hint - count`, or zero when the catalog is smaller.
pub fn random_offset<R: Rng + ?Sized>(size_hint: u64, count: u64, rng: &mut R) -> u64 {
    let max = size_hint.saturating_sub(count);
    if max == 0 {
        0
    } else {
        rng.random_range(0..=max)
    }
}

/// Shuffle `movies` and keep at most `count` of them.
pub fn pick_subset<R: Rng + ?Sized>(mut movies: Vec<Movie>, count: u64, rng: &mut R) -> Vec<Movie> {
    movies.shuffle(rng);
    movies.truncate(count as usize);
    movies
}

/// Picks random movies from a [`MovieSource`].
pub struct RandomPicker {
    source: Arc<dyn MovieSource>,
    size_hint: u64,
}

impl RandomPicker {
    pub fn new(source: Arc<dyn MovieSource>, size_hint: u64) -> Self {
        Self { source, size_hint }
    }

    /// Up to `count` random movies.
    pub async fn pick(&self, count: u64) -> Result<Vec<Movie>, ClientError> {
        let offset = random_offset(self.size_hint, count, &mut rand::rng());
        let limit = count * 2;

        let movies = self.source.fetch_page(offset, limit).await?;
        let picked = pick_subset(movies, count, &mut rand::rng());

        info!(count, offset, limit, returned = picked.len(), "Picked random movies");
        Ok(picked)
    }
}
