//! Data contracts shared by every service.
//!
//! - [`Movie`]: catalog record, canonical array form for genres/directors
//! - [`RatingMessage`]: raw queue/HTTP payload, every field optional
//! - [`RatingRequest`]: validated payload, what actually goes on the queue
//! - [`Rating`]: persisted rating referencing a movie's storage key
//! - [`RatingDetail`] / [`MovieRatingSummary`]: aggregation views

mod lenient;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use lenient::{
    lenient_i32, lenient_i64, lenient_opt_i32, lenient_opt_i64, lenient_opt_string,
    lenient_opt_timestamp, string_or_seq,
};

/// Lowest accepted rating.
pub const MIN_RATING: i64 = 1;
/// Highest accepted rating.
pub const MAX_RATING: i64 = 5;

// ============================================================================
// Movie
// ============================================================================

/// A catalog movie.
///
/// Older catalog documents carry a singular `genre`/`director` string; both
/// are read into the array fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    pub title: String,
    #[serde(deserialize_with = "lenient_i32")]
    pub year: i32,
    #[serde(default, alias = "genre", deserialize_with = "string_or_seq")]
    pub genres: Vec<String>,
    #[serde(default, alias = "director", deserialize_with = "string_or_seq")]
    pub directors: Vec<String>,
    #[serde(default)]
    pub plot: String,
}

/// Body of a catalog create request; every field optional until checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieDraft {
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i32")]
    pub year: Option<i32>,
    #[serde(default, alias = "genre", deserialize_with = "string_or_seq")]
    pub genres: Vec<String>,
    #[serde(default, alias = "director", deserialize_with = "string_or_seq")]
    pub directors: Vec<String>,
    #[serde(default)]
    pub plot: Option<String>,
}

impl MovieDraft {
    /// `id`, `title`, `plot` and `year` must be present; text must be
    /// non-blank and the id non-zero.
    pub fn into_movie(self) -> Result<Movie, ValidationError> {
        let non_blank = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        match (
            self.id.filter(|id| *id != 0),
            non_blank(self.title),
            non_blank(self.plot),
            self.year.filter(|y| *y != 0),
        ) {
            (Some(id), Some(title), Some(plot), Some(year)) => Ok(Movie {
                id,
                title,
                year,
                genres: self.genres,
                directors: self.directors,
                plot,
            }),
            _ => Err(ValidationError::MissingMovieFields),
        }
    }

    /// Overwrite the fields this draft carries. The external id is never
    /// changed; blank text, a zero year and empty lists count as absent.
    pub fn apply_to(self, movie: &mut Movie) {
        if let Some(title) = self.title.filter(|t| !t.trim().is_empty()) {
            movie.title = title;
        }
        if let Some(year) = self.year.filter(|y| *y != 0) {
            movie.year = year;
        }
        if !self.genres.is_empty() {
            movie.genres = self.genres;
        }
        if !self.directors.is_empty() {
            movie.directors = self.directors;
        }
        if let Some(plot) = self.plot.filter(|p| !p.trim().is_empty()) {
            movie.plot = plot;
        }
    }
}

/// A movie together with the key the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMovie {
    /// Internal storage key (hex ObjectId for MongoDB).
    pub key: String,
    pub movie: Movie,
}

// ============================================================================
// Rating payloads
// ============================================================================

/// External movie reference as carried on the wire.
///
/// Clients send either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MovieRef {
    Number(i64),
    Text(String),
}

impl MovieRef {
    /// The integer identifier, when the reference is one.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            MovieRef::Number(n) => Some(*n),
            MovieRef::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Zero and blank text count as "not provided".
    pub fn is_present(&self) -> bool {
        match self {
            MovieRef::Number(n) => *n != 0,
            MovieRef::Text(s) => !s.trim().is_empty(),
        }
    }
}

impl fmt::Display for MovieRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovieRef::Number(n) => write!(f, "{}", n),
            MovieRef::Text(s) => f.write_str(s),
        }
    }
}

/// Raw rating payload. Used for both the HTTP body and the queue message;
/// [`RatingMessage::validate`] turns it into a [`RatingRequest`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingMessage {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub movie_id: Option<MovieRef>,
    #[serde(default)]
    pub movie_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i32")]
    pub year: Option<i32>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Reasons a rating payload is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required parameters: userId, movieId, rating")]
    MissingFields,

    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i64),

    #[error("Missing required fields: id, title, plot, year")]
    MissingMovieFields,
}

impl RatingMessage {
    /// Check required fields and the rating range.
    ///
    /// An absent or unparsable `timestamp` is left as `None` so the caller
    /// decides what "now" means.
    pub fn validate(self) -> Result<RatingRequest, ValidationError> {
        let user_id = self.user_id.filter(|u| !u.is_empty());
        let movie_id = self.movie_id.filter(MovieRef::is_present);

        let (Some(user_id), Some(movie_id), Some(rating)) = (user_id, movie_id, self.rating)
        else {
            return Err(ValidationError::MissingFields);
        };

        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating));
        }

        Ok(RatingRequest {
            user_id,
            movie_id,
            movie_name: self.movie_name,
            year: self.year,
            rating: rating as u8,
            comment: self.comment.unwrap_or_default(),
            timestamp: self.timestamp,
        })
    }
}

/// A validated rating request, the queue wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub user_id: String,
    pub movie_id: MovieRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub rating: u8,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RatingRequest {
    /// Trimmed movie name, `None` when absent or blank.
    pub fn lookup_name(&self) -> Option<&str> {
        self.movie_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Build the rating to persist against a resolved movie.
    pub fn into_new_rating(self, movie_key: String, now: DateTime<Utc>) -> NewRating {
        NewRating {
            movie_key,
            user_id: self.user_id,
            rating: self.rating,
            comment: self.comment,
            timestamp: self.timestamp.unwrap_or(now),
        }
    }
}

// ============================================================================
// Stored ratings
// ============================================================================

/// A rating ready to insert; the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub movie_key: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "movieId")]
    pub movie_key: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

impl Rating {
    pub fn from_new(id: String, new: NewRating) -> Self {
        Self {
            id,
            movie_key: new.movie_key,
            user_id: new.user_id,
            rating: new.rating,
            comment: new.comment,
            timestamp: new.timestamp,
        }
    }
}

// ============================================================================
// Aggregation views
// ============================================================================

/// Movie fields shown next to a rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieBrief {
    pub title: String,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub genres: Vec<String>,
    #[serde(deserialize_with = "lenient_i32")]
    pub year: i32,
}

impl From<&Movie> for MovieBrief {
    fn from(movie: &Movie) -> Self {
        Self {
            title: movie.title.clone(),
            genres: movie.genres.clone(),
            year: movie.year,
        }
    }
}

/// One rating joined with its movie.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingDetail {
    #[serde(flatten)]
    pub rating: Rating,
    pub movie: MovieBrief,
}

/// Per-movie rating statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRatingSummary {
    #[serde(rename = "movieId")]
    pub movie_key: String,
    pub title: String,
    pub genres: Vec<String>,
    pub year: i32,
    pub average_rating: f64,
    pub rating_count: u64,
    pub comments_count: u64,
}

/// Round to two decimal places, ties to even, matching MongoDB `$round`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests;
