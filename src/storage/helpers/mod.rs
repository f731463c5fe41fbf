//! Shared storage helper functions.
//!
//! Literal pattern matching and the in-memory forms of the aggregation
//! views. The mock backend uses all of them; the MongoDB backend uses the
//! pattern escaping and the summary ordering.

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::model::{round2, Movie, MovieBrief, MovieRatingSummary, Rating, RatingDetail, StoredMovie};

use super::{Result, StorageError};

/// Regex source matching `needle` literally.
pub fn literal_pattern(needle: &str) -> String {
    regex::escape(needle)
}

/// Case-insensitive matcher for `needle` taken literally.
pub fn literal_matcher(needle: &str) -> Result<Regex> {
    RegexBuilder::new(&literal_pattern(needle))
        .case_insensitive(true)
        .build()
        .map_err(|e| StorageError::Query(e.to_string()))
}

/// Whether the title, a genre or a director matches.
pub fn movie_matches(movie: &Movie, matcher: &Regex) -> bool {
    matcher.is_match(&movie.title)
        || movie.genres.iter().any(|g| matcher.is_match(g))
        || movie.directors.iter().any(|d| matcher.is_match(d))
}

/// Inner join of ratings with their movies, in rating order.
pub fn join_details(ratings: &[Rating], movies: &[StoredMovie]) -> Vec<RatingDetail> {
    let by_key: HashMap<&str, &Movie> = movies
        .iter()
        .map(|m| (m.key.as_str(), &m.movie))
        .collect();

    ratings
        .iter()
        .filter_map(|rating| {
            by_key.get(rating.movie_key.as_str()).map(|movie| RatingDetail {
                rating: rating.clone(),
                movie: MovieBrief::from(*movie),
            })
        })
        .collect()
}

#[derive(Default)]
struct Tally {
    sum: u64,
    count: u64,
    comments: u64,
}

/// Group ratings per movie and join with the movie fields.
///
/// Movies without ratings and ratings without a movie are both absent.
pub fn summarize(ratings: &[Rating], movies: &[StoredMovie]) -> Vec<MovieRatingSummary> {
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for rating in ratings {
        let tally = tallies.entry(rating.movie_key.as_str()).or_default();
        tally.sum += u64::from(rating.rating);
        tally.count += 1;
        if !rating.comment.is_empty() {
            tally.comments += 1;
        }
    }

    let mut summaries: Vec<MovieRatingSummary> = movies
        .iter()
        .filter_map(|stored| {
            let tally = tallies.get(stored.key.as_str())?;
            Some(MovieRatingSummary {
                movie_key: stored.key.clone(),
                title: stored.movie.title.clone(),
                genres: stored.movie.genres.clone(),
                year: stored.movie.year,
                average_rating: round2(tally.sum as f64 / tally.count as f64),
                rating_count: tally.count,
                comments_count: tally.comments,
            })
        })
        .collect();

    sort_summaries(&mut summaries);
    summaries
}

/// Order summaries by title, then movie key.
pub fn sort_summaries(summaries: &mut [MovieRatingSummary]) {
    summaries.sort_by(|a, b| match a.title.cmp(&b.title) {
        Ordering::Equal => a.movie_key.cmp(&b.movie_key),
        other => other,
    });
}
