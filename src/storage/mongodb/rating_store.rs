//! MongoDB RatingStore implementation.
//!
//! Ratings reference movies by ObjectId in `movieId`. Both views are
//! aggregation pipelines joining `ratings` with the movies collection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::Deserialize;
use tracing::debug;

use crate::model::{
    lenient_i32, lenient_i64, lenient_opt_string, string_or_seq, MovieBrief, MovieRatingSummary,
    NewRating, Rating, RatingDetail,
};
use crate::storage::helpers::sort_summaries;
use crate::storage::{RatingStore, Result, StorageConfig, StorageError};

use super::{genres_expr, key_of, parse_key};

/// MongoDB implementation of RatingStore.
pub struct MongoRatingStore {
    database: Database,
    ratings: Collection<Document>,
    movies_collection: String,
}

impl MongoRatingStore {
    /// Create a rating store and ensure its indexes.
    pub async fn new(client: &Client, config: &StorageConfig) -> Result<Self> {
        let database = client.database(&config.database);
        let ratings = database.collection(&config.ratings_collection);

        let store = Self {
            database,
            ratings,
            movies_collection: config.movies_collection.clone(),
        };
        store.init().await?;

        Ok(store)
    }

    /// Index for the per-movie grouping and join.
    async fn init(&self) -> Result<()> {
        let movie_index = IndexModel::builder().keys(doc! { "movieId": 1 }).build();
        self.ratings.create_index(movie_index).await?;
        Ok(())
    }

    fn lookup_movie(&self, local_field: &str) -> Vec<Document> {
        vec![
            doc! {
                "$lookup": {
                    "from": self.movies_collection.as_str(),
                    "localField": local_field,
                    "foreignField": "_id",
                    "as": "movie"
                }
            },
            doc! { "$unwind": "$movie" },
        ]
    }

    fn details_pipeline(&self) -> Vec<Document> {
        let mut pipeline = self.lookup_movie("movieId");
        pipeline.push(doc! {
            "$project": {
                "_id": 1,
                "movieId": 1,
                "userId": 1,
                "rating": 1,
                "comment": 1,
                "timestamp": 1,
                "movie": {
                    "title": "$movie.title",
                    "genres": genres_expr(),
                    "year": "$movie.year"
                }
            }
        });
        pipeline
    }

    fn summaries_pipeline(&self) -> Vec<Document> {
        let mut pipeline = vec![doc! {
            "$group": {
                "_id": "$movieId",
                "averageRating": { "$avg": "$rating" },
                "ratingCount": { "$sum": 1 },
                "commentsCount": {
                    "$sum": {
                        "$cond": [
                            { "$gt": [{ "$strLenCP": { "$ifNull": ["$comment", ""] } }, 0] },
                            1,
                            0
                        ]
                    }
                }
            }
        }];
        pipeline.extend(self.lookup_movie("_id"));
        pipeline.push(doc! {
            "$project": {
                "_id": 1,
                "title": "$movie.title",
                "genres": genres_expr(),
                "year": "$movie.year",
                "averageRating": { "$round": ["$averageRating", 2] },
                "ratingCount": 1,
                "commentsCount": 1
            }
        });
        pipeline.push(doc! { "$sort": { "title": 1, "_id": 1 } });
        pipeline
    }

    /// Run `pipeline` over the ratings collection, converting each row.
    async fn collect_rows<T, R>(
        &self,
        pipeline: Vec<Document>,
        convert: fn(T) -> Result<R>,
    ) -> Result<Vec<R>>
    where
        T: serde::de::DeserializeOwned + Send,
        R: Send,
    {
        let mut cursor = self.ratings.aggregate(pipeline).await?;

        let mut rows = Vec::new();
        while cursor.advance().await? {
            let document = cursor.deserialize_current()?;
            let row: T = mongodb::bson::from_document(document)?;
            rows.push(convert(row)?);
        }
        Ok(rows)
    }
}

/// A `ratings` document joined with its movie.
#[derive(Deserialize)]
struct DetailRow {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(rename = "movieId")]
    movie_id: ObjectId,
    #[serde(rename = "userId", default, deserialize_with = "lenient_opt_string")]
    user_id: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    rating: i64,
    #[serde(default)]
    comment: Option<String>,
    timestamp: mongodb::bson::DateTime,
    movie: MovieBrief,
}

/// One `$group` result joined with its movie.
#[derive(Deserialize)]
struct SummaryRow {
    #[serde(rename = "_id")]
    movie_id: ObjectId,
    title: String,
    #[serde(default, deserialize_with = "string_or_seq")]
    genres: Vec<String>,
    #[serde(deserialize_with = "lenient_i32")]
    year: i32,
    #[serde(rename = "averageRating")]
    average_rating: f64,
    #[serde(rename = "ratingCount", deserialize_with = "lenient_i64")]
    rating_count: i64,
    #[serde(rename = "commentsCount", deserialize_with = "lenient_i64")]
    comments_count: i64,
}

fn stored_rating(value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| StorageError::Decode(format!("rating {} out of range", value)))
}

fn to_detail(row: DetailRow) -> Result<RatingDetail> {
    let timestamp = DateTime::<Utc>::from_timestamp_millis(row.timestamp.timestamp_millis())
        .ok_or_else(|| StorageError::Decode("timestamp out of range".to_string()))?;

    Ok(RatingDetail {
        rating: Rating {
            id: key_of(&row.id),
            movie_key: key_of(&row.movie_id),
            user_id: row.user_id.unwrap_or_default(),
            rating: stored_rating(row.rating)?,
            comment: row.comment.unwrap_or_default(),
            timestamp,
        },
        movie: row.movie,
    })
}

fn to_summary(row: SummaryRow) -> Result<MovieRatingSummary> {
    Ok(MovieRatingSummary {
        movie_key: key_of(&row.movie_id),
        title: row.title,
        genres: row.genres,
        year: row.year,
        average_rating: row.average_rating,
        rating_count: row.rating_count.max(0) as u64,
        comments_count: row.comments_count.max(0) as u64,
    })
}

#[async_trait]
impl RatingStore for MongoRatingStore {
    async fn insert(&self, rating: NewRating) -> Result<Rating> {
        let movie_oid = parse_key(&rating.movie_key)?;
        let document = doc! {
            "movieId": movie_oid,
            "userId": rating.user_id.as_str(),
            "rating": i32::from(rating.rating),
            "comment": rating.comment.as_str(),
            "timestamp": mongodb::bson::DateTime::from_millis(rating.timestamp.timestamp_millis()),
        };

        let result = self.ratings.insert_one(document).await?;
        let id = result
            .inserted_id
            .as_object_id()
            .map(|oid| key_of(&oid))
            .ok_or_else(|| StorageError::Decode("inserted _id is not an ObjectId".to_string()))?;

        debug!(id = %id, movie_key = %rating.movie_key, "Inserted rating");
        Ok(Rating::from_new(id, rating))
    }

    async fn rating_details(&self) -> Result<Vec<RatingDetail>> {
        self.collect_rows(self.details_pipeline(), to_detail).await
    }

    async fn movie_summaries(&self) -> Result<Vec<MovieRatingSummary>> {
        let mut summaries = self.collect_rows(self.summaries_pipeline(), to_summary).await?;
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn ping(&self) -> Result<()> {
        super::ping(&self.database).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_detail_defaults_comment() {
        let row: DetailRow = mongodb::bson::from_document(doc! {
            "_id": ObjectId::new(),
            "movieId": ObjectId::new(),
            "userId": 42_i32,
            "rating": 4_i32,
            "timestamp": mongodb::bson::DateTime::from_millis(1_700_000_000_000),
            "movie": { "title": "Heat", "genres": "Crime", "year": 1995_i32 }
        })
        .unwrap();

        let detail = to_detail(row).unwrap();
        assert_eq!(detail.rating.user_id, "42");
        assert_eq!(detail.rating.rating, 4);
        assert_eq!(detail.rating.comment, "");
        assert_eq!(detail.rating.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(detail.movie.genres, vec!["Crime"]);
    }

    #[test]
    fn test_to_detail_rejects_out_of_range_rating() {
        let row: DetailRow = mongodb::bson::from_document(doc! {
            "_id": ObjectId::new(),
            "movieId": ObjectId::new(),
            "userId": "u1",
            "rating": 300_i32,
            "timestamp": mongodb::bson::DateTime::now(),
            "movie": { "title": "Heat", "year": 1995_i32 }
        })
        .unwrap();

        assert!(matches!(to_detail(row), Err(StorageError::Decode(_))));
    }

    #[test]
    fn test_to_summary() {
        let movie_id = ObjectId::new();
        let row: SummaryRow = mongodb::bson::from_document(doc! {
            "_id": movie_id,
            "title": "Interstellar",
            "genres": ["Sci-Fi"],
            "year": 2014_i32,
            "averageRating": 4.0,
            "ratingCount": 2_i32,
            "commentsCount": 1_i32
        })
        .unwrap();

        let summary = to_summary(row).unwrap();
        assert_eq!(summary.movie_key, movie_id.to_hex());
        assert_eq!(summary.average_rating, 4.0);
        assert_eq!(summary.rating_count, 2);
        assert_eq!(summary.comments_count, 1);
    }
}
