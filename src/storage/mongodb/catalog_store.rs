//! MongoDB CatalogStore implementation.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{FindOneAndReplaceOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, warn};

use crate::model::{Movie, StoredMovie};
use crate::storage::helpers::literal_pattern;
use crate::storage::{CatalogStore, Result, StorageConfig, StorageError};

use super::{document_key, key_of};

/// MongoDB implementation of CatalogStore.
pub struct MongoCatalogStore {
    database: Database,
    movies: Collection<Document>,
}

impl MongoCatalogStore {
    /// Create a catalog store and ensure its indexes.
    pub async fn new(client: &Client, config: &StorageConfig) -> Result<Self> {
        let database = client.database(&config.database);
        let movies = database.collection(&config.movies_collection);

        let store = Self { database, movies };
        store.init().await?;

        Ok(store)
    }

    /// Lookup indexes. Not unique: seeded catalogs may already hold
    /// duplicates, so the create path checks for conflicts itself.
    async fn init(&self) -> Result<()> {
        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().name("id_lookup".to_string()).build())
            .build();
        self.movies.create_index(id_index).await?;

        let title_index = IndexModel::builder().keys(doc! { "title": 1, "year": 1 }).build();
        self.movies.create_index(title_index).await?;

        Ok(())
    }

    /// First decodable match in natural order.
    async fn find_one_movie(&self, filter: Document) -> Result<Option<StoredMovie>> {
        let mut cursor = self.movies.find(filter).await?;

        while cursor.advance().await? {
            if let Some(stored) = decode_or_skip(cursor.deserialize_current()?) {
                return Ok(Some(stored));
            }
        }
        Ok(None)
    }

    async fn find_movies(&self, filter: Document, options: FindOptions) -> Result<Vec<Movie>> {
        let mut cursor = self.movies.find(filter).with_options(options).await?;

        let mut movies = Vec::new();
        while cursor.advance().await? {
            if let Some(stored) = decode_or_skip(cursor.deserialize_current()?) {
                movies.push(stored.movie);
            }
        }
        Ok(movies)
    }
}

/// Case-insensitive literal match on title, genres or directors.
///
/// `$regex` against an array field matches when any element matches. The
/// singular legacy fields are included for older documents.
fn matching_filter(needle: &str) -> Document {
    let pattern = doc! { "$regex": literal_pattern(needle), "$options": "i" };
    let clauses: Vec<Bson> = ["title", "genres", "genre", "directors", "director"]
        .into_iter()
        .map(|field| Bson::Document(doc! { field: pattern.clone() }))
        .collect();
    doc! { "$or": clauses }
}

fn to_stored(document: Document) -> Result<StoredMovie> {
    let key = document_key(&document)?;
    let movie = mongodb::bson::from_document(document)?;
    Ok(StoredMovie { key, movie })
}

/// Decode a catalog document, logging and skipping one that lacks an
/// integer `id` or carries a non-numeric `year`.
fn decode_or_skip(document: Document) -> Option<StoredMovie> {
    let raw_id = document.get("_id").cloned();
    match to_stored(document) {
        Ok(stored) => Some(stored),
        Err(e) => {
            warn!(
                document_id = ?raw_id,
                error = %e,
                "Skipping undecodable movie document"
            );
            None
        }
    }
}

#[async_trait]
impl CatalogStore for MongoCatalogStore {
    async fn find_by_external_id(&self, id: i64) -> Result<Option<StoredMovie>> {
        self.find_one_movie(doc! { "id": id }).await
    }

    async fn find_by_title(&self, title: &str, year: Option<i32>) -> Result<Option<StoredMovie>> {
        let mut filter = doc! { "title": title };
        if let Some(year) = year {
            filter.insert("year", year);
        }
        self.find_one_movie(filter).await
    }

    async fn find_matching(&self, needle: &str) -> Result<Option<StoredMovie>> {
        self.find_one_movie(matching_filter(needle)).await
    }

    async fn search(&self, needle: &str) -> Result<Vec<Movie>> {
        let options = FindOptions::builder().sort(doc! { "id": 1 }).build();
        self.find_movies(matching_filter(needle), options).await
    }

    async fn list(&self, offset: u64, limit: i64) -> Result<Vec<Movie>> {
        let options = FindOptions::builder()
            .sort(doc! { "id": 1 })
            .skip(offset)
            .limit(limit)
            .build();
        self.find_movies(doc! {}, options).await
    }

    async fn insert(&self, movie: Movie) -> Result<StoredMovie> {
        if self.find_by_external_id(movie.id).await?.is_some() {
            return Err(StorageError::Conflict(movie.id));
        }

        let document = mongodb::bson::to_document(&movie)?;
        let result = self.movies.insert_one(document).await?;
        let key = result
            .inserted_id
            .as_object_id()
            .map(|oid| key_of(&oid))
            .ok_or_else(|| StorageError::Decode("inserted _id is not an ObjectId".to_string()))?;

        debug!(id = movie.id, key = %key, "Inserted movie");
        Ok(StoredMovie { key, movie })
    }

    async fn replace(&self, movie: Movie) -> Result<Option<StoredMovie>> {
        let document = mongodb::bson::to_document(&movie)?;
        let options = FindOneAndReplaceOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let replaced = self
            .movies
            .find_one_and_replace(doc! { "id": movie.id }, document)
            .with_options(options)
            .await?;

        match replaced {
            Some(document) => {
                debug!(id = movie.id, "Replaced movie");
                Ok(Some(to_stored(document)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> Result<Option<StoredMovie>> {
        match self.movies.find_one_and_delete(doc! { "id": id }).await? {
            Some(document) => {
                debug!(id, "Deleted movie");
                Ok(Some(to_stored(document)?))
            }
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<()> {
        super::ping(&self.database).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_filter_escapes_needle() {
        let filter = matching_filter("Se7en (1995)");
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 5);

        let title = clauses[0].as_document().unwrap();
        let regex = title.get_document("title").unwrap();
        assert_eq!(regex.get_str("$regex").unwrap(), r"Se7en \(1995\)");
        assert_eq!(regex.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn test_to_stored_normalizes_legacy_document() {
        let oid = mongodb::bson::oid::ObjectId::new();
        let document = doc! {
            "_id": oid,
            "id": 3_i32,
            "title": "Alien",
            "year": 1979.0,
            "genre": "Horror",
            "director": "Ridley Scott",
            "plot": "In space no one can hear you scream."
        };

        let stored = to_stored(document).unwrap();
        assert_eq!(stored.key, oid.to_hex());
        assert_eq!(stored.movie.id, 3);
        assert_eq!(stored.movie.year, 1979);
        assert_eq!(stored.movie.genres, vec!["Horror"]);
        assert_eq!(stored.movie.directors, vec!["Ridley Scott"]);
    }

    #[test]
    fn test_decode_or_skip_drops_document_without_id() {
        // Shape of a sample_mflix import: no integer `id`.
        let document = doc! {
            "_id": mongodb::bson::oid::ObjectId::new(),
            "title": "Blacksmith Scene",
            "year": 1893_i32,
            "genres": ["Short"],
            "plot": "Three men hammer on an anvil."
        };
        assert!(decode_or_skip(document).is_none());

        let bad_year = doc! {
            "_id": mongodb::bson::oid::ObjectId::new(),
            "id": 5_i32,
            "title": "The Great Train Robbery",
            "year": "1903è",
            "plot": "Bandits rob a train."
        };
        assert!(decode_or_skip(bad_year).is_none());
    }

    #[test]
    fn test_decode_or_skip_keeps_valid_document() {
        let document = doc! {
            "_id": mongodb::bson::oid::ObjectId::new(),
            "id": 7_i32,
            "title": "Interstellar",
            "year": 2014_i32,
            "plot": "Space."
        };
        let stored = decode_or_skip(document).unwrap();
        assert_eq!(stored.movie.id, 7);
    }
}
