//! External service clients.
//!
//! - [`MovieSource`]: paged access to the catalog
//! - [`HttpCatalogClient`]: the catalog service's HTTP API via `reqwest`
//! - [`MockMovieSource`]: in-memory source for testing

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::CatalogClientConfig;
use crate::model::Movie;

pub mod mock;

pub use mock::MockMovieSource;

/// Errors from catalog calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// A paged source of catalog movies.
#[async_trait]
pub trait MovieSource: Send + Sync {
    /// Up to `limit` movies starting at `offset`, in catalog order.
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<Movie>, ClientError>;
}

/// HTTP client for the catalog service.
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// Create a client with the configured request timeout.
    pub fn new(config: &CatalogClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn movies_url(&self) -> String {
        format!("{}/api/movies", self.base_url)
    }
}

#[async_trait]
impl MovieSource for HttpCatalogClient {
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<Movie>, ClientError> {
        let response = self
            .client
            .get(self.movies_url())
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Catalog request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let movies: Vec<Movie> = response.json().await?;
        debug!(offset, limit, returned = movies.len(), "Fetched catalog page");
        Ok(movies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movies_url_strips_trailing_slash() {
        let config = CatalogClientConfig {
            url: "http://movies:3002/".to_string(),
            ..Default::default()
        };
        let client = HttpCatalogClient::new(&config).unwrap();
        assert_eq!(client.movies_url(), "http://movies:3002/api/movies");
    }

    #[test]
    fn test_status_error_display() {
        let err = ClientError::Status {
            status: 503,
            body: "down".to_string(),
        };
        assert_eq!(err.to_string(), "Catalog returned 503: down");
    }
}
