//! Server and networking configuration types.

use std::fmt;

use serde::Deserialize;

/// The HTTP services this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Movie catalog API.
    Catalog,
    /// Random-movie picker.
    Random,
    /// Rating submission endpoint.
    Submit,
    /// Rating consumer and aggregation queries.
    Ratings,
}

impl ServiceKind {
    /// Name reported by health endpoints and logs.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Catalog => "movies",
            ServiceKind::Random => "random-movies",
            ServiceKind::Submit => "calificacion",
            ServiceKind::Ratings => "opinions",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    pub catalog_port: u16,
    pub random_port: u16,
    pub submit_port: u16,
    pub ratings_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            catalog_port: 3002,
            random_port: 3001,
            submit_port: 3003,
            ratings_port: 3004,
        }
    }
}

impl ServerConfig {
    /// Configured port of `kind`.
    pub fn port_for(&self, kind: ServiceKind) -> u16 {
        match kind {
            ServiceKind::Catalog => self.catalog_port,
            ServiceKind::Random => self.random_port,
            ServiceKind::Submit => self.submit_port,
            ServiceKind::Ratings => self.ratings_port,
        }
    }
}
