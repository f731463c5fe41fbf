//! reelrate-random: Random movie picker
//!
//! Fetches a random window of the catalog over HTTP and returns a shuffled
//! subset of it. Holds no connections of its own.
//!
//! ## Configuration
//! - REELRATE__CATALOG__URL / MOVIES_SERVICE_URL: catalog service base URL
//! - REELRATE__CATALOG__SIZE_HINT: approximate catalog size (default: 21349)
//! - PORT: listen port (default: 3001)

use std::sync::Arc;

use tracing::info;

use reelrate::clients::HttpCatalogClient;
use reelrate::config::{Config, ServiceKind};
use reelrate::handlers::{self, random};
use reelrate::services::RandomPicker;
use reelrate::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let kind = ServiceKind::Random;
    info!(
        service = %kind,
        catalog_url = %config.catalog.url,
        size_hint = config.catalog.size_hint,
        "Starting reelrate-random"
    );

    let client = HttpCatalogClient::new(&config.catalog)?;
    let picker = Arc::new(RandomPicker::new(
        Arc::new(client),
        config.catalog.size_hint,
    ));

    handlers::serve(
        random::router(picker),
        &config.bind_address(kind),
        shutdown_signal(),
    )
    .await?;

    info!("reelrate-random stopped");
    Ok(())
}
