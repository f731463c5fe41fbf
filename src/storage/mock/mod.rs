//! Mock storage implementations for testing.
//!
//! Keys are 24-character hex strings, like the ObjectIds MongoDB assigns.

mod catalog_store;
mod rating_store;

pub use catalog_store::MockCatalogStore;
pub use rating_store::MockRatingStore;

use std::sync::atomic::{AtomicU64, Ordering};

/// Next key from `counter`, rendered as 24 hex digits.
fn next_key(counter: &AtomicU64) -> String {
    format!("{:024x}", counter.fetch_add(1, Ordering::SeqCst) + 1)
}
