//! Service logic behind the HTTP handlers and the queue consumer.

pub mod consumer;
pub mod random_picker;
pub mod resolver;
pub mod submission;

pub use consumer::{Attempted, Outcome, RatingConsumer};
pub use random_picker::RandomPicker;
pub use resolver::{MovieResolver, Resolution, ResolutionTier};
pub use submission::{SubmissionError, SubmissionService};
