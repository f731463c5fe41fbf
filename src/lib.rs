//! reelrate - movie catalog and rating pipeline
//!
//! Ratings are accepted over HTTP, queued on a durable RabbitMQ queue,
//! resolved against the movie catalog by a consumer and stored in MongoDB,
//! where aggregation queries read them back.

pub mod bus;
pub mod clients;
pub mod config;
pub mod dlq;
pub mod handlers;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;
