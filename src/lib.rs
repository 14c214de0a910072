// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod ingest;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod profile;
pub mod publish;

pub use crate::config::Config;
pub use crate::dedup::{DedupKey, DedupStore};
pub use crate::message::{MessageBuilder, OutboundMessage};
