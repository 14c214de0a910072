// src/config/mod.rs
pub mod daemon;

pub use daemon::{Config, ProfileConfig};
