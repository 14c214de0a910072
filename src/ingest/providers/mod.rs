// src/ingest/providers/mod.rs
pub mod hitchmap;
pub mod wiki_feed;
