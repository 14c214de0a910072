// src/message/mod.rs
pub mod builder;
pub mod geo;

pub use builder::MessageBuilder;

use serde::{Deserialize, Serialize};

pub const KIND_METADATA: u16 = 0;
pub const KIND_TEXT_NOTE: u16 = 1;
/// Older hitchmap notes were published under this replaceable kind.
pub const KIND_HITCH_NOTE: u16 = 30399;

/// Canonical publishable unit: content plus ordered flat tags.
/// The same shape is used for messages read back from the relays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub kind: u16,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
}

impl OutboundMessage {
    pub fn new(kind: u16, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            tags: Vec::new(),
        }
    }

    pub fn push_tag<S: AsRef<str>>(&mut self, fields: &[S]) {
        self.tags
            .push(fields.iter().map(|s| s.as_ref().to_string()).collect());
    }

    /// First value of every tag called `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
            .filter_map(|t| t.get(1).map(String::as_str))
    }

    pub fn has_tag(&self, name: &str, value: &str) -> bool {
        self.tag_values(name).any(|v| v == value)
    }
}
