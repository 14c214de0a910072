// src/profile.rs
//! Keeps the publishing identity's profile metadata (kind 0) in line with
//! the `[profile]` configuration section.

use serde::{Deserialize, Serialize};

use crate::config::ProfileConfig;
use crate::message::{OutboundMessage, KIND_METADATA};
use crate::publish::{PublishReport, Transport};

/// Kind-0 content as published.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub about: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub nip05: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lud16: String,
    #[serde(default)]
    pub bot: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bot_description: String,
}

impl From<&ProfileConfig> for ProfileMetadata {
    fn from(p: &ProfileConfig) -> Self {
        Self {
            name: p.name.clone(),
            about: p.about.clone(),
            website: p.website.clone(),
            picture: p.picture.clone(),
            nip05: p.nip05.clone(),
            lud16: p.lud16.clone(),
            bot: true,
            bot_description: p.bot_description.clone(),
        }
    }
}

impl ProfileMetadata {
    /// Only the fields people see on a profile card are compared.
    pub fn matches(&self, other: &ProfileMetadata) -> bool {
        self.name == other.name
            && self.nip05 == other.nip05
            && self.website == other.website
            && self.picture == other.picture
    }

    pub fn to_message(&self) -> serde_json::Result<OutboundMessage> {
        let mut msg = OutboundMessage::new(KIND_METADATA, serde_json::to_string(self)?);
        if !self.nip05.is_empty() {
            msg.push_tag(&["nip05", self.nip05.as_str()]);
        }
        Ok(msg)
    }
}

/// First kind-0 message found on any endpoint, in endpoint order.
async fn find_existing(transport: &dyn Transport) -> Option<ProfileMetadata> {
    for endpoint in transport.endpoints() {
        match transport.query_by_author(&endpoint, &[KIND_METADATA], 1).await {
            Ok(messages) => {
                if let Some(msg) = messages.first() {
                    tracing::info!(%endpoint, "existing profile found");
                    return match serde_json::from_str(&msg.content) {
                        Ok(meta) => Some(meta),
                        Err(e) => {
                            tracing::warn!(%endpoint, error = %e, "unreadable profile content");
                            None
                        }
                    };
                }
            }
            Err(e) => tracing::warn!(%endpoint, error = ?e, "profile query failed"),
        }
    }
    None
}

/// Publish the configured profile unless an identical one is already out.
/// Returns the publish report when a new profile was sent.
pub async fn ensure_profile(
    transport: &dyn Transport,
    config: &ProfileConfig,
) -> Option<PublishReport> {
    let wanted = ProfileMetadata::from(config);

    match find_existing(transport).await {
        Some(existing) if existing.matches(&wanted) => {
            tracing::info!(name = %existing.name, "profile up to date");
            return None;
        }
        Some(existing) => tracing::info!(
            name = %existing.name,
            nip05 = %existing.nip05,
            website = %existing.website,
            "profile out of date"
        ),
        None => tracing::info!("no profile found"),
    }

    let msg = match wanted.to_message() {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "could not encode profile");
            return None;
        }
    };
    let report = transport.publish(&msg).await;
    for (endpoint, reason) in &report.rejected {
        tracing::warn!(%endpoint, %reason, "profile rejected");
    }
    if report.any_accepted() {
        tracing::info!(
            accepted = report.accepted.len(),
            total = transport.endpoints().len(),
            nip05 = %wanted.nip05,
            "profile published"
        );
    } else {
        tracing::error!("profile not accepted by any endpoint");
    }
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ProfileConfig {
        ProfileConfig {
            name: "nostrhitchbot".into(),
            about: "Posts Hitchwiki and Hitchmap updates".into(),
            website: "https://hitchwiki.org/en/Hitchwiki:Nostrhitch".into(),
            picture: String::new(),
            nip05: "nostrhitch@hitchwiki.org".into(),
            lud16: String::new(),
            bot_description: String::new(),
        }
    }

    #[test]
    fn metadata_message_shape() {
        let msg = ProfileMetadata::from(&cfg()).to_message().unwrap();
        assert_eq!(msg.kind, KIND_METADATA);
        assert!(msg.has_tag("nip05", "nostrhitch@hitchwiki.org"));
        let v: serde_json::Value = serde_json::from_str(&msg.content).unwrap();
        assert_eq!(v["name"], "nostrhitchbot");
        assert_eq!(v["bot"], true);
        assert!(v.get("lud16").is_none());
    }

    #[test]
    fn about_changes_do_not_force_update() {
        let a = ProfileMetadata::from(&cfg());
        let mut b = a.clone();
        b.about = "something else".into();
        assert!(a.matches(&b));
        b.nip05 = "other@example.org".into();
        assert!(!a.matches(&b));
    }
}
