//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use unihub_shared::constants::{DEFAULT_BIO, DEFAULT_NICKNAME};
use unihub_shared::{ChannelMode, ChannelUid, RoomCode, UserId};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The local user's profile. One per installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Globally stable identifier; never rewritten after creation.
    pub uid: UserId,
    pub nickname: String,
    pub bio: String,
    /// Encoded image bytes (JPEG/PNG), if the user picked one.
    pub avatar: Option<Vec<u8>>,
    /// Gates first-run onboarding.
    pub setup_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Profile for a fresh installation, with a newly minted uid.
    pub fn first_run() -> Self {
        Self {
            uid: UserId::generate(),
            nickname: DEFAULT_NICKNAME.to_string(),
            bio: DEFAULT_BIO.to_string(),
            avatar: None,
            setup_complete: false,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Identity of a remembered channel. Host-mode channels are keyed by their
/// durable uid, join-mode channels by the code the remote host advertised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "mode", content = "key", rename_all = "lowercase")]
pub enum ChannelKey {
    Host(ChannelUid),
    Join(RoomCode),
}

impl ChannelKey {
    pub fn mode(&self) -> ChannelMode {
        match self {
            Self::Host(_) => ChannelMode::Host,
            Self::Join(_) => ChannelMode::Join,
        }
    }

    /// The value stored in the `identity_key` column.
    pub fn identity_key(&self) -> &str {
        match self {
            Self::Host(uid) => uid.as_str(),
            Self::Join(code) => code.as_str(),
        }
    }

    pub fn from_parts(mode: ChannelMode, key: &str) -> Self {
        match mode {
            ChannelMode::Host => Self::Host(ChannelUid(key.to_string())),
            ChannelMode::Join => Self::Join(RoomCode(key.to_string())),
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.mode(), self.identity_key())
    }
}

/// A remembered channel, re-launchable without re-entering credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    /// Display label; not part of the identity.
    pub name: String,
    pub mode: ChannelMode,
    pub address: String,
    pub port: u16,
    pub password: Option<String>,
    /// Durable identity, present on host-mode records.
    pub channel_uid: Option<ChannelUid>,
    /// Code assigned by the gateway in the most recent session.
    pub code: RoomCode,
    pub saved_at: DateTime<Utc>,
}

impl ChannelRecord {
    /// Identity key for this record. Host-mode rows written before channel
    /// uids existed fall back to their code.
    pub fn key(&self) -> ChannelKey {
        match self.mode {
            ChannelMode::Host => ChannelKey::Host(
                self.channel_uid
                    .clone()
                    .unwrap_or_else(|| ChannelUid(self.code.0.clone())),
            ),
            ChannelMode::Join => ChannelKey::Join(self.code.clone()),
        }
    }
}

/// Empty passwords are stored as absent.
pub fn normalize_password(password: &str) -> Option<String> {
    let trimmed = password.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The complete durable record: profile plus remembered channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(flatten)]
    pub profile: Profile,
    pub saved_channels: Vec<ChannelRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mode: ChannelMode, uid: Option<&str>, code: &str) -> ChannelRecord {
        ChannelRecord {
            name: "Alpha".into(),
            mode,
            address: "0.0.0.0".into(),
            port: 25565,
            password: None,
            channel_uid: uid.map(|u| ChannelUid(u.into())),
            code: RoomCode::from(code),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn host_records_are_keyed_by_channel_uid() {
        let rec = record(ChannelMode::Host, Some("U1"), "ABC123");
        assert_eq!(rec.key(), ChannelKey::Host(ChannelUid("U1".into())));
    }

    #[test]
    fn legacy_host_records_fall_back_to_code() {
        let rec = record(ChannelMode::Host, None, "ABC123");
        assert_eq!(rec.key(), ChannelKey::Host(ChannelUid("ABC123".into())));
    }

    #[test]
    fn join_records_are_keyed_by_code_even_with_a_uid() {
        let rec = record(ChannelMode::Join, Some("U1"), "555");
        assert_eq!(rec.key(), ChannelKey::Join(RoomCode::from("555")));
        assert_eq!(rec.key().to_string(), "join:555");
    }

    #[test]
    fn blank_passwords_are_absent() {
        assert_eq!(normalize_password("  "), None);
        assert_eq!(normalize_password(" secret "), Some("secret".into()));
    }
}
