//! Portable profile documents for moving an identity between machines.
//!
//! Documents written by older releases used snake_case keys, `ip` for the
//! address, string ports and millisecond timestamps; all of those still
//! import.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use unihub_shared::constants::DEFAULT_NICKNAME;
use unihub_shared::{ChannelMode, ChannelUid, RoomCode, UserId};
use unihub_store::{normalize_password, ChannelKey, ChannelRecord, Identity, Profile};

use crate::error::SessionError;
use crate::identity::IdentityStore;

/// Portable Identity: profile plus remembered channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    /// App version that produced this export
    #[serde(default)]
    pub version: String,
    /// RFC 3339 timestamp
    #[serde(default)]
    pub exported_at: Option<String>,
    /// Exporting installation's uid. Importing never changes the local uid.
    #[serde(default)]
    pub uid: Option<UserId>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub bio: String,
    /// Base64-encoded image bytes
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, alias = "setup_done")]
    pub setup_complete: bool,
    #[serde(default, alias = "saved_channels")]
    pub saved_channels: Vec<ProfileChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChannel {
    pub name: String,
    pub mode: ChannelMode,
    #[serde(default, alias = "ip")]
    pub address: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub channel_uid: Option<ChannelUid>,
    pub code: RoomCode,
    #[serde(default, deserialize_with = "timestamp_from_any")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImportResult {
    pub uid: UserId,
    pub channels_imported: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortField {
    Number(u16),
    Text(String),
}

fn port_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    match PortField::deserialize(deserializer)? {
        PortField::Number(port) => Ok(port),
        PortField::Text(text) => {
            unihub_shared::types::parse_port(&text).map_err(serde::de::Error::custom)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampField {
    Text(DateTime<Utc>),
    Millis(i64),
}

fn timestamp_from_any<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Option::<TimestampField>::deserialize(deserializer)? {
        Some(TimestampField::Text(at)) => Some(at),
        Some(TimestampField::Millis(ms)) => Utc.timestamp_millis_opt(ms).single(),
        None => None,
    })
}

impl ProfilePayload {
    pub fn from_identity(identity: &Identity) -> Self {
        let profile = &identity.profile;
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Some(Utc::now().to_rfc3339()),
            uid: Some(profile.uid.clone()),
            nickname: profile.nickname.clone(),
            bio: profile.bio.clone(),
            avatar: profile.avatar.as_ref().map(|bytes| BASE64.encode(bytes)),
            setup_complete: profile.setup_complete,
            saved_channels: identity
                .saved_channels
                .iter()
                .map(|record| ProfileChannel {
                    name: record.name.clone(),
                    mode: record.mode,
                    address: record.address.clone(),
                    port: record.port,
                    password: record.password.clone(),
                    channel_uid: record.channel_uid.clone(),
                    code: record.code.clone(),
                    saved_at: Some(record.saved_at),
                })
                .collect(),
        }
    }

    /// Build the Identity this document describes, owned by `local`'s uid.
    pub fn into_identity(self, local: &Profile) -> Result<Identity, SessionError> {
        let avatar = self
            .avatar
            .filter(|encoded| !encoded.is_empty())
            .map(|encoded| BASE64.decode(encoded))
            .transpose()?;

        let nickname = match self.nickname.trim() {
            "" => DEFAULT_NICKNAME.to_string(),
            trimmed => trimmed.to_string(),
        };

        let now = Utc::now();
        let saved_channels = self
            .saved_channels
            .into_iter()
            .map(|channel| {
                // Host records from before channel uids adopt their code.
                let channel_uid = match channel.mode {
                    ChannelMode::Host => Some(
                        channel
                            .channel_uid
                            .unwrap_or_else(|| ChannelUid(channel.code.0.clone())),
                    ),
                    ChannelMode::Join => channel.channel_uid,
                };
                ChannelRecord {
                    name: channel.name,
                    mode: channel.mode,
                    address: channel.address,
                    port: channel.port,
                    password: channel.password.as_deref().and_then(normalize_password),
                    channel_uid,
                    code: channel.code,
                    saved_at: channel.saved_at.unwrap_or(now),
                }
            })
            .collect();

        Ok(Identity {
            profile: Profile {
                uid: local.uid.clone(),
                nickname,
                bio: self.bio,
                avatar,
                setup_complete: self.setup_complete,
                created_at: local.created_at,
            },
            saved_channels,
        })
    }
}

/// Export the Identity as pretty-printed JSON.
pub fn export_profile(store: &IdentityStore) -> Result<String, SessionError> {
    let payload = ProfilePayload::from_identity(&store.identity());
    let json = serde_json::to_string_pretty(&payload)?;
    tracing::info!(
        uid = %store.uid().short(),
        channels = payload.saved_channels.len(),
        "Profile exported"
    );
    Ok(json)
}

/// Apply the profile and channels in `json` to the local Identity.
///
/// The whole document is decoded before anything is written. The local uid
/// is kept, and each channel is upserted by its identity key like any other
/// remembered channel.
pub fn import_profile(
    store: &mut IdentityStore,
    json: &str,
) -> Result<ProfileImportResult, SessionError> {
    let payload: ProfilePayload = serde_json::from_str(json)?;
    let identity = payload.into_identity(store.profile())?;
    let channels: BTreeMap<ChannelKey, ChannelRecord> = identity
        .saved_channels
        .into_iter()
        .map(|record| (record.key(), record))
        .collect();

    store.adopt_profile(identity.profile)?;
    let channels_imported = channels.len();
    for record in channels.into_values() {
        store.upsert_channel(record)?;
    }

    let result = ProfileImportResult {
        uid: store.uid().clone(),
        channels_imported,
    };
    tracing::info!(
        uid = %result.uid.short(),
        channels = result.channels_imported,
        "Profile imported"
    );
    Ok(result)
}
