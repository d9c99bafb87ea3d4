//! Channel Registry: derives a hosted channel's durable identity across
//! re-hosting sessions and keeps the remembered-channel list up to date.

use chrono::Utc;

use unihub_shared::constants::DEFAULT_HOST_ADDRESS;
use unihub_shared::{ChannelMode, ChannelUid, RoomCode};
use unihub_store::{normalize_password, ChannelKey, ChannelRecord};

use crate::error::SessionError;
use crate::identity::IdentityStore;

/// Durable identity to send along with a start-host request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub channel_uid: ChannelUid,
    pub previous_code: Option<RoomCode>,
}

/// Values staged by launching a remembered host channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRelaunch {
    pub channel_uid: ChannelUid,
    pub rehost_code: Option<RoomCode>,
}

/// Pick the identity for a host start. Staged values win verbatim, then a
/// remembered host channel with the same name and port, then a fresh uid.
pub fn resolve_host_identity(
    store: &IdentityStore,
    staged: Option<StagedRelaunch>,
    name: &str,
    port: u16,
) -> HostIdentity {
    if let Some(staged) = staged {
        return HostIdentity {
            channel_uid: staged.channel_uid,
            previous_code: staged.rehost_code,
        };
    }

    let remembered = store
        .channels_in_mode(ChannelMode::Host)
        .into_iter()
        .find(|record| record.name == name && record.port == port);

    match remembered {
        // Records saved before channel uids existed adopt their code.
        Some(record) => HostIdentity {
            channel_uid: record
                .channel_uid
                .clone()
                .unwrap_or_else(|| ChannelUid(record.code.0.clone())),
            previous_code: Some(record.code.clone()),
        },
        None => HostIdentity {
            channel_uid: ChannelUid::generate(),
            previous_code: None,
        },
    }
}

/// Remember a room this client just started hosting.
pub fn record_host(
    store: &mut IdentityStore,
    name: &str,
    address: Option<&str>,
    port: u16,
    password: &str,
    channel_uid: ChannelUid,
    code: RoomCode,
) -> Result<ChannelRecord, SessionError> {
    let record = ChannelRecord {
        name: name.to_string(),
        mode: ChannelMode::Host,
        address: address
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_HOST_ADDRESS)
            .to_string(),
        port,
        password: normalize_password(password),
        channel_uid: Some(channel_uid),
        code,
        saved_at: Utc::now(),
    };
    store.upsert_channel(record.clone())?;
    tracing::info!(key = %record.key(), name = %record.name, "Remembered hosted channel");
    Ok(record)
}

/// Remember a room this client just joined, keyed by the code its host
/// advertised.
pub fn record_join(
    store: &mut IdentityStore,
    name: &str,
    address: &str,
    port: u16,
    password: &str,
    code: RoomCode,
) -> Result<ChannelRecord, SessionError> {
    let record = ChannelRecord {
        name: name.to_string(),
        mode: ChannelMode::Join,
        address: address.trim().to_string(),
        port,
        password: normalize_password(password),
        channel_uid: None,
        code,
        saved_at: Utc::now(),
    };
    store.upsert_channel(record.clone())?;
    tracing::info!(key = %record.key(), name = %record.name, "Remembered joined channel");
    Ok(record)
}

/// Drop a remembered channel. Returns whether one was removed.
pub fn forget(store: &mut IdentityStore, key: &ChannelKey) -> Result<bool, SessionError> {
    let removed = store.evict_channel(key)?;
    if removed {
        tracing::info!(%key, "Forgot channel");
    }
    Ok(removed)
}

/// Staging values for relaunching a remembered host channel.
pub fn staged_for(record: &ChannelRecord) -> Option<StagedRelaunch> {
    match record.key() {
        ChannelKey::Host(channel_uid) => Some(StagedRelaunch {
            channel_uid,
            rehost_code: Some(record.code.clone()),
        }),
        ChannelKey::Join(_) => None,
    }
}
