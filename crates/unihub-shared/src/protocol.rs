use serde::{Deserialize, Serialize};

use crate::constants::REJECTION_MARKER;
use crate::types::{ChannelUid, RequestId, RoomCode, RoomInfo, RosterEntry, UserId};

/// Parameters of a start-host request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostRequest {
    pub name: String,
    pub port: u16,
    pub password: String,
    pub previous_code: Option<RoomCode>,
    pub channel_uid: Option<ChannelUid>,
}

/// Parameters of a start-client request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub address: String,
    pub port: u16,
    pub password: String,
}

/// Requests issued by the core to the session backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GatewayCommand {
    StartHost {
        request: RequestId,
        #[serde(flatten)]
        params: HostRequest,
    },
    StartClient {
        request: RequestId,
        #[serde(flatten)]
        params: JoinRequest,
    },
    /// `terminal = false` keeps a hosted room running without this client.
    Disconnect { terminal: bool },
    MigrateHost { request: RequestId },
    /// Fire-and-forget; no reply is expected.
    RequestSecondary { target: UserId },
    AcceptSecondary { request: RequestId },
    Reenter { request: RequestId },
    SendChat { text: String },
    UpdateProfile { nickname: String, bio: String },
}

/// Replies and pushes delivered by the session backend, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GatewayEvent {
    HostStarted {
        request: RequestId,
        room_code: RoomCode,
    },
    /// Explicit refusal of a host, migrate or accept-secondary request.
    Rejected {
        request: RequestId,
        reason: String,
    },
    RoomAccepted {
        request: RequestId,
        code: RoomCode,
        name: String,
    },
    /// Free-form notice. Untagged notices refer to the current join attempt.
    SystemMessage {
        request: Option<RequestId>,
        text: String,
    },
    MigrateResult {
        request: RequestId,
        accepted: bool,
    },
    ReenterResult {
        request: RequestId,
        room: Option<RoomInfo>,
    },
    RosterUpdate {
        entries: Vec<RosterEntry>,
    },
    PromotionOffered,
    SecondaryAssigned {
        uid: UserId,
    },
    ControlsPromotedToHost,
    RoomClosed,
    ChatReceived {
        uid: UserId,
        nick: String,
        text: String,
    },
}

impl GatewayCommand {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl GatewayEvent {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Whether a system message is the backend refusing a connection.
pub fn is_rejection(text: &str) -> bool {
    text.starts_with(REJECTION_MARKER)
}

/// Reason portion of a rejection message, falling back to the whole text.
pub fn rejection_reason(text: &str) -> &str {
    text.strip_prefix(REJECTION_MARKER)
        .map(|rest| rest.trim_start_matches(':').trim())
        .filter(|rest| !rest.is_empty())
        .unwrap_or(text)
}
