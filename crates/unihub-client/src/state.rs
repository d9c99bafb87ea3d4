//! Room session state: the lifecycle enum plus everything the controller
//! tracks while a room is live.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use unihub_shared::constants::MAX_TRANSCRIPT_LINES;
use unihub_shared::{ChannelUid, RoomCode, RosterEntry, UserId};

/// Lifecycle position of the local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    HostConnecting,
    JoinConnecting,
    Hosted,
    Joined,
    /// The local host left its room running without a client attached.
    Backgrounded,
    Migrating,
    /// A secondary-host offer is on screen over a live room.
    AwaitingSecondaryDecision,
}

impl SessionState {
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::Hosted | Self::Joined | Self::Migrating | Self::AwaitingSecondaryDecision
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::HostConnecting => "starting a host",
            Self::JoinConnecting => "joining",
            Self::Hosted => "hosting",
            Self::Joined => "joined",
            Self::Backgrounded => "running in background",
            Self::Migrating => "migrating",
            Self::AwaitingSecondaryDecision => "awaiting a secondary-host decision",
        };
        f.write_str(text)
    }
}

/// Secondary-host offer overlay. Offers and settle timers are numbered so a
/// newer offer makes an older one's timer stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionOverlay {
    #[default]
    Hidden,
    Offered(u64),
    /// Accepted, waiting out the settle delay before telling the gateway.
    Settling(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptLine {
    /// `None` for system notices.
    pub uid: Option<UserId>,
    pub nick: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// What the presentation layer shows for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCard {
    pub uid: UserId,
    pub nick: String,
    /// Name the user carried when first seen in this room, if it differs.
    pub original_nick: Option<String>,
    pub avatar: Option<String>,
    pub is_host: bool,
    pub is_live: bool,
    /// False once the user has left the roster.
    pub present: bool,
}

/// Read-only view published to the presentation layer after every input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub is_host: bool,
    pub room_name: Option<String>,
    pub room_code: Option<RoomCode>,
    pub roster: Vec<RosterEntry>,
    pub secondary: Option<UserId>,
    pub promotion_offered: bool,
    pub exit_decision_open: bool,
    pub background_banner: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            is_host: false,
            room_name: None,
            room_code: None,
            roster: Vec::new(),
            secondary: None,
            promotion_offered: false,
            exit_decision_open: false,
            background_banner: false,
        }
    }
}

/// Per-room data. Reset on every return to idle, except for the staged
/// relaunch values and the first-seen nick table.
#[derive(Debug, Default)]
pub struct RoomSession {
    pub(crate) is_host: bool,
    pub(crate) room_name: Option<String>,
    pub(crate) room_code: Option<RoomCode>,
    pub(crate) channel_uid: Option<ChannelUid>,
    pub(crate) roster: Vec<RosterEntry>,
    pub(crate) first_seen_nicks: HashMap<UserId, String>,
    pub(crate) transcript: VecDeque<TranscriptLine>,
    pub(crate) secondary: Option<UserId>,
    pub(crate) exit_decision_open: bool,
    pub(crate) promotion: PromotionOverlay,
    pub(crate) pending_channel_uid: Option<ChannelUid>,
    pub(crate) pending_rehost_code: Option<RoomCode>,
}

impl RoomSession {
    /// Clear per-room data ahead of a host or join start.
    pub(crate) fn begin(&mut self, is_host: bool) {
        self.reset();
        self.is_host = is_host;
        self.first_seen_nicks.clear();
    }

    pub(crate) fn reset(&mut self) {
        self.is_host = false;
        self.room_name = None;
        self.room_code = None;
        self.channel_uid = None;
        self.roster.clear();
        self.transcript.clear();
        self.secondary = None;
        self.exit_decision_open = false;
        self.promotion = PromotionOverlay::Hidden;
    }

    pub(crate) fn enter(&mut self, name: String, code: RoomCode) {
        self.room_name = Some(name);
        self.room_code = Some(code);
    }

    /// Replace the roster, remembering the first nick each uid showed up with.
    pub(crate) fn apply_roster(&mut self, entries: Vec<RosterEntry>) {
        for entry in &entries {
            self.first_seen_nicks
                .entry(entry.uid.clone())
                .or_insert_with(|| entry.nick.clone());
        }
        self.roster = entries;
    }

    pub(crate) fn push_line(&mut self, uid: Option<UserId>, nick: &str, text: &str) {
        if self.transcript.len() == MAX_TRANSCRIPT_LINES {
            self.transcript.pop_front();
        }
        self.transcript.push_back(TranscriptLine {
            uid,
            nick: nick.to_string(),
            text: text.to_string(),
            at: Utc::now(),
        });
    }

    pub(crate) fn push_notice(&mut self, text: &str) {
        self.push_line(None, "System", text);
    }

    pub(crate) fn stage_relaunch(&mut self, channel_uid: ChannelUid, rehost_code: Option<RoomCode>) {
        self.pending_channel_uid = Some(channel_uid);
        self.pending_rehost_code = rehost_code;
    }

    /// Staged relaunch values, cleared as they are read.
    pub(crate) fn take_staged(&mut self) -> (Option<ChannelUid>, Option<RoomCode>) {
        (self.pending_channel_uid.take(), self.pending_rehost_code.take())
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn room_name(&self) -> Option<&str> {
        self.room_name.as_deref()
    }

    pub fn room_code(&self) -> Option<&RoomCode> {
        self.room_code.as_ref()
    }

    pub fn channel_uid(&self) -> Option<&ChannelUid> {
        self.channel_uid.as_ref()
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn transcript(&self) -> impl Iterator<Item = &TranscriptLine> {
        self.transcript.iter()
    }

    pub fn secondary(&self) -> Option<&UserId> {
        self.secondary.as_ref()
    }

    pub fn promotion(&self) -> PromotionOverlay {
        self.promotion
    }

    pub fn exit_decision_open(&self) -> bool {
        self.exit_decision_open
    }

    pub fn profile_card(&self, uid: &UserId) -> Option<ProfileCard> {
        let original = self.first_seen_nicks.get(uid);
        if let Some(entry) = self.roster.iter().find(|e| &e.uid == uid) {
            return Some(ProfileCard {
                uid: uid.clone(),
                nick: entry.nick.clone(),
                original_nick: original.filter(|nick| **nick != entry.nick).cloned(),
                avatar: entry.avatar.clone(),
                is_host: entry.is_host,
                is_live: entry.is_live,
                present: true,
            });
        }
        original.map(|nick| ProfileCard {
            uid: uid.clone(),
            nick: nick.clone(),
            original_nick: None,
            avatar: None,
            is_host: false,
            is_live: false,
            present: false,
        })
    }
}
