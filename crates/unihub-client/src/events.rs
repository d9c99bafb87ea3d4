use serde::Serialize;
use tokio::sync::mpsc;

use unihub_shared::{RoomCode, UserId};

use crate::state::SessionState;

/// Notifications for the presentation layer, one per transition or notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    RoomEntered {
        name: String,
        code: RoomCode,
        is_host: bool,
    },
    ConnectionRejected {
        reason: String,
    },
    ConnectionTimedOut,
    Left,
    ExitDecisionOpened,
    ExitDecisionDismissed,
    BackgroundBanner {
        visible: bool,
    },
    /// Re-entry found no live room; not an error.
    RoomExpired,
    ServerShutdown,
    Migrated,
    MigrationFailed {
        reason: String,
    },
    PromotionOffered,
    PromotionDismissed {
        accepted: bool,
    },
    SecondaryAssigned {
        uid: UserId,
        is_self: bool,
    },
    PromotedToHost,
    RoomClosed,
    RosterUpdated {
        participants: usize,
    },
    ChannelsChanged,
    ProfileChanged,
    SystemMessage {
        text: String,
    },
    Chat {
        uid: UserId,
        nick: String,
        text: String,
    },
    /// An intent from the presentation layer could not be applied.
    IntentFailed {
        reason: String,
    },
}

pub type EventSink = mpsc::UnboundedSender<SessionEvent>;

pub fn emit_event(sink: &EventSink, event: SessionEvent) {
    if let Err(e) = sink.send(event) {
        tracing::warn!(event = ?e.0, "Presentation layer is gone, dropping event");
    }
}
