use thiserror::Error;

use unihub_shared::{GatewayError, UserId, ValidationError};
use unihub_store::{ChannelKey, StoreError};

use crate::state::SessionState;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    #[error("No remembered channel {0}")]
    UnknownChannel(ChannelKey),

    #[error("{0} is not in the room")]
    UnknownParticipant(UserId),

    #[error("Room controller has stopped")]
    ControllerStopped,

    #[error("Profile document error: {0}")]
    ProfileFormat(#[from] serde_json::Error),

    #[error("Invalid avatar encoding: {0}")]
    AvatarEncoding(#[from] base64::DecodeError),
}
