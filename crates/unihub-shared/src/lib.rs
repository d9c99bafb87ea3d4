//! Plain data shared by every Unified Hub layer: identifiers, constants, the
//! session gateway vocabulary and the shared error types.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{GatewayError, ValidationError};
pub use types::{ChannelMode, ChannelUid, RequestId, RoomCode, RoomInfo, RosterEntry, UserId};
