/// Application name
pub const APP_NAME: &str = "Unified Hub";

/// How long a join attempt may wait for the host before it is abandoned.
pub const JOIN_TIMEOUT_MS: u64 = 5_000;

/// Settle delay between accepting a secondary-host offer and telling the gateway.
pub const PROMOTION_SETTLE_MS: u64 = 1_500;

/// Port offered by default for both hosting and joining
pub const DEFAULT_PORT: u16 = 25_565;

/// Bind address recorded for hosted channels when none was given
pub const DEFAULT_HOST_ADDRESS: &str = "0.0.0.0";

/// Display label used when the host leaves the room name blank
pub const DEFAULT_ROOM_NAME: &str = "Unnamed Room";

/// First-run profile defaults
pub const DEFAULT_NICKNAME: &str = "NewUser";
pub const DEFAULT_BIO: &str = "Hey there! I am using Unified Hub.";

/// System messages starting with this marker resolve a pending join as rejected.
pub const REJECTION_MARKER: &str = "Connection rejected";

/// Alphabet for user uids and channel uids.
pub const TOKEN_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Length of a freshly minted user uid
pub const USER_UID_LEN: usize = 18;

/// Length of a freshly minted channel uid
pub const CHANNEL_UID_LEN: usize = 20;

/// Chat transcript lines retained per session
pub const MAX_TRANSCRIPT_LINES: usize = 100;
