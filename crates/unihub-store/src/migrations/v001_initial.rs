//! v001 -- Initial schema creation.
//!
//! Creates the two tables backing the Identity record: the single-row
//! `identity` profile and the `saved_channels` list.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Local identity (exactly one row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS identity (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    uid            TEXT NOT NULL,
    nickname       TEXT NOT NULL,
    bio            TEXT NOT NULL DEFAULT '',
    avatar         BLOB,
    setup_complete INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at     TEXT NOT NULL                -- RFC-3339
);

-- ----------------------------------------------------------------
-- Remembered channels
--
-- identity_key is the channel uid for host-mode rows and the room code
-- for join-mode rows; the primary key makes duplicates impossible.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS saved_channels (
    mode         TEXT NOT NULL CHECK (mode IN ('host', 'join')),
    identity_key TEXT NOT NULL,
    name         TEXT NOT NULL,
    address      TEXT NOT NULL,
    port         INTEGER NOT NULL,
    password     TEXT,
    channel_uid  TEXT,
    code         TEXT NOT NULL,
    saved_at     TEXT NOT NULL,                 -- RFC-3339

    PRIMARY KEY (mode, identity_key)
);

CREATE INDEX IF NOT EXISTS idx_saved_channels_host_lookup
    ON saved_channels(mode, name, port);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
