//! Upsert / evict / list operations for [`ChannelRecord`] rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use unihub_shared::{ChannelMode, ChannelUid, RoomCode};

use crate::database::Database;
use crate::error::Result;
use crate::models::{ChannelKey, ChannelRecord};

impl Database {
    /// Insert a channel, or overwrite the row that already carries its
    /// identity key. Never produces a duplicate.
    pub fn upsert_channel(&self, record: &ChannelRecord) -> Result<()> {
        upsert_on(self.conn(), record)?;
        tracing::debug!(key = %record.key(), name = %record.name, "channel saved");
        Ok(())
    }

    /// Delete a channel by identity key. Returns `true` if a row was deleted.
    pub fn delete_channel(&self, key: &ChannelKey) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM saved_channels WHERE mode = ?1 AND identity_key = ?2",
            params![key.mode().as_str(), key.identity_key()],
        )?;
        Ok(affected > 0)
    }

    /// List all remembered channels, most recently saved first.
    pub fn list_channels(&self) -> Result<Vec<ChannelRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT name, mode, address, port, password, channel_uid, code, saved_at
             FROM saved_channels
             ORDER BY saved_at DESC",
        )?;

        let rows = stmt.query_map([], row_to_channel)?;

        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }
}

fn upsert_on(conn: &Connection, record: &ChannelRecord) -> rusqlite::Result<usize> {
    let key = record.key();
    conn.execute(
        "INSERT INTO saved_channels
            (mode, identity_key, name, address, port, password, channel_uid, code, saved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(mode, identity_key) DO UPDATE SET
            name        = excluded.name,
            address     = excluded.address,
            port        = excluded.port,
            password    = excluded.password,
            channel_uid = excluded.channel_uid,
            code        = excluded.code,
            saved_at    = excluded.saved_at",
        params![
            key.mode().as_str(),
            key.identity_key(),
            record.name,
            record.address,
            record.port,
            record.password,
            record.channel_uid.as_ref().map(|u| u.as_str()),
            record.code.as_str(),
            record.saved_at.to_rfc3339(),
        ],
    )
}

/// Map a `rusqlite::Row` to a [`ChannelRecord`].
fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRecord> {
    let name: String = row.get(0)?;
    let mode_str: String = row.get(1)?;
    let address: String = row.get(2)?;
    let port: u16 = row.get(3)?;
    let password: Option<String> = row.get(4)?;
    let channel_uid: Option<String> = row.get(5)?;
    let code: String = row.get(6)?;
    let saved_str: String = row.get(7)?;

    let mode = ChannelMode::parse(&mode_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown channel mode {mode_str:?}").into(),
        )
    })?;

    let saved_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&saved_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChannelRecord {
        name,
        mode,
        address,
        port,
        password,
        channel_uid: channel_uid.map(ChannelUid),
        code: RoomCode(code),
        saved_at,
    })
}
