//! Persistence of the [`Profile`] row and loading of the full [`Identity`] record.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use unihub_shared::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::{Identity, Profile};

impl Database {
    /// Load the profile row, if the installation has one yet.
    pub fn load_profile(&self) -> Result<Option<Profile>> {
        let profile = self
            .conn()
            .query_row(
                "SELECT uid, nickname, bio, avatar, setup_complete, created_at
                 FROM identity
                 WHERE id = 1",
                [],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// Write the profile row. The uid of an existing row is never replaced.
    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO identity (id, uid, nickname, bio, avatar, setup_complete, created_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                nickname       = excluded.nickname,
                bio            = excluded.bio,
                avatar         = excluded.avatar,
                setup_complete = excluded.setup_complete",
            params![
                profile.uid.as_str(),
                profile.nickname,
                profile.bio,
                profile.avatar,
                profile.setup_complete,
                profile.created_at.to_rfc3339(),
            ],
        )?;
        tracing::debug!(uid = %profile.uid.short(), "profile saved");
        Ok(())
    }

    /// Load the complete Identity record.
    pub fn load_identity(&self) -> Result<Option<Identity>> {
        let Some(profile) = self.load_profile()? else {
            return Ok(None);
        };
        let saved_channels = self.list_channels()?;
        Ok(Some(Identity {
            profile,
            saved_channels,
        }))
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let uid: String = row.get(0)?;
    let created_str: String = row.get(5)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Profile {
        uid: UserId(uid),
        nickname: row.get(1)?,
        bio: row.get(2)?,
        avatar: row.get(3)?,
        setup_complete: row.get(4)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_database_has_no_profile() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_profile().unwrap(), None);
        assert_eq!(db.load_identity().unwrap(), None);
    }

    #[test]
    fn profile_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unihub.db");

        let mut profile = Profile::first_run();
        profile.nickname = "Ann".into();
        profile.avatar = Some(vec![0xFF, 0xD8, 0xFF]);
        {
            let db = Database::open_at(&path).unwrap();
            db.save_profile(&profile).unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        let loaded = db.load_profile().unwrap().unwrap();
        assert_eq!(loaded.uid, profile.uid);
        assert_eq!(loaded.nickname, "Ann");
        assert_eq!(loaded.avatar, Some(vec![0xFF, 0xD8, 0xFF]));
        assert!(!loaded.setup_complete);
    }

    #[test]
    fn saving_never_rewrites_the_uid() {
        let db = Database::open_in_memory().unwrap();
        let original = Profile::first_run();
        db.save_profile(&original).unwrap();

        let mut other = Profile::first_run();
        other.nickname = "Renamed".into();
        db.save_profile(&other).unwrap();

        let loaded = db.load_profile().unwrap().unwrap();
        assert_eq!(loaded.uid, original.uid);
        assert_eq!(loaded.nickname, "Renamed");
    }
}
