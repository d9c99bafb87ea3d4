//! In-memory Identity backed by the SQLite store.
//!
//! Every edit is written to disk first and applied in memory only once the
//! write has committed, so the two never disagree.

use std::collections::BTreeMap;

use unihub_shared::{ChannelMode, UserId, ValidationError};
use unihub_store::{ChannelKey, ChannelRecord, Database, Identity, Profile};

use crate::error::SessionError;

pub struct IdentityStore {
    db: Database,
    profile: Profile,
    channels: BTreeMap<ChannelKey, ChannelRecord>,
}

impl IdentityStore {
    /// Load the identity from `db`, creating a first-run identity if the
    /// database is empty.
    pub fn open(db: Database) -> Result<Self, SessionError> {
        let identity = match db.load_identity()? {
            Some(identity) => identity,
            None => {
                let profile = Profile::first_run();
                db.save_profile(&profile)?;
                tracing::info!(uid = %profile.uid.short(), "Created first-run identity");
                Identity {
                    profile,
                    saved_channels: Vec::new(),
                }
            }
        };

        let channels = identity
            .saved_channels
            .into_iter()
            .map(|record| (record.key(), record))
            .collect();

        Ok(Self {
            db,
            profile: identity.profile,
            channels,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn uid(&self) -> &UserId {
        &self.profile.uid
    }

    /// Finish first-run onboarding.
    pub fn complete_setup(&mut self, nickname: &str, bio: &str) -> Result<(), SessionError> {
        let mut profile = self.profile.clone();
        profile.nickname = validate_nickname(nickname)?;
        profile.bio = bio.trim().to_string();
        profile.setup_complete = true;
        self.save(profile)
    }

    pub fn update_profile(&mut self, nickname: &str, bio: &str) -> Result<(), SessionError> {
        let mut profile = self.profile.clone();
        profile.nickname = validate_nickname(nickname)?;
        profile.bio = bio.trim().to_string();
        self.save(profile)
    }

    pub fn set_avatar(&mut self, avatar: Option<Vec<u8>>) -> Result<(), SessionError> {
        let mut profile = self.profile.clone();
        profile.avatar = avatar;
        self.save(profile)
    }

    fn save(&mut self, profile: Profile) -> Result<(), SessionError> {
        self.db.save_profile(&profile)?;
        self.profile = profile;
        Ok(())
    }

    pub fn channel(&self, key: &ChannelKey) -> Option<&ChannelRecord> {
        self.channels.get(key)
    }

    /// Remembered channels, most recently saved first.
    pub fn channels(&self) -> Vec<&ChannelRecord> {
        let mut records: Vec<_> = self.channels.values().collect();
        records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        records
    }

    pub fn channels_in_mode(&self, mode: ChannelMode) -> Vec<&ChannelRecord> {
        self.channels()
            .into_iter()
            .filter(|record| record.mode == mode)
            .collect()
    }

    /// Snapshot of the complete durable record.
    pub fn identity(&self) -> Identity {
        Identity {
            profile: self.profile.clone(),
            saved_channels: self.channels().into_iter().cloned().collect(),
        }
    }

    /// Take over the display fields of `profile`. The uid and creation time
    /// stay those of this installation.
    pub(crate) fn adopt_profile(&mut self, profile: Profile) -> Result<(), SessionError> {
        let profile = Profile {
            uid: self.profile.uid.clone(),
            created_at: self.profile.created_at,
            ..profile
        };
        self.save(profile)
    }

    pub(crate) fn upsert_channel(&mut self, record: ChannelRecord) -> Result<(), SessionError> {
        self.db.upsert_channel(&record)?;
        self.channels.insert(record.key(), record);
        Ok(())
    }

    pub(crate) fn evict_channel(&mut self, key: &ChannelKey) -> Result<bool, SessionError> {
        let deleted = self.db.delete_channel(key)?;
        self.channels.remove(key);
        Ok(deleted)
    }
}

fn validate_nickname(nickname: &str) -> Result<String, ValidationError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyNickname);
    }
    Ok(trimmed.to_string())
}
