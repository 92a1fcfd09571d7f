use anyhow::Result;
use parlor_types::models::{ChannelDescriptor, NO_CHANNEL, UserProfile};
use rusqlite::Connection;

use crate::{Database, OptionalExt};

/// A user's stored channel descriptor together with the version it was read
/// at. The version is what a compare-and-swap must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChannel {
    pub descriptor: Option<ChannelDescriptor>,
    pub version: i64,
}

impl Database {
    // -- Profiles --

    /// Insert or refresh the local mirror of a user's profile. Channel
    /// columns are left untouched.
    pub fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, nick_name, icon_file_path, enable_invisible)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    nick_name = excluded.nick_name,
                    icon_file_path = excluded.icon_file_path,
                    enable_invisible = excluded.enable_invisible",
                rusqlite::params![
                    profile.id,
                    profile.nick_name,
                    profile.icon_file_path,
                    profile.enable_invisible
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    // -- Channel descriptors --

    pub fn get_channel(&self, user_id: &str) -> Result<Option<StoredChannel>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT current_channel, connect_key, channel_version FROM users WHERE id = ?1",
                [user_id],
                |row| {
                    let channel_id: i64 = row.get(0)?;
                    let connect_key: String = row.get(1)?;
                    let version: i64 = row.get(2)?;
                    let descriptor = (channel_id != NO_CHANNEL).then(|| ChannelDescriptor {
                        channel_id,
                        connect_key,
                    });
                    Ok(StoredChannel { descriptor, version })
                },
            )
            .optional()
        })
    }

    /// Replace the user's descriptor only if nobody else has replaced it
    /// since `expected_version` was read. Returns whether the swap happened.
    pub fn swap_channel(
        &self,
        user_id: &str,
        expected_version: i64,
        descriptor: &ChannelDescriptor,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users
                 SET current_channel = ?1, connect_key = ?2, channel_version = channel_version + 1
                 WHERE id = ?3 AND channel_version = ?4",
                rusqlite::params![
                    descriptor.channel_id,
                    descriptor.connect_key,
                    user_id,
                    expected_version
                ],
            )?;
            Ok(updated == 1)
        })
    }
}

fn query_user(conn: &Connection, id: &str) -> Result<Option<UserProfile>> {
    let mut stmt = conn.prepare(
        "SELECT id, nick_name, icon_file_path, enable_invisible FROM users WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserProfile {
                id: row.get(0)?,
                nick_name: row.get(1)?,
                icon_file_path: row.get(2)?,
                enable_invisible: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            nick_name: format!("nick-{}", id),
            icon_file_path: String::new(),
            enable_invisible: false,
        }
    }

    #[test]
    fn upsert_keeps_channel_columns() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(&profile("alice")).unwrap();

        let stored = db.get_channel("alice").unwrap().unwrap();
        assert_eq!(stored.descriptor, None);

        let desc = ChannelDescriptor { channel_id: 4, connect_key: "key".into() };
        assert!(db.swap_channel("alice", stored.version, &desc).unwrap());

        let mut renamed = profile("alice");
        renamed.nick_name = "Alice".into();
        db.upsert_user(&renamed).unwrap();

        assert_eq!(db.get_user("alice").unwrap().unwrap().nick_name, "Alice");
        assert_eq!(db.get_channel("alice").unwrap().unwrap().descriptor, Some(desc));
    }

    #[test]
    fn stale_swap_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(&profile("bob")).unwrap();
        let version = db.get_channel("bob").unwrap().unwrap().version;

        let first = ChannelDescriptor { channel_id: 1, connect_key: "one".into() };
        let second = ChannelDescriptor { channel_id: 2, connect_key: "two".into() };
        assert!(db.swap_channel("bob", version, &first).unwrap());
        assert!(!db.swap_channel("bob", version, &second).unwrap());

        let stored = db.get_channel("bob").unwrap().unwrap();
        assert_eq!(stored.descriptor, Some(first));
        assert_eq!(stored.version, version + 1);
    }

    #[test]
    fn unknown_user_has_no_channel_row() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_channel("nobody").unwrap().is_none());
        assert!(db.get_user("nobody").unwrap().is_none());
    }
}
