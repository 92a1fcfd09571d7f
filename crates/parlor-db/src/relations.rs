use anyhow::Result;
use chrono::{DateTime, Utc};
use parlor_types::models::{ConversationId, UserGroupRelation};
use rusqlite::{Connection, TransactionBehavior};

use crate::models::{RelationRow, from_micros, to_micros};
use crate::{Database, OptionalExt};

impl Database {
    pub fn get_relation(&self, user_id: &str, group_id: ConversationId) -> Result<Option<UserGroupRelation>> {
        self.with_conn(|conn| query_relation(conn, user_id, group_id))
    }

    /// Add `user_id` to the group with its read marker at `now`. An existing
    /// membership is left as it is. Returns the stored relation and whether
    /// this call created it.
    pub fn insert_relation_if_absent(
        &self,
        user_id: &str,
        group_id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(UserGroupRelation, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO user_group_relations (user_id, group_id, read_time_stamp, muted, join_time)
                 VALUES (?1, ?2, ?3, 0, ?3)",
                rusqlite::params![user_id, group_id, to_micros(now)],
            )?;
            let relation = query_relation(&tx, user_id, group_id)?
                .ok_or_else(|| anyhow::anyhow!("Relation vanished after insert"))?;
            tx.commit()?;
            Ok((relation, inserted == 1))
        })
    }

    /// Returns false when there was no such membership.
    pub fn delete_relation(&self, user_id: &str, group_id: ConversationId) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM user_group_relations WHERE user_id = ?1 AND group_id = ?2",
                rusqlite::params![user_id, group_id],
            )?;
            Ok(deleted == 1)
        })
    }

    /// Returns false when there was no such membership.
    pub fn set_relation_muted(&self, user_id: &str, group_id: ConversationId, muted: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE user_group_relations SET muted = ?3 WHERE user_id = ?1 AND group_id = ?2",
                rusqlite::params![user_id, group_id, muted],
            )?;
            Ok(updated == 1)
        })
    }

    /// Move the member's read marker forward to `now` and return the value it
    /// held before. The marker never moves backwards. `None` means the user
    /// is not a member.
    pub fn advance_read_marker(
        &self,
        user_id: &str,
        group_id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let previous: Option<i64> = tx
                .query_row(
                    "SELECT read_time_stamp FROM user_group_relations WHERE user_id = ?1 AND group_id = ?2",
                    rusqlite::params![user_id, group_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(previous) = previous else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE user_group_relations SET read_time_stamp = MAX(read_time_stamp, ?3)
                 WHERE user_id = ?1 AND group_id = ?2",
                rusqlite::params![user_id, group_id, to_micros(now)],
            )?;
            tx.commit()?;
            Ok(Some(from_micros(previous)?))
        })
    }
}

fn query_relation(conn: &Connection, user_id: &str, group_id: ConversationId) -> Result<Option<UserGroupRelation>> {
    let row = conn
        .query_row(
            "SELECT user_id, group_id, read_time_stamp, muted, join_time
             FROM user_group_relations WHERE user_id = ?1 AND group_id = ?2",
            rusqlite::params![user_id, group_id],
            RelationRow::from_row,
        )
        .optional()?;

    row.map(RelationRow::into_relation).transpose()
}
