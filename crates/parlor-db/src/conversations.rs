use anyhow::Result;
use chrono::{DateTime, Utc};
use parlor_types::models::{Conversation, ConversationId, GroupConversation, PrivateConversation};
use rusqlite::{Connection, TransactionBehavior};

use crate::models::{CONVERSATION_COLUMNS, ConversationRow, to_micros};
use crate::{Database, OptionalExt};

/// Order-independent key of a user pair.
fn pair_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Database {
    pub fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    /// Every conversation `user_id` takes part in: private ones where they are
    /// either party, groups they hold a relation in. Rows of any other kind
    /// are returned as well so that decoding reports them instead of hiding
    /// corrupt data.
    pub fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM conversations c
                 WHERE (c.kind = 'private' AND (c.requester_id = ?1 OR c.target_id = ?1))
                    OR (c.kind = 'group' AND EXISTS (
                        SELECT 1 FROM user_group_relations r
                        WHERE r.group_id = c.id AND r.user_id = ?1))
                    OR c.kind NOT IN ('private', 'group')
                 ORDER BY c.id",
                CONVERSATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], ConversationRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(ConversationRow::into_conversation).collect()
        })
    }

    // -- Private conversations --

    pub fn find_private(&self, a: &str, b: &str) -> Result<Option<PrivateConversation>> {
        self.with_conn(|conn| query_private(conn, a, b))
    }

    /// Create the private conversation for the unordered pair unless one
    /// already exists. Returns the stored conversation and whether this call
    /// created it. Concurrent duplicates collapse onto the unique pair index.
    pub fn insert_private_if_absent(
        &self,
        requester_id: &str,
        target_id: &str,
        aes_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(PrivateConversation, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (low, high) = pair_key(requester_id, target_id);
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO conversations
                    (kind, aes_key, created_at, requester_id, target_id, pair_low, pair_high)
                 VALUES ('private', ?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![aes_key, to_micros(now), requester_id, target_id, low, high],
            )?;
            let conversation = query_private(&tx, requester_id, target_id)?
                .ok_or_else(|| anyhow::anyhow!("Private conversation vanished after insert"))?;
            tx.commit()?;
            Ok((conversation, inserted == 1))
        })
    }

    /// Delete the private conversation of the pair in either ordering.
    /// Returns the deleted id, or `None` without touching anything.
    pub fn delete_private(&self, a: &str, b: &str) -> Result<Option<ConversationId>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(existing) = query_private(&tx, a, b)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM conversations WHERE id = ?1", [existing.id])?;
            tx.commit()?;
            Ok(Some(existing.id))
        })
    }

    // -- Groups --

    pub fn insert_group(
        &self,
        group_name: &str,
        group_image_path: &str,
        owner_id: &str,
        join_password: &str,
        aes_key: &str,
        now: DateTime<Utc>,
    ) -> Result<GroupConversation> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations
                    (kind, aes_key, created_at, group_name, group_image_path, owner_id, join_password)
                 VALUES ('group', ?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    aes_key,
                    to_micros(now),
                    group_name,
                    group_image_path,
                    owner_id,
                    join_password
                ],
            )?;
            let id = conn.last_insert_rowid();
            match query_conversation(conn, id)? {
                Some(Conversation::Group(group)) => Ok(group),
                _ => Err(anyhow::anyhow!("Group {} vanished after insert", id)),
            }
        })
    }
}

fn query_conversation(conn: &Connection, id: ConversationId) -> Result<Option<Conversation>> {
    let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
    let row = conn
        .query_row(&sql, [id], ConversationRow::from_row)
        .optional()?;

    row.map(ConversationRow::into_conversation).transpose()
}

fn query_private(conn: &Connection, a: &str, b: &str) -> Result<Option<PrivateConversation>> {
    let (low, high) = pair_key(a, b);
    let sql = format!(
        "SELECT {} FROM conversations WHERE kind = 'private' AND pair_low = ?1 AND pair_high = ?2",
        CONVERSATION_COLUMNS
    );
    let row = conn
        .query_row(&sql, [low, high], ConversationRow::from_row)
        .optional()?;

    match row.map(ConversationRow::into_conversation).transpose()? {
        Some(Conversation::Private(private)) => Ok(Some(private)),
        Some(Conversation::Group(_)) | None => Ok(None),
    }
}
