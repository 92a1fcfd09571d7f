use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parlor_types::models::{ConversationId, Message, MessageId};
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use crate::Database;
use crate::models::{MessageRow, from_micros, to_micros};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, send_time, read";

/// Newest message of a conversation plus how many of its messages are
/// unread for one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activity {
    pub latest: Option<Message>,
    pub unread: u64,
}

impl Database {
    /// Store a message and its mention rows as one unit.
    pub fn insert_message(
        &self,
        conversation_id: ConversationId,
        sender_id: &str,
        content: &str,
        send_time: DateTime<Utc>,
        ats: &[String],
    ) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, send_time) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![conversation_id, sender_id, content, to_micros(send_time)],
            )?;
            let id = tx.last_insert_rowid();
            let mut stored_ats: Vec<String> = Vec::with_capacity(ats.len());
            for target in ats {
                if stored_ats.contains(target) {
                    continue;
                }
                tx.execute(
                    "INSERT INTO ats (message_id, target_user_id) VALUES (?1, ?2)",
                    rusqlite::params![id, target],
                )?;
                stored_ats.push(target.clone());
            }
            tx.commit()?;

            Ok(Message {
                id,
                conversation_id,
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                send_time: from_micros(to_micros(send_time))?,
                read: false,
                ats: stored_ats,
            })
        })
    }

    /// Newest-first page of a conversation's history.
    pub fn get_messages(&self, conversation_id: ConversationId, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY send_time DESC, id DESC LIMIT ?2",
                MESSAGE_COLUMNS
            );
            query_messages(conn, &sql, rusqlite::params![conversation_id, limit])
        })
    }

    /// Unread count and newest message of a private conversation as seen by
    /// `viewer_id`. A message is unread while its flag is down and someone
    /// else sent it.
    pub fn private_activity(&self, conversation_id: ConversationId, viewer_id: &str) -> Result<Activity> {
        self.with_conn(|conn| {
            let unread: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND sender_id <> ?2 AND read = 0",
                rusqlite::params![conversation_id, viewer_id],
                |row| row.get(0),
            )?;
            Ok(Activity {
                latest: query_latest(conn, conversation_id)?,
                unread: unread as u64,
            })
        })
    }

    /// Unread count and newest message of a group for a member whose marker
    /// is `read_marker`. Everything sent strictly after the marker is unread.
    pub fn group_activity(&self, group_id: ConversationId, read_marker: DateTime<Utc>) -> Result<Activity> {
        self.with_conn(|conn| {
            let unread: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND send_time > ?2",
                rusqlite::params![group_id, to_micros(read_marker)],
                |row| row.get(0),
            )?;
            Ok(Activity {
                latest: query_latest(conn, group_id)?,
                unread: unread as u64,
            })
        })
    }

    /// Whether a message sent to the group after `read_marker` mentions
    /// `user_id`.
    pub fn has_mention_after(
        &self,
        group_id: ConversationId,
        user_id: &str,
        read_marker: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM ats a JOIN messages m ON m.id = a.message_id
                    WHERE a.target_user_id = ?2 AND m.conversation_id = ?1 AND m.send_time > ?3)",
                rusqlite::params![group_id, user_id, to_micros(read_marker)],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    /// Flag every unread message from the other participant as read.
    /// Returns the send time of the newest message that was already read
    /// before this call, if any. The lookup and the update commit together.
    pub fn mark_private_read(
        &self,
        conversation_id: ConversationId,
        viewer_id: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let previous: Option<i64> = tx.query_row(
                "SELECT MAX(send_time) FROM messages
                 WHERE conversation_id = ?1 AND sender_id <> ?2 AND read = 1",
                rusqlite::params![conversation_id, viewer_id],
                |row| row.get(0),
            )?;
            let flipped = tx.execute(
                "UPDATE messages SET read = 1
                 WHERE conversation_id = ?1 AND sender_id <> ?2 AND read = 0",
                rusqlite::params![conversation_id, viewer_id],
            )?;
            tx.commit()?;

            debug!("Marked {} messages read in conversation {}", flipped, conversation_id);
            previous.map(from_micros).transpose()
        })
    }
}

fn query_latest(conn: &Connection, conversation_id: ConversationId) -> Result<Option<Message>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY send_time DESC, id DESC LIMIT 1",
        MESSAGE_COLUMNS
    );
    Ok(query_messages(conn, &sql, [conversation_id])?.pop())
}

fn query_messages(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let ids: Vec<MessageId> = rows.iter().map(|r| r.id).collect();
    let mut ats_by_message: HashMap<MessageId, Vec<String>> = HashMap::new();
    for (message_id, target) in query_ats(conn, &ids)? {
        ats_by_message.entry(message_id).or_default().push(target);
    }

    rows.into_iter()
        .map(|row| {
            let ats = ats_by_message.remove(&row.id).unwrap_or_default();
            row.into_message(ats)
        })
        .collect()
}

/// Ids bound per `IN (...)` lookup, well under SQLite's variable limit.
const ATS_BATCH: usize = 500;

/// Batch-fetch mention rows for a set of message IDs.
fn query_ats(conn: &Connection, message_ids: &[MessageId]) -> Result<Vec<(MessageId, String)>> {
    let mut ats = Vec::new();
    for batch in message_ids.chunks(ATS_BATCH) {
        let placeholders: Vec<String> = (1..=batch.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT message_id, target_user_id FROM ats WHERE message_id IN ({}) ORDER BY message_id, target_user_id",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(batch.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        for row in rows {
            ats.push(row?);
        }
    }

    Ok(ats)
}
