//! Database row types and conversions into `parlor-types` models.
//! Timestamps are stored as UTC microseconds so ordering and comparison can
//! happen in SQL.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use parlor_types::models::{
    Conversation, ConversationKind, GroupConversation, Message, PrivateConversation, UserGroupRelation,
};

pub fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

pub fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| anyhow!("Timestamp out of range: {}", micros))
}

/// Columns selected by every conversation query, in this order.
pub(crate) const CONVERSATION_COLUMNS: &str = "id, kind, aes_key, created_at, requester_id, target_id, \
     group_name, group_image_path, owner_id, join_password";

pub struct ConversationRow {
    pub id: i64,
    pub kind: String,
    pub aes_key: String,
    pub created_at: i64,
    pub requester_id: Option<String>,
    pub target_id: Option<String>,
    pub group_name: Option<String>,
    pub group_image_path: Option<String>,
    pub owner_id: Option<String>,
    pub join_password: Option<String>,
}

impl ConversationRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            aes_key: row.get(2)?,
            created_at: row.get(3)?,
            requester_id: row.get(4)?,
            target_id: row.get(5)?,
            group_name: row.get(6)?,
            group_image_path: row.get(7)?,
            owner_id: row.get(8)?,
            join_password: row.get(9)?,
        })
    }

    /// Decode into the two-variant model. An unknown `kind` yields
    /// `CoreError::UnsupportedConversationKind` inside the returned error.
    pub fn into_conversation(self) -> Result<Conversation> {
        let kind: ConversationKind = self.kind.parse()?;
        let created_at = from_micros(self.created_at)?;
        let id = self.id;
        let missing = |column: &str| anyhow!("Conversation {} is missing {}", id, column);

        Ok(match kind {
            ConversationKind::Private => Conversation::Private(PrivateConversation {
                id,
                requester_id: self.requester_id.ok_or_else(|| missing("requester_id"))?,
                target_id: self.target_id.ok_or_else(|| missing("target_id"))?,
                aes_key: self.aes_key,
                created_at,
            }),
            ConversationKind::Group => Conversation::Group(GroupConversation {
                id,
                group_name: self.group_name.ok_or_else(|| missing("group_name"))?,
                group_image_path: self.group_image_path.unwrap_or_default(),
                owner_id: self.owner_id.ok_or_else(|| missing("owner_id"))?,
                join_password: self.join_password.unwrap_or_default(),
                aes_key: self.aes_key,
                created_at,
            }),
        })
    }
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: String,
    pub content: String,
    pub send_time: i64,
    pub read: bool,
}

impl MessageRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            content: row.get(3)?,
            send_time: row.get(4)?,
            read: row.get(5)?,
        })
    }

    pub fn into_message(self, ats: Vec<String>) -> Result<Message> {
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            send_time: from_micros(self.send_time)?,
            read: self.read,
            ats,
        })
    }
}

pub struct RelationRow {
    pub user_id: String,
    pub group_id: i64,
    pub read_time_stamp: i64,
    pub muted: bool,
    pub join_time: i64,
}

impl RelationRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            group_id: row.get(1)?,
            read_time_stamp: row.get(2)?,
            muted: row.get(3)?,
            join_time: row.get(4)?,
        })
    }

    pub fn into_relation(self) -> Result<UserGroupRelation> {
        Ok(UserGroupRelation {
            user_id: self.user_id,
            group_id: self.group_id,
            read_time_stamp: from_micros(self.read_time_stamp)?,
            muted: self.muted,
            join_time: from_micros(self.join_time)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;
    use parlor_types::CoreError;

    fn row(kind: &str) -> ConversationRow {
        ConversationRow {
            id: 7,
            kind: kind.to_string(),
            aes_key: "k".into(),
            created_at: 0,
            requester_id: Some("a".into()),
            target_id: Some("b".into()),
            group_name: None,
            group_image_path: None,
            owner_id: None,
            join_password: None,
        }
    }

    #[test]
    fn unknown_kind_is_an_integrity_fault() {
        let err = row("channel").into_conversation().unwrap_err();
        assert_eq!(
            CoreError::from(err),
            CoreError::UnsupportedConversationKind("channel".into())
        );
    }

    #[test]
    fn private_row_decodes() {
        let conv = row("private").into_conversation().unwrap();
        assert_eq!(conv.id(), 7);
        assert_eq!(conv.kind(), ConversationKind::Private);
    }

    #[test]
    fn micros_preserve_ordering() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(to_micros(earlier) < to_micros(later));
        assert_eq!(from_micros(to_micros(later)).unwrap(), later.trunc_subsecs(6));
    }
}
