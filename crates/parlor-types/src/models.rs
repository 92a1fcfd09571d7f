use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identity key handed out by the external identity provider.
pub type UserId = String;
pub type ConversationId = i64;
pub type MessageId = i64;

/// Returned by friend removal when no conversation exists for the pair.
pub const NO_CONVERSATION: ConversationId = -1;

/// Stored in place of a channel id when a user owns no descriptor.
pub const NO_CHANNEL: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub nick_name: String,
    pub icon_file_path: String,
    pub enable_invisible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationKind {
    #[serde(rename = "PrivateConversation")]
    Private,
    #[serde(rename = "GroupConversation")]
    Group,
}

impl ConversationKind {
    /// Value of the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "group" => Ok(Self::Group),
            other => Err(CoreError::UnsupportedConversationKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateConversation {
    pub id: ConversationId,
    pub requester_id: UserId,
    pub target_id: UserId,
    pub aes_key: String,
    pub created_at: DateTime<Utc>,
}

impl PrivateConversation {
    /// The participant that is not `viewer_id`. For a self-conversation
    /// this is the viewer.
    pub fn peer_of(&self, viewer_id: &str) -> &str {
        if self.requester_id == viewer_id {
            &self.target_id
        } else {
            &self.requester_id
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.requester_id == user_id || self.target_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConversation {
    pub id: ConversationId,
    pub group_name: String,
    pub group_image_path: String,
    pub owner_id: UserId,
    /// Empty means anyone may join.
    #[serde(skip_serializing, default)]
    pub join_password: String,
    pub aes_key: String,
    pub created_at: DateTime<Utc>,
}

impl GroupConversation {
    pub fn has_password(&self) -> bool {
        !self.join_password.is_empty()
    }
}

/// A conversation is exactly one of these two variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "discriminator", content = "data")]
pub enum Conversation {
    #[serde(rename = "PrivateConversation")]
    Private(PrivateConversation),
    #[serde(rename = "GroupConversation")]
    Group(GroupConversation),
}

impl Conversation {
    pub fn id(&self) -> ConversationId {
        match self {
            Self::Private(p) => p.id,
            Self::Group(g) => g.id,
        }
    }

    pub fn kind(&self) -> ConversationKind {
        match self {
            Self::Private(_) => ConversationKind::Private,
            Self::Group(_) => ConversationKind::Group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub send_time: DateTime<Utc>,
    /// Only meaningful for private conversations; only ever goes false -> true.
    pub read: bool,
    /// Users mentioned by this message.
    pub ats: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupRelation {
    pub user_id: UserId,
    pub group_id: ConversationId,
    pub read_time_stamp: DateTime<Utc>,
    pub muted: bool,
    pub join_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub channel_id: i64,
    pub connect_key: String,
}

/// Per-viewer, per-conversation aggregate rendered in the contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub display_name: String,
    pub display_image_path: String,
    pub latest_message: Option<Message>,
    pub unread_amount: u32,
    pub conversation_id: ConversationId,
    pub discriminator: ConversationKind,
    /// Peer for private conversations, owner for groups.
    pub user_id: UserId,
    pub aes_key: String,
    pub muted: bool,
    pub someone_at_me: bool,
    #[serde(skip)]
    pub enable_invisible: bool,
    #[serde(skip)]
    pub sender: Option<UserProfile>,
}

impl ContactSummary {
    pub fn latest_send_time(&self) -> Option<DateTime<Utc>> {
        self.latest_message.as_ref().map(|m| m.send_time)
    }
}
