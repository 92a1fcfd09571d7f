use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConversationId, UserId};

// -- JWT Claims --

/// Claims of the bearer token issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

// -- Profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub nick_name: String,
    #[serde(default)]
    pub icon_file_path: String,
    #[serde(default)]
    pub enable_invisible: bool,
}

// -- Conversations --

#[derive(Debug, Serialize)]
pub struct OpenConversationResponse {
    pub conversation_id: ConversationId,
    pub previous_read_marker: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub at: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

fn default_history_limit() -> u32 {
    50
}

// -- Channel --

#[derive(Debug, Serialize)]
pub struct InitChannelResponse {
    pub channel_id: i64,
    pub connect_key: String,
    pub server_path: String,
}

// -- Friends --

#[derive(Debug, Serialize)]
pub struct FriendshipResponse {
    pub conversation_id: ConversationId,
}

#[derive(Debug, Serialize)]
pub struct AreFriendsResponse {
    pub are_friends: bool,
}

// -- Groups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub group_name: String,
    #[serde(default)]
    pub join_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinGroupRequest {
    #[serde(default)]
    pub join_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetMutedRequest {
    pub muted: bool,
}
