use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parlor_db::Database;
use parlor_types::models::{
    ChannelDescriptor, ContactSummary, Conversation, ConversationId, GroupConversation, Message,
    NO_CONVERSATION, PrivateConversation, UserGroupRelation, UserId, UserProfile,
};
use tracing::{debug, error};

use crate::channels::{ChannelAllocator, ChannelProvider};
use crate::contacts::ContactViewBuilder;
use crate::friendship::FriendshipManager;
use crate::groups::GroupMembershipManager;
use crate::mentions::{MentionIndex, normalize_targets};
use crate::read_state::ReadStateTracker;
use crate::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Image every new group starts with.
    pub group_image_path: String,
    /// Upper bound on each push-channel provider call.
    pub provider_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            group_image_path: String::new(),
            provider_timeout: Duration::from_secs(5),
        }
    }
}

/// Operations exposed to the transport layer.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
    read_state: ReadStateTracker,
    contacts: ContactViewBuilder,
    friends: FriendshipManager,
    groups: GroupMembershipManager,
    channels: ChannelAllocator,
}

/// Most messages a single history page returns.
pub const MAX_HISTORY_PAGE: u32 = 100;

impl ChatService {
    pub fn new(db: Arc<Database>, provider: Arc<dyn ChannelProvider>, config: ServiceConfig) -> Self {
        Self {
            read_state: ReadStateTracker::new(db.clone()),
            contacts: ContactViewBuilder::new(db.clone(), db.clone(), MentionIndex::new(db.clone())),
            friends: FriendshipManager::new(db.clone()),
            groups: GroupMembershipManager::new(db.clone(), config.group_image_path),
            channels: ChannelAllocator::new(db.clone(), provider, config.provider_timeout),
            db,
        }
    }

    /// Refresh the user's profile mirror after sign-in and make sure their
    /// personal conversation exists.
    pub fn sign_in(&self, profile: &UserProfile) -> Result<PrivateConversation> {
        self.db.upsert_user(profile)?;
        self.friends.ensure_personal_conversation(&profile.id)
    }

    pub fn get_contacts(&self, viewer_id: &str) -> Result<Vec<ContactSummary>> {
        self.contacts.compute_contacts(viewer_id).map_err(report)
    }

    /// Mark a conversation read for `viewer_id` and return the previous
    /// read marker.
    pub fn open_conversation(&self, viewer_id: &str, conversation_id: ConversationId) -> Result<DateTime<Utc>> {
        let conversation = self.participating(viewer_id, conversation_id)?;
        self.read_state
            .set_last_read(&conversation, viewer_id)
            .map_err(report)
    }

    /// Newest-first page of history, at most `MAX_HISTORY_PAGE` messages.
    /// Reading does not move the viewer's read marker.
    pub fn get_messages(&self, viewer_id: &str, conversation_id: ConversationId, limit: u32) -> Result<Vec<Message>> {
        self.participating(viewer_id, conversation_id)?;
        let limit = limit.clamp(1, MAX_HISTORY_PAGE);
        Ok(self.db.get_messages(conversation_id, limit)?)
    }

    /// Append a message from `sender_id`, recording who it mentions.
    pub fn post_message(
        &self,
        sender_id: &str,
        conversation_id: ConversationId,
        content: &str,
        ats: &[UserId],
    ) -> Result<Message> {
        self.participating(sender_id, conversation_id)?;
        let targets = normalize_targets(ats);
        let message = self
            .db
            .insert_message(conversation_id, sender_id, content, Utc::now(), &targets)?;
        debug!(
            "{} posted message {} to conversation {} mentioning {:?}",
            sender_id, message.id, conversation_id, message.ats
        );
        Ok(message)
    }

    pub async fn init_channel(&self, user_id: &str) -> Result<ChannelDescriptor> {
        self.channels.init(user_id).await
    }

    pub fn add_friend(&self, user_id: &str, peer_id: &str) -> Result<PrivateConversation> {
        self.require_user(peer_id)?;
        self.friends.add_friend(user_id, peer_id)
    }

    pub fn are_friends(&self, user_id: &str, peer_id: &str) -> Result<bool> {
        self.friends.are_friends(user_id, peer_id)
    }

    /// Id of the removed conversation, or `NO_CONVERSATION`.
    pub fn remove_friend(&self, user_id: &str, peer_id: &str) -> Result<ConversationId> {
        Ok(self
            .friends
            .remove_friend(user_id, peer_id)?
            .unwrap_or(NO_CONVERSATION))
    }

    /// Create a group and make the creator its first member, with a read
    /// marker at the group's creation time.
    pub fn create_group(&self, group_name: &str, creator_id: &str, join_password: &str) -> Result<GroupConversation> {
        let group = self.groups.create_group(group_name, creator_id, join_password)?;
        self.groups.add_member(creator_id, group.id, group.created_at)?;
        Ok(group)
    }

    pub fn join_group(&self, user_id: &str, group_id: ConversationId, join_password: &str) -> Result<UserGroupRelation> {
        self.groups.join_group(user_id, group_id, join_password)
    }

    pub fn leave_group(&self, user_id: &str, group_id: ConversationId) -> Result<()> {
        self.groups.leave_group(user_id, group_id)
    }

    pub fn set_muted(&self, user_id: &str, group_id: ConversationId, muted: bool) -> Result<()> {
        self.groups.set_muted(user_id, group_id, muted)
    }

    fn require_user(&self, user_id: &str) -> Result<UserProfile> {
        self.db
            .get_user(user_id)?
            .ok_or_else(|| CoreError::not_found(format!("user {}", user_id)))
    }

    /// Load a conversation `user_id` takes part in. Conversations the user
    /// is not part of are reported as not found.
    fn participating(&self, user_id: &str, conversation_id: ConversationId) -> Result<Conversation> {
        let conversation = self
            .db
            .get_conversation(conversation_id)
            .map_err(|e| report(e.into()))?
            .ok_or_else(|| CoreError::not_found(format!("conversation {}", conversation_id)))?;

        let member = match &conversation {
            Conversation::Private(private) => private.has_participant(user_id),
            Conversation::Group(group) => self.groups.relation(user_id, group.id)?.is_some(),
        };
        if !member {
            return Err(CoreError::not_found(format!("conversation {}", conversation_id)));
        }
        Ok(conversation)
    }
}

/// Integrity faults are never expected; make them loud on the way out.
fn report(err: CoreError) -> CoreError {
    if let CoreError::UnsupportedConversationKind(kind) = &err {
        error!("Stored conversation has unsupported kind '{}'; data is corrupt", kind);
    }
    err
}
