use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlor_crypto::keys::generate_content_key;
use parlor_db::Database;
use parlor_types::models::{Conversation, ConversationId, GroupConversation, UserGroupRelation};
use tracing::info;

use crate::retry::retry_on_conflict;
use crate::{CoreError, Result};

/// Groups and the per-member relations that carry read markers.
#[derive(Clone)]
pub struct GroupMembershipManager {
    db: Arc<Database>,
    default_image_path: String,
}

impl GroupMembershipManager {
    pub fn new(db: Arc<Database>, default_image_path: impl Into<String>) -> Self {
        Self {
            db,
            default_image_path: default_image_path.into(),
        }
    }

    /// Persist a new group owned by `creator_id`. An empty `join_password`
    /// leaves the group open. The creator's own membership is not created
    /// here; see `add_member`.
    pub fn create_group(&self, group_name: &str, creator_id: &str, join_password: &str) -> Result<GroupConversation> {
        let group = self.db.insert_group(
            group_name,
            &self.default_image_path,
            creator_id,
            join_password,
            &generate_content_key(),
            Utc::now(),
        )?;
        info!("{} created group {} ({})", creator_id, group.id, group.group_name);
        Ok(group)
    }

    /// Add `user_id` with its read marker at `since`. Existing memberships
    /// are returned unchanged.
    pub fn add_member(&self, user_id: &str, group_id: ConversationId, since: DateTime<Utc>) -> Result<UserGroupRelation> {
        let (relation, _) = retry_on_conflict("add_member", || {
            Ok(self.db.insert_relation_if_absent(user_id, group_id, since)?)
        })?;
        Ok(relation)
    }

    pub fn get_group(&self, group_id: ConversationId) -> Result<GroupConversation> {
        match self.db.get_conversation(group_id)? {
            Some(Conversation::Group(group)) => Ok(group),
            Some(Conversation::Private(_)) | None => Err(CoreError::not_found(format!("group {}", group_id))),
        }
    }

    /// Join with the group's password. Members re-joining get their
    /// existing relation back.
    pub fn join_group(&self, user_id: &str, group_id: ConversationId, join_password: &str) -> Result<UserGroupRelation> {
        let group = self.get_group(group_id)?;
        if let Some(existing) = self.db.get_relation(user_id, group_id)? {
            return Ok(existing);
        }
        if group.has_password() && group.join_password != join_password {
            return Err(CoreError::WrongJoinPassword);
        }

        let relation = self.add_member(user_id, group_id, Utc::now())?;
        info!("{} joined group {}", user_id, group_id);
        Ok(relation)
    }

    pub fn leave_group(&self, user_id: &str, group_id: ConversationId) -> Result<()> {
        if !self.db.delete_relation(user_id, group_id)? {
            return Err(CoreError::not_found(format!("membership of {} in group {}", user_id, group_id)));
        }
        info!("{} left group {}", user_id, group_id);
        Ok(())
    }

    pub fn set_muted(&self, user_id: &str, group_id: ConversationId, muted: bool) -> Result<()> {
        if !self.db.set_relation_muted(user_id, group_id, muted)? {
            return Err(CoreError::not_found(format!("membership of {} in group {}", user_id, group_id)));
        }
        Ok(())
    }

    pub fn relation(&self, user_id: &str, group_id: ConversationId) -> Result<Option<UserGroupRelation>> {
        Ok(self.db.get_relation(user_id, group_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> GroupMembershipManager {
        let db = Arc::new(Database::open_in_memory().unwrap());
        GroupMembershipManager::new(db, "images/group.png")
    }

    #[test]
    fn create_group_sets_owner_key_and_image() {
        let groups = manager();
        let group = groups.create_group("crew", "alice", "").unwrap();

        assert_eq!(group.owner_id, "alice");
        assert_eq!(group.group_image_path, "images/group.png");
        assert!(!group.has_password());
        assert_eq!(group.aes_key.len(), 32);
        // Creating does not make the creator a member.
        assert!(groups.relation("alice", group.id).unwrap().is_none());
    }

    #[test]
    fn password_gates_joining() {
        let groups = manager();
        let group = groups.create_group("locked", "alice", "hunter2").unwrap();

        assert_eq!(groups.join_group("bob", group.id, "nope"), Err(CoreError::WrongJoinPassword));
        let relation = groups.join_group("bob", group.id, "hunter2").unwrap();
        assert!(!relation.muted);
        assert_eq!(relation.read_time_stamp, relation.join_time);
    }

    #[test]
    fn open_group_accepts_anyone_once() {
        let groups = manager();
        let group = groups.create_group("open", "alice", "").unwrap();

        let first = groups.join_group("bob", group.id, "whatever").unwrap();
        let again = groups.join_group("bob", group.id, "").unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn leave_and_mute_require_membership() {
        let groups = manager();
        let group = groups.create_group("g", "alice", "").unwrap();
        groups.join_group("bob", group.id, "").unwrap();

        groups.set_muted("bob", group.id, true).unwrap();
        assert!(groups.relation("bob", group.id).unwrap().unwrap().muted);

        groups.leave_group("bob", group.id).unwrap();
        assert!(matches!(groups.leave_group("bob", group.id), Err(CoreError::NotFound(_))));
        assert!(matches!(groups.set_muted("bob", group.id, false), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn joining_a_private_conversation_is_not_found() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (private, _) = db.insert_private_if_absent("a", "b", "k", Utc::now()).unwrap();
        let groups = GroupMembershipManager::new(db, "");
        assert!(matches!(groups.join_group("c", private.id, ""), Err(CoreError::NotFound(_))));
    }
}
