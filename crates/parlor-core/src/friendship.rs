use std::sync::Arc;

use chrono::Utc;
use parlor_crypto::keys::generate_content_key;
use parlor_db::Database;
use parlor_types::models::{ConversationId, PrivateConversation};
use tracing::info;

use crate::Result;
use crate::retry::retry_on_conflict;

/// One-to-one relationships. A friendship is exactly the existence of a
/// private conversation for the unordered pair.
#[derive(Clone)]
pub struct FriendshipManager {
    db: Arc<Database>,
}

impl FriendshipManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create the pair's conversation, or return the existing one. `a == b`
    /// is allowed and yields the user's personal conversation.
    pub fn add_friend(&self, a: &str, b: &str) -> Result<PrivateConversation> {
        let (conversation, created) = retry_on_conflict("add_friend", || {
            Ok(self
                .db
                .insert_private_if_absent(a, b, &generate_content_key(), Utc::now())?)
        })?;

        if created {
            info!("Created private conversation {} between {} and {}", conversation.id, a, b);
        }
        Ok(conversation)
    }

    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        Ok(self.db.find_private(a, b)?.is_some())
    }

    /// Delete the pair's conversation in either ordering. `None` when there
    /// was nothing to delete.
    pub fn remove_friend(&self, a: &str, b: &str) -> Result<Option<ConversationId>> {
        let removed = retry_on_conflict("remove_friend", || Ok(self.db.delete_private(a, b)?))?;
        if let Some(id) = removed {
            info!("Removed private conversation {} between {} and {}", id, a, b);
        }
        Ok(removed)
    }

    /// The self-pair conversation every signed-in user gets.
    pub fn ensure_personal_conversation(&self, user_id: &str) -> Result<PrivateConversation> {
        self.add_friend(user_id, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (Arc<Database>, FriendshipManager) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (db.clone(), FriendshipManager::new(db))
    }

    #[test]
    fn add_friend_twice_creates_one_conversation() {
        let (db, friends) = manager();
        let first = friends.add_friend("alice", "bob").unwrap();
        let second = friends.add_friend("bob", "alice").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.aes_key.len(), 32);
        assert_eq!(db.conversations_for("alice").unwrap().len(), 1);
    }

    #[test]
    fn friendship_is_symmetric() {
        let (_, friends) = manager();
        assert!(!friends.are_friends("alice", "bob").unwrap());
        friends.add_friend("alice", "bob").unwrap();
        assert!(friends.are_friends("alice", "bob").unwrap());
        assert!(friends.are_friends("bob", "alice").unwrap());
    }

    #[test]
    fn remove_missing_pair_changes_nothing() {
        let (db, friends) = manager();
        friends.add_friend("alice", "carol").unwrap();

        assert_eq!(friends.remove_friend("alice", "bob").unwrap(), None);
        assert_eq!(db.conversations_for("alice").unwrap().len(), 1);
    }

    #[test]
    fn remove_either_ordering() {
        let (_, friends) = manager();
        let conv = friends.add_friend("alice", "bob").unwrap();
        assert_eq!(friends.remove_friend("bob", "alice").unwrap(), Some(conv.id));
        assert!(!friends.are_friends("alice", "bob").unwrap());
    }

    #[test]
    fn personal_conversation_is_a_self_pair() {
        let (_, friends) = manager();
        let own = friends.ensure_personal_conversation("alice").unwrap();
        assert_eq!(own.requester_id, "alice");
        assert_eq!(own.target_id, "alice");
        assert_eq!(own.peer_of("alice"), "alice");
        assert!(friends.are_friends("alice", "alice").unwrap());
        assert_eq!(friends.ensure_personal_conversation("alice").unwrap().id, own.id);
    }
}
