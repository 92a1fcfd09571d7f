use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlor_db::Database;
use parlor_types::models::Conversation;
use tracing::debug;

use crate::retry::retry_on_conflict;
use crate::{CoreError, Result};

/// Advances per-viewer read markers.
///
/// Private conversations track reads with a flag on each message; groups
/// keep one timestamp per member and derive unread-ness from it.
#[derive(Clone)]
pub struct ReadStateTracker {
    db: Arc<Database>,
}

impl ReadStateTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Mark `conversation` read for `viewer_id` and return the marker that
    /// was in effect before.
    pub fn set_last_read(&self, conversation: &Conversation, viewer_id: &str) -> Result<DateTime<Utc>> {
        self.set_last_read_at(conversation, viewer_id, Utc::now())
    }

    /// As `set_last_read`, with the new group marker given explicitly.
    ///
    /// Private: the previous marker is the send time of the newest message
    /// from the other party that was already read (`MIN_UTC` if none).
    /// Group: the previous marker is the member's stored read timestamp.
    pub fn set_last_read_at(
        &self,
        conversation: &Conversation,
        viewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let previous = retry_on_conflict("set_last_read", || match conversation {
            Conversation::Private(private) => Ok(self
                .db
                .mark_private_read(private.id, viewer_id)?
                .unwrap_or(DateTime::<Utc>::MIN_UTC)),
            Conversation::Group(group) => self
                .db
                .advance_read_marker(viewer_id, group.id, now)?
                .ok_or_else(|| {
                    CoreError::not_found(format!("membership of {} in group {}", viewer_id, group.id))
                }),
        })?;

        debug!(
            "{} read {} conversation {} (previous marker {})",
            viewer_id,
            conversation.kind(),
            conversation.id(),
            previous
        );
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parlor_db::models::{from_micros, to_micros};

    fn db() -> Arc<Database> {
        Arc::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn private_read_is_idempotent() {
        let db = db();
        let (conv, _) = db.insert_private_if_absent("alice", "bob", "k", Utc::now()).unwrap();
        let t0 = Utc::now() - Duration::minutes(3);
        let sent = db.insert_message(conv.id, "bob", "hi", t0, &[]).unwrap();
        db.insert_message(conv.id, "alice", "mine", t0 + Duration::minutes(1), &[]).unwrap();

        let tracker = ReadStateTracker::new(db.clone());
        let conv = Conversation::Private(conv);

        assert_eq!(tracker.set_last_read(&conv, "alice").unwrap(), DateTime::<Utc>::MIN_UTC);
        assert_eq!(tracker.set_last_read(&conv, "alice").unwrap(), sent.send_time);
        assert_eq!(tracker.set_last_read(&conv, "alice").unwrap(), sent.send_time);

        assert_eq!(db.private_activity(conv.id(), "alice").unwrap().unread, 0);
        // Alice's own message is still unread for bob.
        assert_eq!(db.private_activity(conv.id(), "bob").unwrap().unread, 1);
    }

    #[test]
    fn group_read_returns_old_marker_and_advances() {
        let db = db();
        let group = db.insert_group("g", "", "alice", "", "k", Utc::now()).unwrap();
        let joined = Utc::now() - Duration::hours(1);
        db.insert_relation_if_absent("alice", group.id, joined).unwrap();

        let tracker = ReadStateTracker::new(db.clone());
        let now = Utc::now();
        let conv = Conversation::Group(group.clone());

        let previous = tracker.set_last_read_at(&conv, "alice", now).unwrap();
        assert_eq!(previous, from_micros(to_micros(joined)).unwrap());

        let relation = db.get_relation("alice", group.id).unwrap().unwrap();
        assert_eq!(relation.read_time_stamp, from_micros(to_micros(now)).unwrap());
    }

    #[test]
    fn group_read_without_membership_is_not_found() {
        let db = db();
        let group = db.insert_group("g", "", "alice", "", "k", Utc::now()).unwrap();
        let tracker = ReadStateTracker::new(db);

        let err = tracker
            .set_last_read(&Conversation::Group(group), "mallory")
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
