use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlor_db::Database;
use parlor_types::models::{ConversationId, UserId};

use crate::Result;

/// Which users each message mentions. Rows are written together with the
/// message itself (`Database::insert_message`); this side only reads.
#[derive(Clone)]
pub struct MentionIndex {
    db: Arc<Database>,
}

impl MentionIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether any group message sent after `read_marker` mentions
    /// `user_id`. This is the contact list's "someone at me" flag.
    pub fn mentioned_since(
        &self,
        group_id: ConversationId,
        user_id: &str,
        read_marker: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.db.has_mention_after(group_id, user_id, read_marker)?)
    }
}

/// Trim, drop empties and de-duplicate mention targets, keeping first-seen
/// order.
pub fn normalize_targets(ats: &[UserId]) -> Vec<UserId> {
    let mut targets: Vec<UserId> = Vec::with_capacity(ats.len());
    for at in ats {
        let at = at.trim();
        if !at.is_empty() && !targets.iter().any(|t| t == at) {
            targets.push(at.to_string());
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn normalize_dedups_and_trims() {
        let raw = vec![
            "bob".to_string(),
            " bob ".to_string(),
            String::new(),
            "carol".to_string(),
        ];
        assert_eq!(normalize_targets(&raw), vec!["bob".to_string(), "carol".to_string()]);
    }

    #[test]
    fn only_mentions_after_the_marker_count() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let group = db.insert_group("g", "", "alice", "", "k", Utc::now()).unwrap();
        let sent = Utc::now() - Duration::minutes(1);
        db.insert_message(group.id, "alice", "hey @bob", sent, &["bob".to_string()])
            .unwrap();

        let index = MentionIndex::new(db);
        assert!(index.mentioned_since(group.id, "bob", sent - Duration::seconds(1)).unwrap());
        assert!(!index.mentioned_since(group.id, "bob", sent).unwrap());
        assert!(!index.mentioned_since(group.id, "alice", sent - Duration::seconds(1)).unwrap());
    }
}
