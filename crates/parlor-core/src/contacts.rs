use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parlor_db::{Activity, Database};
use parlor_types::models::{
    ContactSummary, Conversation, ConversationKind, UserGroupRelation, UserId, UserProfile,
};
use tracing::{debug, warn};

use crate::mentions::MentionIndex;
use crate::profiles::ProfileSource;
use crate::{CoreError, Result};

/// Everything `to_contact_summary` looks at for one conversation.
pub struct SummaryInput<'a> {
    pub conversation: &'a Conversation,
    /// Newest message and the viewer's unread count.
    pub activity: &'a Activity,
    /// An unread message mentions the viewer. Ignored for private chats.
    pub mentioned: bool,
    /// The viewer's membership. Required for groups, ignored otherwise.
    pub relation: Option<&'a UserGroupRelation>,
    /// Profiles of the private peer and the latest sender, where known.
    pub profiles: &'a HashMap<UserId, UserProfile>,
}

/// Summarize one conversation as seen by `viewer_id`.
pub fn to_contact_summary(input: &SummaryInput<'_>, viewer_id: &str) -> Result<ContactSummary> {
    let latest = input.activity.latest.clone();
    let sender = latest
        .as_ref()
        .and_then(|m| input.profiles.get(&m.sender_id))
        .cloned();
    let unread_amount = u32::try_from(input.activity.unread).unwrap_or(u32::MAX);

    match input.conversation {
        Conversation::Private(private) => {
            let peer_id = private.peer_of(viewer_id);
            let (display_name, display_image_path, enable_invisible) = match input.profiles.get(peer_id) {
                Some(peer) => (peer.nick_name.clone(), peer.icon_file_path.clone(), peer.enable_invisible),
                None => {
                    warn!("No profile for {}, showing the raw id", peer_id);
                    (peer_id.to_string(), String::new(), false)
                }
            };

            Ok(ContactSummary {
                display_name,
                display_image_path,
                latest_message: latest,
                unread_amount,
                conversation_id: private.id,
                discriminator: ConversationKind::Private,
                user_id: peer_id.to_string(),
                aes_key: private.aes_key.clone(),
                muted: false,
                someone_at_me: false,
                enable_invisible,
                sender,
            })
        }
        Conversation::Group(group) => {
            let relation = input
                .relation
                .filter(|r| r.group_id == group.id && r.user_id == viewer_id)
                .ok_or_else(|| {
                    CoreError::not_found(format!("membership of {} in group {}", viewer_id, group.id))
                })?;

            Ok(ContactSummary {
                display_name: group.group_name.clone(),
                display_image_path: group.group_image_path.clone(),
                latest_message: latest,
                unread_amount,
                conversation_id: group.id,
                discriminator: ConversationKind::Group,
                user_id: group.owner_id.clone(),
                aes_key: group.aes_key.clone(),
                muted: relation.muted,
                someone_at_me: input.mentioned,
                enable_invisible: false,
                sender,
            })
        }
    }
}

/// Contact list order: mentions first, then most recent activity
/// (conversations without messages last), then conversation id.
pub fn compare_contacts(a: &ContactSummary, b: &ContactSummary) -> Ordering {
    b.someone_at_me
        .cmp(&a.someone_at_me)
        .then_with(|| b.latest_send_time().cmp(&a.latest_send_time()))
        .then_with(|| a.conversation_id.cmp(&b.conversation_id))
}

pub fn sort_contacts(contacts: &mut [ContactSummary]) {
    contacts.sort_by(compare_contacts);
}

/// Builds the per-viewer contact list on demand.
#[derive(Clone)]
pub struct ContactViewBuilder {
    db: Arc<Database>,
    profiles: Arc<dyn ProfileSource>,
    mentions: MentionIndex,
}

impl ContactViewBuilder {
    pub fn new(db: Arc<Database>, profiles: Arc<dyn ProfileSource>, mentions: MentionIndex) -> Self {
        Self { db, profiles, mentions }
    }

    pub fn compute_contacts(&self, viewer_id: &str) -> Result<Vec<ContactSummary>> {
        let conversations = self.db.conversations_for(viewer_id)?;
        let mut profiles: HashMap<UserId, UserProfile> = HashMap::new();
        let mut contacts = Vec::with_capacity(conversations.len());

        for conversation in &conversations {
            let (activity, mentioned, relation) = match conversation {
                Conversation::Private(private) => {
                    (self.db.private_activity(private.id, viewer_id)?, false, None)
                }
                Conversation::Group(group) => {
                    // Left between listing and now.
                    let Some(relation) = self.db.get_relation(viewer_id, group.id)? else {
                        debug!("{} is no longer in group {}, skipping", viewer_id, group.id);
                        continue;
                    };
                    let marker = relation.read_time_stamp;
                    let activity = self.db.group_activity(group.id, marker)?;
                    let mentioned = activity.unread > 0 && self.mentions.mentioned_since(group.id, viewer_id, marker)?;
                    (activity, mentioned, Some(relation))
                }
            };

            let mut wanted: Vec<&str> = Vec::with_capacity(2);
            if let Conversation::Private(private) = conversation {
                wanted.push(private.peer_of(viewer_id));
            }
            if let Some(latest) = &activity.latest {
                wanted.push(&latest.sender_id);
            }
            for user_id in wanted {
                if !profiles.contains_key(user_id) {
                    if let Some(profile) = self.profiles.profile(user_id)? {
                        profiles.insert(user_id.to_string(), profile);
                    }
                }
            }

            contacts.push(to_contact_summary(
                &SummaryInput {
                    conversation,
                    activity: &activity,
                    mentioned,
                    relation: relation.as_ref(),
                    profiles: &profiles,
                },
                viewer_id,
            )?);
        }

        sort_contacts(&mut contacts);
        debug!("Computed {} contacts for {}", contacts.len(), viewer_id);
        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use parlor_types::models::{GroupConversation, Message, PrivateConversation};

    fn msg(id: i64, conv: i64, sender: &str, at: DateTime<Utc>) -> Message {
        Message {
            id,
            conversation_id: conv,
            sender_id: sender.to_string(),
            content: format!("m{}", id),
            send_time: at,
            read: false,
            ats: vec![],
        }
    }

    fn activity(latest: Option<Message>, unread: u64) -> Activity {
        Activity { latest, unread }
    }

    fn profile(id: &str, nick: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            nick_name: nick.to_string(),
            icon_file_path: format!("{}.png", id),
            enable_invisible: id == "bob",
        }
    }

    fn private(id: i64) -> Conversation {
        Conversation::Private(PrivateConversation {
            id,
            requester_id: "alice".into(),
            target_id: "bob".into(),
            aes_key: "pk".into(),
            created_at: Utc::now(),
        })
    }

    fn group(id: i64) -> GroupConversation {
        GroupConversation {
            id,
            group_name: "crew".into(),
            group_image_path: "crew.png".into(),
            owner_id: "carol".into(),
            join_password: String::new(),
            aes_key: "gk".into(),
            created_at: Utc::now(),
        }
    }

    fn relation(group_id: i64, marker: DateTime<Utc>) -> UserGroupRelation {
        UserGroupRelation {
            user_id: "alice".into(),
            group_id,
            read_time_stamp: marker,
            muted: true,
            join_time: marker,
        }
    }

    fn summary(id: i64, at_me: bool, latest: Option<DateTime<Utc>>) -> ContactSummary {
        ContactSummary {
            display_name: String::new(),
            display_image_path: String::new(),
            latest_message: latest.map(|t| msg(id, id, "x", t)),
            unread_amount: 0,
            conversation_id: id,
            discriminator: ConversationKind::Group,
            user_id: String::new(),
            aes_key: String::new(),
            muted: false,
            someone_at_me: at_me,
            enable_invisible: false,
            sender: None,
        }
    }

    #[test]
    fn private_summary_shows_peer() {
        let conv = private(1);
        let latest = activity(Some(msg(3, 1, "alice", Utc::now())), 2);
        let profiles: HashMap<_, _> = [("bob".to_string(), profile("bob", "Bobby")), ("alice".to_string(), profile("alice", "Al"))]
            .into_iter()
            .collect();

        let input = SummaryInput { conversation: &conv, activity: &latest, mentioned: true, relation: None, profiles: &profiles };
        let s = to_contact_summary(&input, "alice").unwrap();

        assert_eq!(s.display_name, "Bobby");
        assert_eq!(s.display_image_path, "bob.png");
        assert_eq!(s.user_id, "bob");
        assert_eq!(s.unread_amount, 2);
        assert!(!s.someone_at_me, "mentions never flag private chats");
        assert!(!s.muted);
        assert!(s.enable_invisible);
        assert_eq!(s.latest_message.as_ref().unwrap().id, 3);
        assert_eq!(s.sender.as_ref().unwrap().nick_name, "Al");
        assert_eq!(s.discriminator, ConversationKind::Private);

        let s = to_contact_summary(&input, "bob").unwrap();
        assert_eq!(s.display_name, "Al");
    }

    #[test]
    fn missing_peer_profile_falls_back_to_id() {
        let conv = private(1);
        let profiles = HashMap::new();
        let empty = Activity::default();
        let input = SummaryInput { conversation: &conv, activity: &empty, mentioned: false, relation: None, profiles: &profiles };

        let s = to_contact_summary(&input, "alice").unwrap();
        assert_eq!(s.display_name, "bob");
        assert!(s.latest_message.is_none());
        assert_eq!(s.unread_amount, 0);
    }

    #[test]
    fn group_summary_carries_mute_and_mention() {
        let marker = Utc::now() - Duration::minutes(10);
        let conv = Conversation::Group(group(5));
        let rel = relation(5, marker);
        let latest = activity(Some(msg(3, 5, "dave", marker + Duration::minutes(2))), 2);
        let profiles = HashMap::new();

        let input = SummaryInput { conversation: &conv, activity: &latest, mentioned: true, relation: Some(&rel), profiles: &profiles };
        let s = to_contact_summary(&input, "alice").unwrap();
        assert_eq!(s.display_name, "crew");
        assert_eq!(s.user_id, "carol");
        assert_eq!(s.unread_amount, 2);
        assert!(s.someone_at_me);
        assert!(s.muted);
        assert!(s.sender.is_none());
    }

    #[test]
    fn unread_count_saturates() {
        let conv = Conversation::Group(group(5));
        let rel = relation(5, Utc::now());
        let huge = activity(None, u64::from(u32::MAX) + 7);
        let profiles = HashMap::new();
        let input = SummaryInput { conversation: &conv, activity: &huge, mentioned: false, relation: Some(&rel), profiles: &profiles };

        assert_eq!(to_contact_summary(&input, "alice").unwrap().unread_amount, u32::MAX);
    }

    #[test]
    fn group_summary_requires_viewer_relation() {
        let conv = Conversation::Group(group(5));
        let rel = relation(6, Utc::now());
        let profiles = HashMap::new();
        let empty = Activity::default();
        let input = SummaryInput { conversation: &conv, activity: &empty, mentioned: false, relation: Some(&rel), profiles: &profiles };

        assert!(matches!(to_contact_summary(&input, "alice"), Err(CoreError::NotFound(_))));
    }

    /// Removes alice from a group the first time a profile is looked up,
    /// i.e. after the conversations were listed.
    struct LeavesGroup {
        db: Arc<Database>,
        group_id: i64,
    }

    impl ProfileSource for LeavesGroup {
        fn profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
            self.db.delete_relation("alice", self.group_id)?;
            self.db.get_user(user_id)
        }
    }

    #[test]
    fn group_left_mid_listing_is_skipped() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (private, _) = db.insert_private_if_absent("alice", "bob", "k", Utc::now()).unwrap();
        let group = db.insert_group("g", "", "carol", "", "k", Utc::now()).unwrap();
        db.insert_relation_if_absent("alice", group.id, Utc::now()).unwrap();
        assert!(private.id < group.id);

        let builder = ContactViewBuilder::new(
            db.clone(),
            Arc::new(LeavesGroup { db: db.clone(), group_id: group.id }),
            MentionIndex::new(db),
        );
        let contacts = builder.compute_contacts("alice").unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].conversation_id, private.id);
    }

    #[test]
    fn mention_beats_recency() {
        let t1 = Utc::now() - Duration::hours(1);
        let t2 = Utc::now();
        let mut contacts = vec![summary(2, false, Some(t2)), summary(1, true, Some(t1))];
        sort_contacts(&mut contacts);
        assert_eq!(contacts[0].conversation_id, 1);
    }

    #[test]
    fn ordering_is_total_and_deterministic() {
        let t = Utc::now();
        let mut contacts = vec![
            summary(4, false, None),
            summary(3, false, Some(t)),
            summary(1, false, Some(t)),
            summary(2, false, Some(t + Duration::seconds(1))),
            summary(5, true, None),
        ];
        sort_contacts(&mut contacts);
        let ids: Vec<i64> = contacts.iter().map(|c| c.conversation_id).collect();
        assert_eq!(ids, vec![5, 2, 1, 3, 4]);

        contacts.reverse();
        sort_contacts(&mut contacts);
        let again: Vec<i64> = contacts.iter().map(|c| c.conversation_id).collect();
        assert_eq!(again, ids);
    }
}
