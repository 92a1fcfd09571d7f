use parlor_db::Database;
use parlor_types::models::UserProfile;

/// Where display names and avatars come from. Only used for rendering.
pub trait ProfileSource: Send + Sync {
    fn profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>>;
}

/// The database keeps a mirror of each user's profile, refreshed on sign-in.
impl ProfileSource for Database {
    fn profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        self.get_user(user_id)
    }
}
