use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parlor_db::Database;
use parlor_db::users::StoredChannel;
use parlor_types::models::ChannelDescriptor;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::retry::MAX_CONFLICT_RETRIES;
use crate::{CoreError, Result};

/// The push service that owns live channels. Both calls go over the network
/// and may fail or hang.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Open a new channel labelled for `user_id`.
    async fn allocate(&self, user_id: &str) -> anyhow::Result<ChannelDescriptor>;

    /// Whether `descriptor` still identifies a live channel.
    async fn validate(&self, descriptor: &ChannelDescriptor) -> anyhow::Result<bool>;
}

struct LocalChannel {
    connect_key: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process channel provider, used when no remote push service is
/// configured.
pub struct LocalChannelProvider {
    next_id: AtomicI64,
    lifetime: Option<chrono::Duration>,
    channels: RwLock<HashMap<i64, LocalChannel>>,
}

impl LocalChannelProvider {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            lifetime: None,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Channels stop validating `lifetime` after allocation.
    pub fn with_lifetime(lifetime: chrono::Duration) -> Self {
        Self {
            lifetime: Some(lifetime),
            ..Self::new()
        }
    }

    /// Drop a channel as if the push service had expired it.
    pub async fn expire(&self, channel_id: i64) {
        self.channels.write().await.remove(&channel_id);
    }

    #[cfg(test)]
    pub async fn allocated(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for LocalChannelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelProvider for LocalChannelProvider {
    async fn allocate(&self, _user_id: &str) -> anyhow::Result<ChannelDescriptor> {
        let channel_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let connect_key = Uuid::new_v4().simple().to_string();
        let expires_at = self.lifetime.map(|l| Utc::now() + l);

        self.channels.write().await.insert(
            channel_id,
            LocalChannel {
                connect_key: connect_key.clone(),
                expires_at,
            },
        );
        Ok(ChannelDescriptor {
            channel_id,
            connect_key,
        })
    }

    async fn validate(&self, descriptor: &ChannelDescriptor) -> anyhow::Result<bool> {
        let channels = self.channels.read().await;
        Ok(channels.get(&descriptor.channel_id).is_some_and(|c| {
            c.connect_key == descriptor.connect_key && c.expires_at.is_none_or(|at| Utc::now() < at)
        }))
    }
}

/// Keeps each user's stored channel descriptor pointing at a live channel.
#[derive(Clone)]
pub struct ChannelAllocator {
    db: Arc<Database>,
    provider: Arc<dyn ChannelProvider>,
    provider_timeout: Duration,
}

impl ChannelAllocator {
    pub fn new(db: Arc<Database>, provider: Arc<dyn ChannelProvider>, provider_timeout: Duration) -> Self {
        Self {
            db,
            provider,
            provider_timeout,
        }
    }

    /// Return the user's descriptor if it still validates, otherwise
    /// allocate a replacement and store it.
    ///
    /// The store is updated with a compare-and-swap on the descriptor's
    /// version. A caller that loses the swap starts over and ends up with
    /// the winner's descriptor, so racing devices agree on one channel.
    pub async fn init(&self, user_id: &str) -> Result<ChannelDescriptor> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let stored = self.load(user_id).await?;

            if let Some(current) = &stored.descriptor {
                if self.validate(current).await {
                    return Ok(current.clone());
                }
                info!("Channel {} of {} is no longer valid", current.channel_id, user_id);
            }

            let fresh = self.allocate(user_id).await?;
            if self.swap(user_id, stored.version, &fresh).await? {
                info!("Assigned channel {} to {}", fresh.channel_id, user_id);
                return Ok(fresh);
            }
            warn!(
                "Channel {} for {} lost the swap (attempt {}), re-reading",
                fresh.channel_id, user_id, attempt
            );
        }

        Err(CoreError::ConcurrentModification)
    }

    async fn load(&self, user_id: &str) -> Result<StoredChannel> {
        let user = user_id.to_string();
        self.blocking(move |db| db.get_channel(&user))
            .await?
            .ok_or_else(|| CoreError::not_found(format!("user {}", user_id)))
    }

    async fn swap(&self, user_id: &str, expected_version: i64, descriptor: &ChannelDescriptor) -> Result<bool> {
        let user = user_id.to_string();
        let descriptor = descriptor.clone();
        self.blocking(move |db| db.swap_channel(&user, expected_version, &descriptor))
            .await
    }

    /// Run store work on the blocking pool; the connection mutex and
    /// SQLite's busy wait must not hold up a runtime worker.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| CoreError::Storage(format!("channel store task failed: {}", e)))?
            .map_err(CoreError::from)
    }

    /// Failures and timeouts count as "not valid"; the caller reallocates.
    async fn validate(&self, descriptor: &ChannelDescriptor) -> bool {
        match timeout(self.provider_timeout, self.provider.validate(descriptor)).await {
            Ok(Ok(valid)) => valid,
            Ok(Err(e)) => {
                warn!("Validating channel {} failed: {:#}", descriptor.channel_id, e);
                false
            }
            Err(_) => {
                warn!(
                    "Validating channel {} timed out after {:?}",
                    descriptor.channel_id, self.provider_timeout
                );
                false
            }
        }
    }

    async fn allocate(&self, user_id: &str) -> Result<ChannelDescriptor> {
        match timeout(self.provider_timeout, self.provider.allocate(user_id)).await {
            Ok(Ok(descriptor)) => Ok(descriptor),
            Ok(Err(e)) => Err(CoreError::ChannelUnavailable(format!("{:#}", e))),
            Err(_) => Err(CoreError::ChannelUnavailable(format!(
                "allocation timed out after {:?}",
                self.provider_timeout
            ))),
        }
    }
}
