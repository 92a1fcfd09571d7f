use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parlor_core::channels::ChannelProvider;
use parlor_types::models::ChannelDescriptor;
use serde::Deserialize;
use tracing::debug;

/// Remote push service speaking the Stargate channel API.
pub struct StargateClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChannelResponse {
    code: i32,
    #[serde(default)]
    message: String,
    channel_id: i64,
    connect_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateChannelResponse {
    code: i32,
}

/// Stargate reports success as code 0.
const SUCCESS: i32 = 0;

impl StargateClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl ChannelProvider for StargateClient {
    async fn allocate(&self, user_id: &str) -> Result<ChannelDescriptor> {
        let url = format!("{}/Channel/CreateChannel", self.base_url);
        let description = format!("Parlor user channel for {}", user_id);
        let resp: CreateChannelResponse = self
            .http
            .post(&url)
            .form(&[
                ("AccessToken", self.access_token.as_str()),
                ("Description", description.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.code != SUCCESS {
            return Err(anyhow!("CreateChannel failed with code {}: {}", resp.code, resp.message));
        }
        debug!("Stargate allocated channel {} for {}", resp.channel_id, user_id);
        Ok(ChannelDescriptor {
            channel_id: resp.channel_id,
            connect_key: resp.connect_key,
        })
    }

    async fn validate(&self, descriptor: &ChannelDescriptor) -> Result<bool> {
        let url = format!("{}/Channel/ValidateChannel", self.base_url);
        let resp: ValidateChannelResponse = self
            .http
            .get(&url)
            .query(&[
                ("Id", descriptor.channel_id.to_string()),
                ("Key", descriptor.connect_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.code == SUCCESS)
    }
}
