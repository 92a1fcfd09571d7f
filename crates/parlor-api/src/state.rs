use std::sync::Arc;

use axum::http::StatusCode;
use parlor_core::service::ChatService;
use tracing::error;

use crate::error::status_for;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: ChatService,
    pub jwt_secret: String,
    /// Base URL clients connect to for their push channel.
    pub listen_address: String,
}

/// Run a blocking service call off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&ChatService) -> parlor_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(status_for)
}
