use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use parlor_types::api::{Claims, InitChannelResponse};

use crate::error::status_for;
use crate::state::AppState;

/// POST /channel/init. Hand the caller a live push channel, reusing the
/// stored one while it still validates.
pub async fn init_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let descriptor = state
        .service
        .init_channel(&claims.sub)
        .await
        .map_err(status_for)?;

    let server_path = format!(
        "{}/Listen/Channel?Id={}&Key={}",
        state.listen_address.trim_end_matches('/'),
        descriptor.channel_id,
        descriptor.connect_key
    );

    Ok(Json(InitChannelResponse {
        channel_id: descriptor.channel_id,
        connect_key: descriptor.connect_key,
        server_path,
    }))
}
