use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use parlor_types::api::{AreFriendsResponse, Claims, FriendshipResponse};

use crate::state::{AppState, blocking};

/// POST /friends/{peer_id}
pub async fn add_friend(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let conversation = blocking(&state, move |service| service.add_friend(&claims.sub, &peer_id)).await?;
    Ok(Json(FriendshipResponse {
        conversation_id: conversation.id,
    }))
}

/// GET /friends/{peer_id}
pub async fn are_friends(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let are_friends = blocking(&state, move |service| service.are_friends(&claims.sub, &peer_id)).await?;
    Ok(Json(AreFriendsResponse { are_friends }))
}

/// DELETE /friends/{peer_id}. `conversation_id` is -1 when there was no
/// friendship to remove.
pub async fn remove_friend(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let conversation_id =
        blocking(&state, move |service| service.remove_friend(&claims.sub, &peer_id)).await?;
    Ok(Json(FriendshipResponse { conversation_id }))
}
