use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use parlor_types::api::{Claims, CreateGroupRequest, JoinGroupRequest, SetMutedRequest};
use parlor_types::models::ConversationId;

use crate::state::{AppState, blocking};

/// POST /groups
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = req.group_name.trim().to_string();
    if name.is_empty() || name.len() > 64 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let group = blocking(&state, move |service| {
        service.create_group(&name, &claims.sub, &req.join_password)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(group)))
}

/// POST /groups/{id}/join
pub async fn join_group(
    State(state): State<AppState>,
    Path(group_id): Path<ConversationId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let relation = blocking(&state, move |service| {
        service.join_group(&claims.sub, group_id, &req.join_password)
    })
    .await?;

    Ok(Json(relation))
}

/// DELETE /groups/{id}/membership
pub async fn leave_group(
    State(state): State<AppState>,
    Path(group_id): Path<ConversationId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, move |service| service.leave_group(&claims.sub, group_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /groups/{id}/mute
pub async fn set_muted(
    State(state): State<AppState>,
    Path(group_id): Path<ConversationId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetMutedRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, move |service| service.set_muted(&claims.sub, group_id, req.muted)).await?;
    Ok(StatusCode::NO_CONTENT)
}
