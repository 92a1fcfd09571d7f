use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use parlor_types::api::{Claims, HistoryQuery, OpenConversationResponse, SendMessageRequest};
use parlor_types::models::ConversationId;

use crate::state::{AppState, blocking};

/// GET /contacts
pub async fn get_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let contacts = blocking(&state, move |service| service.get_contacts(&claims.sub)).await?;
    Ok(Json(contacts))
}

/// POST /conversations/{id}/open
pub async fn open_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let previous_read_marker = blocking(&state, move |service| {
        service.open_conversation(&claims.sub, conversation_id)
    })
    .await?;

    Ok(Json(OpenConversationResponse {
        conversation_id,
        previous_read_marker,
    }))
}

/// GET /conversations/{id}/messages?limit=N, newest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Query(query): Query<HistoryQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let messages = blocking(&state, move |service| {
        service.get_messages(&claims.sub, conversation_id, query.limit)
    })
    .await?;

    Ok(Json(messages))
}

/// POST /conversations/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let message = blocking(&state, move |service| {
        service.post_message(&claims.sub, conversation_id, &req.content, &req.at)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
