use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use parlor_types::api::{Claims, UpdateProfileRequest};
use parlor_types::models::UserProfile;

use crate::state::{AppState, blocking};

/// PUT /me, called after the identity provider signs a user in. Refreshes
/// the profile mirror and returns the user's personal conversation.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.nick_name.trim().is_empty() || req.nick_name.len() > 64 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let profile = UserProfile {
        id: claims.sub,
        nick_name: req.nick_name,
        icon_file_path: req.icon_file_path,
        enable_invisible: req.enable_invisible,
    };
    let personal = blocking(&state, move |service| service.sign_in(&profile)).await?;

    Ok(Json(personal))
}
