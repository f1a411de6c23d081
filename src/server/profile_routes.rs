use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::accounts::ProfileUpdate;
use crate::error::AppResult;
use crate::identity::CurrentIdentity;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProfilePayload {
    #[serde(default)]
    name: String,
    phone: Option<String>,
    profile_image: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PasswordPayload {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
    #[serde(default)]
    confirm_password: String,
}

pub(super) async fn get_profile(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
) -> AppResult<impl IntoResponse> {
    let acc = state.accounts.get_profile(&me.account_id)?;
    Ok(Json(json!({ "success": true, "user": acc })))
}

pub(super) async fn update_profile(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
    Json(p): Json<ProfilePayload>,
) -> AppResult<impl IntoResponse> {
    let update = ProfileUpdate { name: p.name, phone: p.phone, profile_image: p.profile_image, email: p.email };
    let acc = state.accounts.update_profile(&me.account_id, update)?;
    Ok(Json(json!({ "success": true, "message": "Profile updated successfully", "user": acc })))
}

pub(super) async fn change_password(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
    Json(p): Json<PasswordPayload>,
) -> AppResult<impl IntoResponse> {
    state
        .accounts
        .change_password(&me.account_id, &p.current_password, &p.new_password, &p.confirm_password)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Password updated successfully" })))
}
