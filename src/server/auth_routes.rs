use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::AppResult;
use crate::identity::{Carrier, Identity, RequestContext};
use crate::storage::Account;

#[derive(Debug, Deserialize)]
pub(super) struct RegisterPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProviderSignInPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    callback_url: Option<String>,
}

fn public_user(acc: &Account) -> serde_json::Value {
    json!({ "id": acc.id, "name": acc.name, "email": acc.email, "cardNumber": acc.card_number })
}

/// Only same-site relative targets; anything else lands on the dashboard.
fn safe_callback(url: Option<&str>) -> String {
    match url {
        Some(u) if u.starts_with('/') && !u.starts_with("//") => u.to_string(),
        _ => crate::identity::gate::HOME_PATH.to_string(),
    }
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<impl IntoResponse> {
    let acc = state.accounts.register(&payload.name, &payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": public_user(&acc) }))))
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> AppResult<impl IntoResponse> {
    let acc = state.accounts.authenticate(&payload.email, &payload.password).await?;
    let issued = state.sessions.issue(&Identity::from(&acc))?;
    let mut headers = HeaderMap::new();
    state.sessions.attach_to_response(&mut headers, Carrier::Cookie, &issued.token)?;
    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "success": true, "user": public_user(&acc), "token": issued.token })),
    ))
}

/// Clears both carriers; fine to call without a session.
pub(super) async fn logout(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut headers = HeaderMap::new();
    state.sessions.clear(&mut headers, Carrier::Cookie)?;
    state.sessions.clear(&mut headers, Carrier::Provider)?;
    Ok((StatusCode::OK, headers, Json(json!({ "success": true, "message": "Logged out successfully" }))))
}

pub(super) async fn provider_sign_in(
    State(state): State<AppState>,
    Json(payload): Json<ProviderSignInPayload>,
) -> AppResult<impl IntoResponse> {
    let issued = state.provider.sign_in(&payload.email, &payload.password).await?;
    let mut headers = HeaderMap::new();
    state.sessions.attach_to_response(&mut headers, Carrier::Provider, &issued.token)?;
    let url = safe_callback(payload.callback_url.as_deref());
    Ok((StatusCode::OK, headers, Json(json!({ "ok": true, "url": url }))))
}

/// Current session as seen by the provider flow, or `{}`.
pub(super) async fn session(State(state): State<AppState>, ctx: RequestContext) -> impl IntoResponse {
    match ctx.claims {
        Some(claims) => Json(json!(state.provider.session_callback(&claims))),
        None => Json(json!({})),
    }
}

pub(super) async fn provider_sign_out(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut headers = HeaderMap::new();
    state.sessions.clear(&mut headers, Carrier::Provider)?;
    Ok((StatusCode::OK, headers, Json(json!({ "url": "/login" }))))
}

#[cfg(test)]
mod tests {
    use super::safe_callback;

    #[test]
    fn callback_must_be_relative() {
        assert_eq!(safe_callback(Some("/documents")), "/documents");
        assert_eq!(safe_callback(Some("//evil.example")), "/dashboard");
        assert_eq!(safe_callback(Some("https://evil.example")), "/dashboard");
        assert_eq!(safe_callback(None), "/dashboard");
    }
}
