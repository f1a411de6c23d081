use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use super::AppState;
use crate::documents::{NewDocument, Upload};
use crate::error::{AppError, AppResult};
use crate::identity::CurrentIdentity;
use crate::storage::extension_for_mime;

pub(super) async fn list(State(state): State<AppState>, CurrentIdentity(me): CurrentIdentity) -> impl IntoResponse {
    let documents = state.documents.list(&me.account_id);
    Json(json!({ "success": true, "documents": documents }))
}

pub(super) async fn get_one(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let doc = state.documents.get(&me.account_id, &id)?;
    Ok(Json(json!({ "success": true, "document": doc })))
}

pub(super) async fn create(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
    Json(meta): Json<NewDocument>,
) -> AppResult<impl IntoResponse> {
    let doc = state.documents.create(&me.account_id, meta)?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "document": doc }))))
}

fn multipart_error(state: &AppState, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let limit = state.documents.max_upload_bytes();
        AppError::user("size_exceeded".to_string(), format!("File size exceeds the {} byte limit", limit))
    } else {
        AppError::user("invalid_multipart".to_string(), e.body_text())
    }
}

/// Accepts `2025-01-31` or a full RFC 3339 timestamp. Blank means none.
fn parse_expiry(raw: &str) -> AppResult<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| AppError::user("invalid_expiry_date".to_string(), format!("invalid expiry date: {}", raw)))
}

pub(super) async fn upload(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut upload = Upload::default();
    let mut saw_file = false;
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&state, e))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let declared = field.content_type().map(str::to_string);
                let guessed = field
                    .file_name()
                    .and_then(|f| f.rsplit_once('.'))
                    .map(|(_, ext)| ext.to_ascii_lowercase())
                    .and_then(|ext| match ext.as_str() {
                        "jpg" | "jpeg" => Some("image/jpeg"),
                        "png" => Some("image/png"),
                        "pdf" => Some("application/pdf"),
                        _ => None,
                    });
                upload.mime = match declared {
                    Some(m) if extension_for_mime(&m).is_some() => m,
                    Some(m) if m != "application/octet-stream" => m,
                    _ => guessed.unwrap_or("application/octet-stream").to_string(),
                };
                upload.bytes = field.bytes().await.map_err(|e| multipart_error(&state, e))?.to_vec();
                saw_file = true;
            }
            "documentName" => upload.document_name = field.text().await.map_err(|e| multipart_error(&state, e))?,
            "documentType" => upload.document_type = field.text().await.map_err(|e| multipart_error(&state, e))?,
            "expiryDate" => {
                let raw = field.text().await.map_err(|e| multipart_error(&state, e))?;
                upload.expiry_date = parse_expiry(&raw)?;
            }
            _ => {}
        }
    }
    if !saw_file {
        return Err(AppError::user("missing_field", "file is required"));
    }
    let doc = state.documents.upload(&me.account_id, upload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "document": doc }))))
}

pub(super) async fn file(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let (doc, bytes) = state.documents.open_file(&me.account_id, &id).await?;
    let content_type = HeaderValue::from_str(&doc.file_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let ext = extension_for_mime(&doc.file_type).unwrap_or("bin");
    let safe_name: String = doc
        .document_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}.{}\"", safe_name, ext))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));
    Ok(([(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)], bytes))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    CurrentIdentity(me): CurrentIdentity,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.documents.delete(&me.account_id, &id).await?;
    Ok(Json(json!({ "success": true, "message": "Document deleted successfully" })))
}
