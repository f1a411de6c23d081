//! Unified application error model and mapping helpers.
//! Domain modules raise their own `thiserror` enums (`AuthError`, `DocumentError`,
//! `StoreError`, `BlobError`); handlers convert them into `AppError`, which knows
//! its HTTP status and how to render itself as a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::error;

use crate::storage::blob::BlobError;
use crate::storage::StoreError;

/// Message shown to callers for every internal failure. Details go to the log only.
pub const GENERIC_INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    ///
    /// Duplicate-email conflicts answer 400 like every other registration failure.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// True for failures whose message must not reach the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, AppError::Io { .. } | AppError::Internal { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = if self.is_internal() {
            error!(code = self.code_str(), "request failed: {}", self.message());
            GENERIC_INTERNAL_MESSAGE.to_string()
        } else {
            self.message().to_string()
        };
        let body = serde_json::json!({
            "success": false,
            "code": self.code_str(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: format!("{:#}", err) }
    }
}

/// Credential, password-policy and session failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Name cannot be more than 60 characters")]
    NameTooLong,
    #[error("Please provide a valid email address")]
    EmailInvalid,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("New passwords do not match")]
    Mismatch,
    #[error("Password must contain at least one letter and one number")]
    PasswordTooWeak,
    #[error("Current password is incorrect")]
    CurrentIncorrect,
    #[error("Email address cannot be changed")]
    EmailImmutable,
    #[error("Session token is invalid")]
    TokenInvalid,
    #[error("Session token has expired")]
    TokenExpired,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Account not found")]
    AccountNotFound,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingField(_) => "missing_field",
            AuthError::NameTooLong => "name_too_long",
            AuthError::EmailInvalid => "email_invalid",
            AuthError::PasswordTooShort => "password_too_short",
            AuthError::EmailTaken => "email_taken",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Mismatch => "password_mismatch",
            AuthError::PasswordTooWeak => "password_too_weak",
            AuthError::CurrentIncorrect => "current_password_incorrect",
            AuthError::EmailImmutable => "email_immutable",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::Unauthorized => "unauthorized",
            AuthError::AccountNotFound => "not_found",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let code = err.code().to_string();
        let message = err.to_string();
        match err {
            AuthError::EmailTaken => AppError::Conflict { code, message },
            // Session problems all look the same from outside: no identity.
            AuthError::InvalidCredentials
            | AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::Unauthorized => AppError::Auth { code, message },
            AuthError::AccountNotFound => AppError::NotFound { code, message },
            _ => AppError::UserInput { code, message },
        }
    }
}

/// Failures of the owner-scoped document accessor.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document not found")]
    NotFound,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("unknown document type: {0}")]
    InvalidDocumentType(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("storage reference does not belong to the caller")]
    ForeignStorageRef,
    #[error("file is empty")]
    EmptyFile,
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound => AppError::not_found("not_found", "Document not found"),
            DocumentError::MissingField(_) => AppError::user("missing_field".to_string(), err.to_string()),
            DocumentError::InvalidDocumentType(_) => AppError::user("invalid_document_type".to_string(), err.to_string()),
            DocumentError::UnsupportedFileType(_) => AppError::user("unsupported_file_type".to_string(), err.to_string()),
            DocumentError::ForeignStorageRef => AppError::user("invalid_storage_ref".to_string(), err.to_string()),
            DocumentError::EmptyFile => AppError::user("empty_file".to_string(), err.to_string()),
            DocumentError::Blob(b) => b.into(),
            DocumentError::Store(s) => s.into(),
        }
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::SizeExceeded { .. } => AppError::user("size_exceeded".to_string(), err.to_string()),
            // A metadata row whose blob vanished is reported like a missing document.
            BlobError::NotFound => AppError::not_found("not_found", "Document not found"),
            BlobError::InvalidRef(_) | BlobError::Io(_) => AppError::internal("blob_error".to_string(), err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken => AuthError::EmailTaken.into(),
            StoreError::CardNumberTaken | StoreError::Io(_) | StoreError::Serde(_) => {
                AppError::internal("store_error".to_string(), err.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
