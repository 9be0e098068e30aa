// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Two layers:
//! - [`SyncError`] is the domain taxonomy returned by the token manager,
//!   the directory adapter and the reconciler. Sync failures are recorded
//!   on the entity and handed back as data, so most of these never reach
//!   an HTTP response directly.
//! - [`AppError`] is what handlers return; it renders a JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Failure taxonomy of the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Principal never authorized, or was disconnected.
    #[error("Google account not linked")]
    NoCredential,

    /// Refresh token invalid or revoked; terminal until re-authorization.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Transient network or provider failure.
    #[error("Google API error: {0}")]
    RemoteApi(String),

    /// The remote object changed since its etag was read.
    #[error("Remote contact was modified concurrently")]
    RemotePreconditionFailed,

    /// The remote object no longer exists.
    #[error("Remote contact not found: {0}")]
    RemoteNotFound(String),

    /// Entity opted out of sync.
    #[error("Sync is disabled for this record")]
    SyncDisabled,

    /// Local record cannot be turned into a remote representation.
    #[error("Invalid record: {0}")]
    Validation(String),

    /// Entity unknown, or not owned by the caller.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local store failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Stable, serializable code for a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SyncErrorKind {
    NoCredential,
    RefreshFailed,
    RemoteApi,
    RemotePreconditionFailed,
    RemoteNotFound,
    SyncDisabled,
    Validation,
    NotFound,
    Storage,
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::NoCredential => SyncErrorKind::NoCredential,
            SyncError::RefreshFailed(_) => SyncErrorKind::RefreshFailed,
            SyncError::RemoteApi(_) => SyncErrorKind::RemoteApi,
            SyncError::RemotePreconditionFailed => SyncErrorKind::RemotePreconditionFailed,
            SyncError::RemoteNotFound(_) => SyncErrorKind::RemoteNotFound,
            SyncError::SyncDisabled => SyncErrorKind::SyncDisabled,
            SyncError::Validation(_) => SyncErrorKind::Validation,
            SyncError::NotFound(_) => SyncErrorKind::NotFound,
            SyncError::Storage(_) => SyncErrorKind::Storage,
        }
    }

    /// Message suitable for showing to the user next to the record.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NoCredential => "Google account not linked".to_string(),
            SyncError::RefreshFailed(_) => "Authorization expired, please reconnect".to_string(),
            SyncError::RemotePreconditionFailed => {
                "Contact was changed in Google since it was last read, please retry".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether a caller-triggered retry can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteApi(_) | SyncError::RemotePreconditionFailed | SyncError::Storage(_)
        )
    }
}

impl From<AppError> for SyncError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => SyncError::NotFound(msg),
            other => SyncError::Storage(other.to_string()),
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Google API error: {0}")]
    GoogleApi(String),

    #[error("Google account not connected: {0}")]
    NotConnected(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NoCredential | SyncError::RefreshFailed(_) => {
                AppError::NotConnected(err.user_message())
            }
            SyncError::RemoteApi(msg) | SyncError::RemoteNotFound(msg) => AppError::GoogleApi(msg),
            SyncError::RemotePreconditionFailed => AppError::GoogleApi(err.user_message()),
            SyncError::SyncDisabled | SyncError::Validation(_) => {
                AppError::BadRequest(err.user_message())
            }
            SyncError::NotFound(msg) => AppError::NotFound(msg),
            SyncError::Storage(msg) => AppError::Database(msg),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::GoogleApi(msg) => {
                (StatusCode::BAD_GATEWAY, "google_error", Some(msg.clone()))
            }
            AppError::NotConnected(msg) => {
                (StatusCode::CONFLICT, "not_connected", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
