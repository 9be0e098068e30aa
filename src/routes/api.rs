// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::{connection_status, BulkResult, ConnectionStatus, SyncResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Upper bound on ids in one bulk request.
pub const MAX_BULK_IDS: u64 = 500;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/google/status", get(get_google_status))
        .route("/api/google/disconnect", post(disconnect_google))
        .route("/api/sync/{kind}", post(sync_bulk))
        .route("/api/sync/{kind}/retry", post(retry_failed))
        .route(
            "/api/sync/{kind}/{id}",
            post(sync_one).delete(delete_remote),
        )
        .route("/api/sync/{kind}/{id}/disabled", put(set_disabled))
}

/// Record kind addressed by the `{kind}` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    ClientContacts,
    VendorContacts,
}

/// Dispatch one call to the [`crate::services::EntitySync`] for `$kind`.
macro_rules! with_entity_sync {
    ($state:expr, $kind:expr, |$sync:ident| $body:expr) => {
        match $kind {
            EntityKind::ClientContacts => {
                let $sync = &$state.client_contacts;
                $body
            }
            EntityKind::VendorContacts => {
                let $sync = &$state.vendor_contacts;
                $body
            }
        }
    };
}

// ─── Google Connection ───────────────────────────────────────

async fn get_google_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConnectionStatus>> {
    let status = connection_status(
        &state.tokens,
        state.integrations.as_ref(),
        &user.principal_id,
    )
    .await?;
    Ok(Json(status))
}

/// Revoke the Google grant and deactivate the stored credential.
async fn disconnect_google(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    state.tokens.revoke(&user.principal_id).await?;
    tracing::info!(principal_id = %user.principal_id, "Google account disconnected");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Sync ────────────────────────────────────────────────────

async fn sync_one(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((kind, id)): Path<(EntityKind, String)>,
) -> Result<Json<SyncResult>> {
    let result = with_entity_sync!(state, kind, |sync| sync
        .sync_one(&id, &user.principal_id)
        .await?);
    Ok(Json(result))
}

async fn delete_remote(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((kind, id)): Path<(EntityKind, String)>,
) -> Result<Json<SyncResult>> {
    let result = with_entity_sync!(state, kind, |sync| sync
        .delete_remote(&id, &user.principal_id)
        .await?);
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SetDisabledRequest {
    pub disabled: bool,
}

async fn set_disabled(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((kind, id)): Path<(EntityKind, String)>,
    Json(body): Json<SetDisabledRequest>,
) -> Result<Json<SyncResult>> {
    let result = with_entity_sync!(state, kind, |sync| sync
        .set_disabled(&id, &user.principal_id, body.disabled)
        .await?);
    Ok(Json(result))
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BulkSyncRequest {
    #[validate(length(min = 1, max = MAX_BULK_IDS))]
    pub entity_ids: Vec<String>,
}

async fn sync_bulk(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(kind): Path<EntityKind>,
    Json(body): Json<BulkSyncRequest>,
) -> Result<Json<BulkResult>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid bulk request: {}", e)))?;

    let result = with_entity_sync!(state, kind, |sync| sync
        .sync_all(&body.entity_ids, &user.principal_id)
        .await?);
    Ok(Json(result))
}

async fn retry_failed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(kind): Path<EntityKind>,
) -> Result<Json<BulkResult>> {
    let result = with_entity_sync!(state, kind, |sync| sync
        .retry_failed(&user.principal_id)
        .await?);
    Ok(Json(result))
}
