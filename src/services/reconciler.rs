// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciles one local record with its mirror in the remote directory.
//!
//! Every attempt ends in a [`SyncResult`] value. Failures are recorded on
//! the record's [`LinkState`] and in the audit trail; they are never
//! returned as errors, so a bulk pass can keep going.

use crate::db::EntityStore;
use crate::error::{SyncError, SyncErrorKind};
use crate::models::{
    AuditAction, AuditContext, AuditRecord, LinkSnapshot, LinkState, SyncStatus, SyncableEntity,
};
use crate::services::audit::{append_or_log, AuditRecorder};
use crate::services::directory::RemoteDirectoryClient;
use crate::services::tokens::TokenManager;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Outcome of one sync or delete attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResult {
    pub success: bool,
    pub status: SyncStatus,
    pub remote_id: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<SyncErrorKind>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncResult {
    /// Successful outcome reflecting the link as it now stands.
    pub fn succeeded(link: &LinkState) -> Self {
        Self {
            success: true,
            status: link.sync_status,
            remote_id: link.remote_resource_id.clone(),
            error: None,
            error_kind: None,
            synced_at: link.last_synced_at,
        }
    }

    pub fn failed(link: &LinkState, error: &SyncError) -> Self {
        Self {
            success: false,
            status: link.sync_status,
            remote_id: link.remote_resource_id.clone(),
            error: Some(error.user_message()),
            error_kind: Some(error.kind()),
            synced_at: None,
        }
    }
}

/// Drives the link-state machine for any [`SyncableEntity`].
#[derive(Clone)]
pub struct SyncReconciler {
    tokens: TokenManager,
    directory: Arc<dyn RemoteDirectoryClient>,
    audit: Arc<dyn AuditRecorder>,
}

impl SyncReconciler {
    pub fn new(
        tokens: TokenManager,
        directory: Arc<dyn RemoteDirectoryClient>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        Self {
            tokens,
            directory,
            audit,
        }
    }

    /// Push one record to the remote directory.
    ///
    /// 1. Disabled → `SyncDisabled`, nothing touched
    /// 2. Access token for the owner
    /// 3. Normalized representation
    /// 4. No remote id → create; otherwise read the etag and update with it
    /// 5./6. Record `SYNCED` or `FAILED`, persist, append one audit record
    pub async fn sync_one<E: SyncableEntity>(
        &self,
        store: &dyn EntityStore<E>,
        entity: &mut E,
        actor: &str,
    ) -> SyncResult {
        if entity.link().is_disabled() {
            tracing::debug!(
                entity_type = E::ENTITY_TYPE,
                entity_id = entity.id(),
                "Sync disabled, skipping"
            );
            return SyncResult::failed(entity.link(), &SyncError::SyncDisabled);
        }

        let before = entity.link().snapshot();

        let outcome = self.push(&*entity).await;
        let failure = match outcome {
            Ok(remote_id) => {
                entity.link_mut().mark_synced(remote_id, Utc::now());
                None
            }
            Err(e) => {
                tracing::warn!(
                    entity_type = E::ENTITY_TYPE,
                    entity_id = entity.id(),
                    owner_id = entity.owner_id(),
                    error = %e,
                    "Contact sync failed"
                );
                entity.link_mut().mark_failed(e.user_message());
                Some(e)
            }
        };

        let context = AuditContext {
            actor: actor.to_string(),
            action: AuditAction::Sync,
            error: failure.as_ref().map(SyncError::user_message),
        };
        if let Err(e) = self.persist(store, &*entity, before, context).await {
            return SyncResult::failed(entity.link(), &e);
        }

        match failure {
            None => {
                tracing::info!(
                    entity_type = E::ENTITY_TYPE,
                    entity_id = entity.id(),
                    remote_id = ?entity.link().remote_resource_id,
                    "Contact synced"
                );
                SyncResult::succeeded(entity.link())
            }
            Some(e) => SyncResult::failed(entity.link(), &e),
        }
    }

    /// Create or update the remote contact. Returns its resource id.
    async fn push<E: SyncableEntity>(&self, entity: &E) -> Result<String, SyncError> {
        let token = self.tokens.get_valid_access_token(entity.owner_id()).await?;
        let representation = entity.representation()?;

        let remote = match &entity.link().remote_resource_id {
            None => self.directory.create(&token, &representation).await?,
            Some(resource_id) => {
                let current = self.directory.get(&token, resource_id).await?;
                self.directory
                    .update(&token, resource_id, &representation, &current.etag)
                    .await?
            }
        };

        Ok(remote.resource_id)
    }

    /// Delete the remote mirror and reset the link.
    ///
    /// A record with no remote id succeeds trivially. A remote object that
    /// is already gone counts as deleted. Any other failure leaves the link
    /// untouched.
    pub async fn delete_remote<E: SyncableEntity>(
        &self,
        store: &dyn EntityStore<E>,
        entity: &mut E,
        actor: &str,
    ) -> SyncResult {
        let Some(resource_id) = entity.link().remote_resource_id.clone() else {
            return SyncResult::succeeded(entity.link());
        };

        let outcome = match self.tokens.get_valid_access_token(entity.owner_id()).await {
            Ok(token) => self.directory.delete(&token, &resource_id).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {}
            Err(SyncError::RemoteNotFound(_)) => {
                tracing::info!(
                    entity_type = E::ENTITY_TYPE,
                    entity_id = entity.id(),
                    remote_id = %resource_id,
                    "Remote contact already gone"
                );
            }
            Err(e) => {
                tracing::warn!(
                    entity_type = E::ENTITY_TYPE,
                    entity_id = entity.id(),
                    remote_id = %resource_id,
                    error = %e,
                    "Remote contact delete failed"
                );
                return SyncResult::failed(entity.link(), &e);
            }
        }

        let before = entity.link().snapshot();
        entity.link_mut().mark_unlinked();

        let context = AuditContext {
            actor: actor.to_string(),
            action: AuditAction::DeleteRemote,
            error: None,
        };
        if let Err(e) = self.persist(store, &*entity, before, context).await {
            return SyncResult::failed(entity.link(), &e);
        }

        tracing::info!(
            entity_type = E::ENTITY_TYPE,
            entity_id = entity.id(),
            remote_id = %resource_id,
            "Remote contact deleted"
        );
        SyncResult::succeeded(entity.link())
    }

    /// Save the record, then append the before/after audit record.
    ///
    /// Nothing is audited if the save fails.
    pub(crate) async fn persist<E: SyncableEntity>(
        &self,
        store: &dyn EntityStore<E>,
        entity: &E,
        before: LinkSnapshot,
        context: AuditContext,
    ) -> Result<(), SyncError> {
        if let Err(e) = store.save_entity(entity).await {
            tracing::error!(
                entity_type = E::ENTITY_TYPE,
                entity_id = entity.id(),
                error = %e,
                "Failed to persist link state"
            );
            return Err(e.into());
        }

        let record = AuditRecord::new(
            E::ENTITY_TYPE,
            entity.id(),
            before,
            entity.link().snapshot(),
            context,
        );
        append_or_log(&self.audit, record).await;
        Ok(())
    }
}
