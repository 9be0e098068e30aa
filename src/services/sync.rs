// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-entity-type entry points used by the HTTP layer and the ERP's own
//! CRUD handlers.
//!
//! Callers address records by id; ownership is checked here, then the
//! loaded record is handed to the reconciler or the bulk coordinator.

use crate::db::{EntityStore, IntegrationStore};
use crate::error::SyncError;
use crate::models::{AuditAction, AuditContext, Scope, SyncableEntity};
use crate::services::bulk::{BulkResult, BulkSyncCoordinator};
use crate::services::reconciler::{SyncReconciler, SyncResult};
use crate::services::tokens::TokenManager;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Sync operations for one kind of record.
#[derive(Clone)]
pub struct EntitySync<E: SyncableEntity> {
    store: Arc<dyn EntityStore<E>>,
    reconciler: SyncReconciler,
    bulk: BulkSyncCoordinator,
}

impl<E: SyncableEntity> EntitySync<E> {
    pub fn new(
        store: Arc<dyn EntityStore<E>>,
        reconciler: SyncReconciler,
        bulk: BulkSyncCoordinator,
    ) -> Self {
        Self {
            store,
            reconciler,
            bulk,
        }
    }

    /// Load a record, hiding records owned by another principal.
    async fn load_owned(&self, entity_id: &str, owner_id: &str) -> Result<E, SyncError> {
        match self.store.get_entity(entity_id).await? {
            Some(entity) if entity.owner_id() == owner_id => Ok(entity),
            _ => Err(not_found::<E>(entity_id)),
        }
    }

    pub async fn sync_one(&self, entity_id: &str, owner_id: &str) -> Result<SyncResult, SyncError> {
        let mut entity = self.load_owned(entity_id, owner_id).await?;
        Ok(self
            .reconciler
            .sync_one(self.store.as_ref(), &mut entity, owner_id)
            .await)
    }

    pub async fn sync_all(
        &self,
        entity_ids: &[String],
        owner_id: &str,
    ) -> Result<BulkResult, SyncError> {
        self.bulk
            .sync_all(self.store.as_ref(), entity_ids, owner_id)
            .await
    }

    pub async fn retry_failed(&self, owner_id: &str) -> Result<BulkResult, SyncError> {
        self.bulk.retry_failed(self.store.as_ref(), owner_id).await
    }

    pub async fn delete_remote(
        &self,
        entity_id: &str,
        owner_id: &str,
    ) -> Result<SyncResult, SyncError> {
        let mut entity = self.load_owned(entity_id, owner_id).await?;
        Ok(self
            .reconciler
            .delete_remote(self.store.as_ref(), &mut entity, owner_id)
            .await)
    }

    /// Manual opt-out (`disabled = true`) or opt-in.
    ///
    /// Audited only when the status actually changes.
    pub async fn set_disabled(
        &self,
        entity_id: &str,
        owner_id: &str,
        disabled: bool,
    ) -> Result<SyncResult, SyncError> {
        let mut entity = self.load_owned(entity_id, owner_id).await?;

        let before = entity.link().snapshot();
        entity.link_mut().set_disabled(disabled);
        if entity.link().sync_status == before.sync_status {
            return Ok(SyncResult::succeeded(entity.link()));
        }

        self.reconciler
            .persist(
                self.store.as_ref(),
                &entity,
                before,
                AuditContext {
                    actor: owner_id.to_string(),
                    action: AuditAction::SetDisabled,
                    error: None,
                },
            )
            .await?;

        tracing::info!(
            entity_type = E::ENTITY_TYPE,
            entity_id,
            disabled,
            "Sync opt-out changed"
        );
        Ok(SyncResult::succeeded(entity.link()))
    }

    /// Hook for the ERP's create/update handlers: queue the record for the
    /// next sync. Returns `false` when the record is disabled.
    pub async fn mark_edited(&self, entity_id: &str) -> Result<bool, SyncError> {
        let mut entity = self
            .store
            .get_entity(entity_id)
            .await?
            .ok_or_else(|| not_found::<E>(entity_id))?;

        if !entity.link_mut().mark_edited() {
            return Ok(false);
        }

        self.store.save_entity(&entity).await?;
        Ok(true)
    }
}

fn not_found<E: SyncableEntity>(entity_id: &str) -> SyncError {
    SyncError::NotFound(format!("{} {}", E::ENTITY_TYPE, entity_id))
}

// ─── Connection Status ───────────────────────────────────────────────────────

/// Google connection summary for a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Whether the granted scopes allow contact sync
    pub contacts_enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub async fn connection_status(
    tokens: &TokenManager,
    integrations: &dyn IntegrationStore,
    principal_id: &str,
) -> Result<ConnectionStatus, SyncError> {
    let credential = tokens.credential(principal_id).await?;
    let integration = integrations.get_integration(principal_id).await?;

    let connected = credential.as_ref().is_some_and(|c| c.active);
    let contacts_enabled = connected
        && credential
            .as_ref()
            .is_some_and(|c| c.has_scope(Scope::Directory));

    // An inactive, unrevoked credential reports its own error.
    let last_error = match &credential {
        Some(c) if !c.active && c.revoked_at.is_none() => c.last_error.clone(),
        _ => integration.as_ref().and_then(|i| i.last_error.clone()),
    };

    Ok(ConnectionStatus {
        connected,
        contacts_enabled,
        last_synced_at: integration.and_then(|i| i.last_bulk_sync_at),
        last_error,
    })
}
