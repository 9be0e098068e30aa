// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sequential bulk sync over many records.

use crate::db::{EntityStore, IntegrationStore};
use crate::error::SyncError;
use crate::models::{BulkSummary, IntegrationStatus, SyncStatus, SyncableEntity};
use crate::services::reconciler::{SyncReconciler, SyncResult};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Cap on per-item errors returned in one [`BulkResult`]. Counts stay exact.
pub const MAX_REPORTED_ERRORS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BulkItemError {
    pub entity_id: String,
    pub error: String,
}

/// Aggregate outcome of a bulk pass. `total = synced + failed + skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BulkResult {
    pub total: u32,
    pub synced: u32,
    pub failed: u32,
    /// Records opted out of sync
    pub skipped: u32,
    pub errors: Vec<BulkItemError>,
}

impl BulkResult {
    fn record(&mut self, entity_id: &str, result: &SyncResult) {
        self.total += 1;
        if result.success {
            self.synced += 1;
        } else if result.status == SyncStatus::Disabled {
            self.skipped += 1;
        } else {
            self.record_failure(entity_id, result.error.clone().unwrap_or_default());
        }
    }

    fn record_missing(&mut self, entity_id: &str, error: &SyncError) {
        self.total += 1;
        self.record_failure(entity_id, error.user_message());
    }

    fn record_failure(&mut self, entity_id: &str, error: String) {
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(BulkItemError {
                entity_id: entity_id.to_string(),
                error,
            });
        }
    }
}

/// Runs the reconciler over many records, one at a time, in input order.
#[derive(Clone)]
pub struct BulkSyncCoordinator {
    reconciler: SyncReconciler,
    integrations: Arc<dyn IntegrationStore>,
}

impl BulkSyncCoordinator {
    pub fn new(reconciler: SyncReconciler, integrations: Arc<dyn IntegrationStore>) -> Self {
        Self {
            reconciler,
            integrations,
        }
    }

    /// Sync the given records owned by `owner_id`.
    ///
    /// Ids that are unknown or owned by someone else count as failures.
    /// Only a store failure while loading the input fails the whole pass.
    pub async fn sync_all<E: SyncableEntity>(
        &self,
        store: &dyn EntityStore<E>,
        entity_ids: &[String],
        owner_id: &str,
    ) -> Result<BulkResult, SyncError> {
        let mut loaded = Vec::with_capacity(entity_ids.len());
        for id in entity_ids {
            let entity = store
                .get_entity(id)
                .await?
                .filter(|entity| entity.owner_id() == owner_id);
            loaded.push((id.as_str(), entity));
        }

        let mut result = BulkResult::default();
        for (id, entity) in loaded {
            match entity {
                Some(mut entity) => {
                    let outcome = self.reconciler.sync_one(store, &mut entity, owner_id).await;
                    result.record(id, &outcome);
                }
                None => {
                    let missing = SyncError::NotFound(format!("{} {}", E::ENTITY_TYPE, id));
                    result.record_missing(id, &missing);
                }
            }
        }

        self.finish::<E>(owner_id, &result).await;
        Ok(result)
    }

    /// Re-run every `FAILED` record owned by `owner_id`.
    pub async fn retry_failed<E: SyncableEntity>(
        &self,
        store: &dyn EntityStore<E>,
        owner_id: &str,
    ) -> Result<BulkResult, SyncError> {
        let entities = store.list_entities(owner_id, SyncStatus::Failed).await?;
        tracing::info!(
            owner_id,
            entity_type = E::ENTITY_TYPE,
            count = entities.len(),
            "Retrying failed records"
        );

        let mut result = BulkResult::default();
        for mut entity in entities {
            let outcome = self.reconciler.sync_one(store, &mut entity, owner_id).await;
            result.record(entity.id(), &outcome);
        }

        self.finish::<E>(owner_id, &result).await;
        Ok(result)
    }

    /// Write the pass summary onto the owner's integration status.
    async fn finish<E: SyncableEntity>(&self, owner_id: &str, result: &BulkResult) {
        tracing::info!(
            owner_id,
            entity_type = E::ENTITY_TYPE,
            total = result.total,
            synced = result.synced,
            failed = result.failed,
            skipped = result.skipped,
            "Bulk sync finished"
        );

        let mut status = match self.integrations.get_integration(owner_id).await {
            Ok(Some(status)) => status,
            Ok(None) => IntegrationStatus::new(owner_id),
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Failed to load integration status");
                return;
            }
        };

        status.record_bulk(
            BulkSummary {
                entity_type: E::ENTITY_TYPE.to_string(),
                total: result.total,
                synced: result.synced,
                failed: result.failed,
                skipped: result.skipped,
                finished_at: Utc::now(),
            },
            E::LABEL,
        );

        if let Err(e) = self.integrations.put_integration(&status).await {
            tracing::warn!(owner_id, error = %e, "Failed to save integration status");
        }
    }
}
