// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Credentials (encrypted OAuth tokens, one document per principal)
//! - Syncable entities (client and vendor contacts with their link state)
//! - Integration summaries (last bulk sync per principal)
//! - Audit log (append-only)

use crate::db::{collections, CredentialStore, EntityStore, IntegrationStore};
use crate::error::AppError;
use crate::models::{AuditRecord, Credential, IntegrationStatus, SyncStatus, SyncableEntity};
use crate::services::audit::AuditRecorder;
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Delete a credential document (test cleanup and account removal).
    pub async fn delete_credential(&self, principal_id: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(collections::CREDENTIALS)
            .document_id(principal_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Audit records for one entity, oldest first.
    pub async fn get_audit_records(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::AUDIT_LOG)
            .filter(|q| {
                q.for_all([
                    q.field("entity_type").eq(entity_type),
                    q.field("entity_id").eq(entity_id),
                ])
            })
            .order_by([(
                "recorded_at",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

// ─── Credential Operations ───────────────────────────────────

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get_credential(&self, principal_id: &str) -> Result<Option<Credential>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(principal_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_credential(&self, credential: &Credential) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(&credential.principal_id)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Entity Operations ───────────────────────────────────────

#[async_trait]
impl<E: SyncableEntity> EntityStore<E> for FirestoreDb {
    async fn get_entity(&self, id: &str) -> Result<Option<E>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(E::COLLECTION)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn save_entity(&self, entity: &E) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(E::COLLECTION)
            .document_id(entity.id())
            .object(entity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Requires a composite index on (owner_id, link.sync_status, id).
    async fn list_entities(
        &self,
        owner_id: &str,
        status: SyncStatus,
    ) -> Result<Vec<E>, AppError> {
        let status = status.as_str();
        self.client
            .fluent()
            .select()
            .from(E::COLLECTION)
            .filter(|q| {
                q.for_all([
                    q.field("owner_id").eq(owner_id),
                    q.field("link.sync_status").eq(status),
                ])
            })
            .order_by([("id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

// ─── Integration Operations ──────────────────────────────────

#[async_trait]
impl IntegrationStore for FirestoreDb {
    async fn get_integration(
        &self,
        principal_id: &str,
    ) -> Result<Option<IntegrationStatus>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::INTEGRATIONS)
            .obj()
            .one(principal_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_integration(&self, status: &IntegrationStatus) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::INTEGRATIONS)
            .document_id(&status.principal_id)
            .object(status)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Audit Operations ────────────────────────────────────────

#[async_trait]
impl AuditRecorder for FirestoreDb {
    async fn append(&self, record: &AuditRecord) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::AUDIT_LOG)
            .document_id(&record.id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
