// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process keyed store implementing every store trait.
//!
//! Documents are kept as JSON so they go through the same serde path as
//! Firestore documents. Clones share the same underlying maps.

use crate::db::{collections, CredentialStore, EntityStore, IntegrationStore};
use crate::error::AppError;
use crate::models::{AuditRecord, Credential, IntegrationStatus, SyncStatus, SyncableEntity};
use crate::services::audit::AuditRecorder;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Keyed by (collection, document id)
    documents: Arc<DashMap<(String, String), serde_json::Value>>,
    audit_log: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_doc<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, AppError> {
        self.documents
            .get(&(collection.to_string(), id.to_string()))
            .map(|doc| serde_json::from_value(doc.value().clone()))
            .transpose()
            .map_err(|e| AppError::Database(format!("Corrupt {} document {}: {}", collection, id, e)))
    }

    fn put_doc<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(doc)
            .map_err(|e| AppError::Database(format!("Failed to encode {}: {}", collection, e)))?;
        self.documents
            .insert((collection.to_string(), id.to_string()), value);
        Ok(())
    }

    /// Snapshot of every audit record appended so far.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_credential(&self, principal_id: &str) -> Result<Option<Credential>, AppError> {
        self.get_doc(collections::CREDENTIALS, principal_id)
    }

    async fn put_credential(&self, credential: &Credential) -> Result<(), AppError> {
        self.put_doc(collections::CREDENTIALS, &credential.principal_id, credential)
    }
}

#[async_trait]
impl<E: SyncableEntity> EntityStore<E> for MemoryStore {
    async fn get_entity(&self, id: &str) -> Result<Option<E>, AppError> {
        self.get_doc(E::COLLECTION, id)
    }

    async fn save_entity(&self, entity: &E) -> Result<(), AppError> {
        self.put_doc(E::COLLECTION, entity.id(), entity)
    }

    async fn list_entities(
        &self,
        owner_id: &str,
        status: SyncStatus,
    ) -> Result<Vec<E>, AppError> {
        let mut entities = Vec::new();
        for doc in self.documents.iter() {
            if doc.key().0 != E::COLLECTION {
                continue;
            }
            let entity: E = serde_json::from_value(doc.value().clone()).map_err(|e| {
                AppError::Database(format!("Corrupt {} document {}: {}", E::COLLECTION, doc.key().1, e))
            })?;
            if entity.owner_id() == owner_id && entity.link().sync_status == status {
                entities.push(entity);
            }
        }
        entities.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(entities)
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn get_integration(
        &self,
        principal_id: &str,
    ) -> Result<Option<IntegrationStatus>, AppError> {
        self.get_doc(collections::INTEGRATIONS, principal_id)
    }

    async fn put_integration(&self, status: &IntegrationStatus) -> Result<(), AppError> {
        self.put_doc(collections::INTEGRATIONS, &status.principal_id, status)
    }
}

#[async_trait]
impl AuditRecorder for MemoryStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), AppError> {
        self.audit_log
            .lock()
            .map_err(|_| AppError::Database("Audit log lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}
