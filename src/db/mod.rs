// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! The sync engine only needs a keyed record store. These traits describe
//! that store; [`FirestoreDb`] is the production backend and
//! [`MemoryStore`] backs tests and local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Credential, IntegrationStatus, SyncStatus, SyncableEntity};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const CREDENTIALS: &str = "credentials";
    pub const INTEGRATIONS: &str = "integrations";
    pub const CLIENT_CONTACTS: &str = "client_contacts";
    pub const VENDOR_CONTACTS: &str = "vendor_contacts";
    pub const AUDIT_LOG: &str = "audit_log";
}

/// One credential row per principal (principal id = document id).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self, principal_id: &str) -> Result<Option<Credential>, AppError>;

    /// Create or replace the principal's credential.
    async fn put_credential(&self, credential: &Credential) -> Result<(), AppError>;
}

/// Keyed storage for one kind of syncable entity.
#[async_trait]
pub trait EntityStore<E: SyncableEntity>: Send + Sync {
    async fn get_entity(&self, id: &str) -> Result<Option<E>, AppError>;

    async fn save_entity(&self, entity: &E) -> Result<(), AppError>;

    /// Entities owned by `owner_id` in `status`, ordered by id.
    async fn list_entities(&self, owner_id: &str, status: SyncStatus)
        -> Result<Vec<E>, AppError>;
}

/// Per-principal integration summaries.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn get_integration(
        &self,
        principal_id: &str,
    ) -> Result<Option<IntegrationStatus>, AppError>;

    async fn put_integration(&self, status: &IntegrationStatus) -> Result<(), AppError>;
}
