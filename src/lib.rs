// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Directory sync: mirrors ERP contact records into each user's Google
//! Contacts.
//!
//! This crate provides the OAuth credential lifecycle, the per-record
//! reconciler, bulk sync and the HTTP API in front of them.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::{CredentialStore, EntityStore, IntegrationStore};
use models::{ClientContact, VendorContact};
use services::{
    AuditRecorder, BulkSyncCoordinator, EntitySync, KmsService, OAuthProvider, RefreshLocks,
    RemoteDirectoryClient, SyncReconciler, TokenCache, TokenManager,
};
use std::sync::Arc;

/// Storage and remote capabilities the service is assembled from.
#[derive(Clone)]
pub struct Backends {
    pub credentials: Arc<dyn CredentialStore>,
    pub integrations: Arc<dyn IntegrationStore>,
    pub client_contacts: Arc<dyn EntityStore<ClientContact>>,
    pub vendor_contacts: Arc<dyn EntityStore<VendorContact>>,
    pub audit: Arc<dyn AuditRecorder>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub directory: Arc<dyn RemoteDirectoryClient>,
}

impl Backends {
    /// All storage roles served by one store (Firestore or in-memory).
    pub fn single_store<S>(
        store: S,
        oauth: Arc<dyn OAuthProvider>,
        directory: Arc<dyn RemoteDirectoryClient>,
    ) -> Self
    where
        S: CredentialStore
            + IntegrationStore
            + EntityStore<ClientContact>
            + EntityStore<VendorContact>
            + AuditRecorder
            + Clone
            + 'static,
    {
        Self {
            credentials: Arc::new(store.clone()),
            integrations: Arc::new(store.clone()),
            client_contacts: Arc::new(store.clone()),
            vendor_contacts: Arc::new(store.clone()),
            audit: Arc::new(store),
            oauth,
            directory,
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenManager,
    pub integrations: Arc<dyn IntegrationStore>,
    pub client_contacts: EntitySync<ClientContact>,
    pub vendor_contacts: EntitySync<VendorContact>,
}

impl AppState {
    pub fn new(
        config: Config,
        backends: Backends,
        kms: KmsService,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        let tokens = TokenManager::new(
            backends.credentials,
            backends.oauth,
            kms,
            token_cache,
            refresh_locks,
        );
        let reconciler =
            SyncReconciler::new(tokens.clone(), backends.directory, backends.audit);
        let bulk = BulkSyncCoordinator::new(reconciler.clone(), backends.integrations.clone());

        Self {
            config,
            tokens,
            integrations: backends.integrations,
            client_contacts: EntitySync::new(
                backends.client_contacts,
                reconciler.clone(),
                bulk.clone(),
            ),
            vendor_contacts: EntitySync::new(backends.vendor_contacts, reconciler, bulk),
        }
    }
}
