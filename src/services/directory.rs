// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote directory capability used by the reconciler.

use crate::error::SyncError;
use crate::models::{AccessToken, ContactRepresentation};
use async_trait::async_trait;

/// Identity and version tag of a remote contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContact {
    /// Provider resource name, e.g. `people/c123`
    pub resource_id: String,
    /// Opaque version tag used as the update precondition
    pub etag: String,
}

/// Thin, stateless wrapper over the provider's contact API.
///
/// Errors: `RemoteApi` for transport/provider failures,
/// `RemotePreconditionFailed` for a stale etag on `update`, and
/// `RemoteNotFound` when the resource does not exist.
#[async_trait]
pub trait RemoteDirectoryClient: Send + Sync {
    async fn get(&self, token: &AccessToken, resource_id: &str)
        -> Result<RemoteContact, SyncError>;

    async fn create(
        &self,
        token: &AccessToken,
        contact: &ContactRepresentation,
    ) -> Result<RemoteContact, SyncError>;

    /// `etag` must come from a `get` made immediately before the write.
    async fn update(
        &self,
        token: &AccessToken,
        resource_id: &str,
        contact: &ContactRepresentation,
        etag: &str,
    ) -> Result<RemoteContact, SyncError>;

    async fn delete(&self, token: &AccessToken, resource_id: &str) -> Result<(), SyncError>;
}
