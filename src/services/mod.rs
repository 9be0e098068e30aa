// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod audit;
pub mod bulk;
pub mod directory;
pub mod google_oauth;
pub mod kms;
pub mod people;
pub mod reconciler;
pub mod sync;
pub mod tokens;

pub use audit::AuditRecorder;
pub use bulk::{BulkItemError, BulkResult, BulkSyncCoordinator, MAX_REPORTED_ERRORS};
pub use directory::{RemoteContact, RemoteDirectoryClient};
pub use google_oauth::GoogleOAuthClient;
pub use kms::KmsService;
pub use people::PeopleClient;
pub use reconciler::{SyncReconciler, SyncResult};
pub use sync::{connection_status, ConnectionStatus, EntitySync};
pub use tokens::{OAuthProvider, RefreshLocks, TokenCache, TokenManager};

use std::time::Duration;

/// Shared outbound HTTP client. Every Google call is bounded by `timeout_secs`.
pub fn http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("directory-sync/", env!("CARGO_PKG_VERSION")))
        .build()
}
