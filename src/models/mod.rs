// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod audit;
pub mod contact;
pub mod credential;
pub mod integration;
pub mod link;

pub use audit::{AuditAction, AuditContext, AuditRecord};
pub use contact::{ClientContact, ContactRepresentation, SyncableEntity, VendorContact};
pub use credential::{AccessToken, AuthorizationGrant, Credential, RefreshedToken, Scope};
pub use integration::{BulkSummary, IntegrationStatus};
pub use link::{LinkSnapshot, LinkState, SyncStatus};
