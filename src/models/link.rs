// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Link between a local record and its mirror in Google.
//!
//! State machine:
//! - `PENDING` → sync attempt → `SYNCED` | `FAILED`
//! - `FAILED` → sync attempt → `SYNCED` | `FAILED`
//! - `SYNCED` | `FAILED` → local edit → `PENDING`
//! - any → `DISABLED` (manual); `DISABLED` → `PENDING` only by manual opt-in

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
    Disabled,
}

impl SyncStatus {
    /// Stored representation, as used in store queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Synced => "SYNCED",
            SyncStatus::Failed => "FAILED",
            SyncStatus::Disabled => "DISABLED",
        }
    }
}

/// Per-entity sync bookkeeping. Mutated only by the reconciler and the
/// manual opt-out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkState {
    /// Google resource name, e.g. `people/c123`
    #[serde(default)]
    pub remote_resource_id: Option<String>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// The audited part of a [`LinkState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub sync_status: SyncStatus,
    pub remote_resource_id: Option<String>,
}

impl LinkState {
    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            sync_status: self.sync_status,
            remote_resource_id: self.remote_resource_id.clone(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.sync_status == SyncStatus::Disabled
    }

    pub fn mark_synced(&mut self, remote_resource_id: String, at: DateTime<Utc>) {
        self.remote_resource_id = Some(remote_resource_id);
        self.sync_status = SyncStatus::Synced;
        self.last_synced_at = Some(at);
        self.last_error = None;
    }

    /// The remote id (if any) is kept so a later attempt updates instead of
    /// creating a duplicate.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.sync_status = SyncStatus::Failed;
        self.last_error = Some(error.into());
    }

    /// Remote mirror deleted. A disabled record stays disabled.
    pub fn mark_unlinked(&mut self) {
        self.remote_resource_id = None;
        self.last_error = None;
        if !self.is_disabled() {
            self.sync_status = SyncStatus::Pending;
        }
    }

    /// Local record created or materially edited. Returns `false` for
    /// disabled records, which stay disabled.
    pub fn mark_edited(&mut self) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.sync_status = SyncStatus::Pending;
        true
    }

    /// Manual opt-out (`true`) or opt-in (`false`).
    pub fn set_disabled(&mut self, disabled: bool) {
        if disabled {
            self.sync_status = SyncStatus::Disabled;
        } else if self.is_disabled() {
            self.sync_status = SyncStatus::Pending;
        }
    }
}
