// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-principal integration summary.
//!
//! Lets the UI show "3 of 40 contacts failed to sync" without scanning
//! every entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts from one bulk pass over a single entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub entity_type: String,
    pub total: u32,
    pub synced: u32,
    pub failed: u32,
    #[serde(default)]
    pub skipped: u32,
    pub finished_at: DateTime<Utc>,
}

/// Stored in `integrations`, keyed by principal id.
///
/// Client and vendor passes are tracked separately, so a clean pass over
/// one kind leaves the other kind's failure message in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationStatus {
    pub principal_id: String,
    #[serde(default)]
    pub last_bulk_sync_at: Option<DateTime<Utc>>,
    /// Every outstanding failure message, joined
    #[serde(default)]
    pub last_error: Option<String>,
    /// Most recent pass per entity type
    #[serde(default)]
    pub bulk: BTreeMap<String, BulkSummary>,
    /// Failure message per entity type whose last pass had failures
    #[serde(default)]
    pub failures: BTreeMap<String, String>,
}

impl IntegrationStatus {
    pub fn new(principal_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            ..Default::default()
        }
    }

    pub fn summary(&self, entity_type: &str) -> Option<&BulkSummary> {
        self.bulk.get(entity_type)
    }

    pub fn record_bulk(&mut self, summary: BulkSummary, label: &str) {
        let entity_type = summary.entity_type.clone();
        self.last_bulk_sync_at = Some(summary.finished_at);

        if summary.failed > 0 {
            self.failures.insert(
                entity_type.clone(),
                format!(
                    "{} of {} {} failed to sync",
                    summary.failed, summary.total, label
                ),
            );
        } else {
            self.failures.remove(&entity_type);
        }

        self.last_error = (!self.failures.is_empty()).then(|| {
            self.failures
                .values()
                .cloned()
                .collect::<Vec<_>>()
                .join("; ")
        });
        self.bulk.insert(entity_type, summary);
    }
}
