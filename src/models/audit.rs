// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Audit trail entries for link-state transitions.

use crate::models::link::LinkSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Sync,
    DeleteRemote,
    SetDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    /// Principal that triggered the operation
    pub actor: String,
    pub action: AuditAction,
    #[serde(default)]
    pub error: Option<String>,
}

/// One before/after record, stored in `audit_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before: LinkSnapshot,
    pub after: LinkSnapshot,
    pub context: AuditContext,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        entity_type: &str,
        entity_id: &str,
        before: LinkSnapshot,
        after: LinkSnapshot,
        context: AuditContext,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            before,
            after,
            context,
            recorded_at: Utc::now(),
        }
    }
}
