// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Audit trail sink.

use crate::error::AppError;
use crate::models::AuditRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Append-only audit sink.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), AppError>;
}

/// Append without letting a failure reach the caller.
///
/// A lost audit record must never fail the sync it describes.
pub async fn append_or_log(recorder: &Arc<dyn AuditRecorder>, record: AuditRecord) {
    if let Err(e) = recorder.append(&record).await {
        tracing::warn!(
            error = %e,
            entity_type = %record.entity_type,
            entity_id = %record.entity_id,
            "Failed to append audit record"
        );
    }
}
