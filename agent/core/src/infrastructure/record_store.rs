// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory record store.
//!
//! The durable store is an external collaborator consumed through the
//! `RecordStore` port; this implementation backs local runs and tests.
//! Last-write-wins per record, matching the contract the engine assumes.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::error::{EngineError, ErrorCode};
use crate::domain::record::{RecordStatus, RecordStore, TargetRecord};

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, TargetRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, record: TargetRecord) -> Result<(), EngineError> {
        self.records
            .write()
            .insert(record.correlation_id.clone(), record);
        Ok(())
    }

    async fn get_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Option<TargetRecord>, EngineError> {
        Ok(self.records.read().get(correlation_id).cloned())
    }

    async fn update_status(
        &self,
        correlation_id: &str,
        status: RecordStatus,
        error_code: Option<ErrorCode>,
        error_msg: Option<String>,
    ) -> Result<(), EngineError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(correlation_id)
            .ok_or_else(|| EngineError::Internal {
                details: format!("no target record for correlation id {correlation_id}"),
            })?;
        record.status = status;
        record.error_code = error_code;
        record.error_msg = error_msg;
        record.updated_at = Utc::now();
        Ok(())
    }
}
