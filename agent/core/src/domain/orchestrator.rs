// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Port to the external stack orchestration service.
//!
//! The orchestrator owns stack creation semantics; this crate only submits
//! operations and observes `ACTION_STATUS` strings through this contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(pub String);

impl StackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference returned by a stack submission before the first status read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRef {
    pub id: StackId,
}

/// One observation of a remote stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackView {
    pub id: StackId,
    pub name: String,
    /// Raw `ACTION_STATUS` string, e.g. `CREATE_IN_PROGRESS`.
    pub status: String,
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Last-updated marker; compared verbatim for the modify race guard.
    #[serde(default)]
    pub updated_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackResource {
    pub resource_type: String,
    pub physical_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub checksum: String,
    pub size: u64,
    pub virtual_size: u64,
}

#[async_trait]
pub trait StackOrchestrator: Send + Sync {
    async fn create_stack(&self, name: &str, template: &Path) -> Result<StackRef, EngineError>;

    async fn update_stack(&self, id: &StackId, template: &Path) -> Result<(), EngineError>;

    async fn delete_stack(&self, id: &StackId) -> Result<(), EngineError>;

    async fn get_stack(&self, id: &StackId) -> Result<StackView, EngineError>;

    /// Lookup by display name; fails with a stack-lookup error when absent.
    async fn find_stack_by_name(&self, name: &str) -> Result<StackView, EngineError>;

    async fn list_stacks(&self) -> Result<Vec<StackView>, EngineError>;

    async fn stack_resources(&self, id: &StackId) -> Result<Vec<StackResource>, EngineError>;

    async fn image_metadata(&self, image_id: &str) -> Result<ImageMetadata, EngineError>;
}
