// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Port to the template retrieval mechanism.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::error::EngineError;

/// Materializes a template identified by its repository-relative locator into
/// a local file. Each failure mode maps to a distinct repo error kind.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<PathBuf, EngineError>;
}
