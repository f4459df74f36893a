// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Job descriptors and worker identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::{EngineError, ErrorCode};

/// Template kind executed natively through the orchestrator.
pub const TEMPLATE_KIND_STACK: &str = "stack";
/// Template kind accepted at the boundary but not dispatched to a worker.
pub const TEMPLATE_KIND_PLAYBOOK: &str = "playbook";

/// Resource kind that selects the long poll-timeout class.
pub const RESOURCE_KIND_IMAGE: &str = "image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Modify,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Modify => "modify",
            Operation::Delete => "delete",
        }
    }

    /// Whether this operation submits a template and therefore needs a fetch.
    pub fn requires_template(&self) -> bool {
        matches!(self, Operation::Create | Operation::Modify)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Operation::Create),
            "modify" => Ok(Operation::Modify),
            "delete" => Ok(Operation::Delete),
            other => Err(EngineError::UnsupportedOperation {
                operation: other.to_string(),
            }),
        }
    }
}

/// Identifier for one in-flight worker. The dispatcher registry is the single
/// source of truth for which handles are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerHandle(pub Uuid);

impl WorkerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Immutable input to one worker, built by the dispatcher at submission time
/// and owned by the worker for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub operation: Operation,
    /// Path of the template inside the template repository.
    pub template_locator: String,
    pub stack_name: String,
    /// Correlation id tying the job to its durable target record.
    pub correlation_id: String,
    pub resource_kind: String,
    /// Raw template kind as submitted; validated by the dispatcher.
    pub template_kind: String,
    /// Dependency-initialization failure inherited from the engine context.
    /// A poisoned worker short-circuits its lifecycle with this code.
    #[serde(skip)]
    pub init_error: Option<ErrorCode>,
}

impl JobDescriptor {
    pub fn is_image_kind(&self) -> bool {
        self.resource_kind.eq_ignore_ascii_case(RESOURCE_KIND_IMAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_parses_known_values() {
        assert_eq!(Operation::Create, "create".parse().unwrap());
        assert_eq!(Operation::Modify, "modify".parse().unwrap());
        assert_eq!(Operation::Delete, "delete".parse().unwrap());
    }

    #[test]
    fn operation_rejects_unknown_values() {
        let err = "destroy".parse::<Operation>().unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedOperation { .. }));
        assert_eq!(ErrorCode::UnsupportedOperation, err.code());
    }

    #[test]
    fn image_kind_is_case_insensitive() {
        let descriptor = JobDescriptor {
            operation: Operation::Create,
            template_locator: "region/stack/image/demo.yaml".to_string(),
            stack_name: "demo".to_string(),
            correlation_id: "1".to_string(),
            resource_kind: "Image".to_string(),
            template_kind: TEMPLATE_KIND_STACK.to_string(),
            init_error: None,
        };
        assert!(descriptor.is_image_kind());
    }
}
