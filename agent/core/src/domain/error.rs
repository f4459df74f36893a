// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Engine error taxonomy.
//!
//! Every classified failure carries a stable `STK_xxx` code that travels in
//! outcome records and listener notifications. Anything unclassified maps to
//! [`ErrorCode::UnknownException`] at the worker boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::job::{Operation, WorkerHandle};

/// Stable error codes shared with the downstream listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "STK_000")]
    StackCreateFailed,
    #[serde(rename = "STK_006")]
    UnsupportedOperation,
    #[serde(rename = "STK_008")]
    UnknownException,
    #[serde(rename = "STK_009")]
    StackModifyFailed,
    #[serde(rename = "STK_010")]
    StackDeleteFailed,
    #[serde(rename = "STK_012")]
    StackNotFound,
    #[serde(rename = "STK_013")]
    OperationTimeout,
    #[serde(rename = "STK_017")]
    ClientInit,
    #[serde(rename = "STK_018")]
    RepoInit,
    #[serde(rename = "STK_019")]
    TransportInit,
    #[serde(rename = "STK_020")]
    RepoTimeout,
    #[serde(rename = "STK_021")]
    RepoUrl,
    #[serde(rename = "STK_022")]
    RepoMissing,
    #[serde(rename = "STK_023")]
    RepoPermission,
    #[serde(rename = "STK_024")]
    RepoUnknown,
    #[serde(rename = "STK_025")]
    FileNotInRepo,
    #[serde(rename = "STK_XXX")]
    Unclassified,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StackCreateFailed => "STK_000",
            ErrorCode::UnsupportedOperation => "STK_006",
            ErrorCode::UnknownException => "STK_008",
            ErrorCode::StackModifyFailed => "STK_009",
            ErrorCode::StackDeleteFailed => "STK_010",
            ErrorCode::StackNotFound => "STK_012",
            ErrorCode::OperationTimeout => "STK_013",
            ErrorCode::ClientInit => "STK_017",
            ErrorCode::RepoInit => "STK_018",
            ErrorCode::TransportInit => "STK_019",
            ErrorCode::RepoTimeout => "STK_020",
            ErrorCode::RepoUrl => "STK_021",
            ErrorCode::RepoMissing => "STK_022",
            ErrorCode::RepoPermission => "STK_023",
            ErrorCode::RepoUnknown => "STK_024",
            ErrorCode::FileNotInRepo => "STK_025",
            ErrorCode::Unclassified => "STK_XXX",
        }
    }

    /// Human-readable description used when only the code survives (e.g. a
    /// worker poisoned by a failed dependency initialization).
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::StackCreateFailed => "Stack creation failed",
            ErrorCode::UnsupportedOperation => "Unsupported operation",
            ErrorCode::UnknownException => "Unknown exception",
            ErrorCode::StackModifyFailed => "Stack modification failed",
            ErrorCode::StackDeleteFailed => "Stack deletion failed",
            ErrorCode::StackNotFound => "Stack not found",
            ErrorCode::OperationTimeout => "Stack operation timed out",
            ErrorCode::ClientInit => "Orchestrator client failed to initialize",
            ErrorCode::RepoInit => "Failed to initialize and download the template repository",
            ErrorCode::TransportInit => "Failed to communicate with the result transport",
            ErrorCode::RepoTimeout => "Timed out reaching the template repository",
            ErrorCode::RepoUrl => "Template repository URL is invalid",
            ErrorCode::RepoMissing => "Template repository does not exist",
            ErrorCode::RepoPermission => "Permission denied to the template repository",
            ErrorCode::RepoUnknown => "Unknown template repository error",
            ErrorCode::FileNotInRepo => "Template not found in the repository",
            ErrorCode::Unclassified => "Unclassified error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a compensating delete issued after a failed create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    Succeeded,
    Failed { message: String },
}

impl RollbackOutcome {
    /// Note appended to the parent failure's message.
    pub fn note(&self) -> String {
        match self {
            RollbackOutcome::Succeeded => "success".to_string(),
            RollbackOutcome::Failed { message } if message.is_empty() => "fail".to_string(),
            RollbackOutcome::Failed { message } => message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Error during interaction with the orchestrator: {action} - {details}")]
    Integration { action: String, details: String },

    #[error("Error during interaction with the orchestrator: stacks.create - {details}")]
    StackCreate { details: String },

    #[error("Error during interaction with the orchestrator: stacks.update - {details}")]
    StackModify { details: String },

    #[error("Error during interaction with the orchestrator: stacks.delete - {details}")]
    StackDelete { details: String },

    #[error("Orchestrator stack not found. Query by {query}")]
    StackLookup { query: String },

    #[error("Invalid value in stack status: {raw:?}")]
    MalformedStatus { raw: String },

    #[error("Timeout: not able to perform {operation} operation for {stack} stack")]
    Timeout { operation: Operation, stack: String },

    /// Terminal orchestrator-reported failure for the expected action. For
    /// create operations the compensating delete's outcome rides along and
    /// selects the compensated persistence path.
    #[error("Not able to perform {operation} operation for {stack} stack: {details}")]
    OperationFailed {
        operation: Operation,
        stack: String,
        details: String,
        rollback: Option<RollbackOutcome>,
    },

    #[error("Got unsupported operation {operation:?}")]
    UnsupportedOperation { operation: String },

    #[error("Got unsupported template kind {kind:?}")]
    UnsupportedTemplateKind { kind: String },

    #[error("Worker {handle} was not initiated")]
    WorkerNotFound { handle: WorkerHandle },

    #[error("Failed to initialize the orchestrator client")]
    ClientInit,

    #[error("Failed to connect and download the template repository")]
    RepoInit,

    #[error("Failed to initialize the result transport")]
    TransportInit,

    #[error("[{label}] Timeout occurred while trying to reach the template repository")]
    RepoTimeout { label: String },

    #[error("[{label}] An error occurred with the template repository URL; check the configured remote")]
    RepoUrl { label: String },

    #[error("[{label}] Template repository is incorrect or does not exist")]
    RepoMissing { label: String },

    #[error("[{label}] Permission denied to the template repository; check access keys")]
    RepoPermission { label: String },

    #[error("[{label}] Unknown template repository error - {details}")]
    RepoUnknown { label: String, details: String },

    #[error("[{label}] File does not exist in the template repository")]
    FileNotInRepo { label: String },

    #[error("Internal error: {details}")]
    Internal { details: String },

    #[error("Unexpected error: {details}")]
    Unexpected { details: String },
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::StackCreate { .. } => ErrorCode::StackCreateFailed,
            EngineError::StackModify { .. } => ErrorCode::StackModifyFailed,
            EngineError::StackDelete { .. } => ErrorCode::StackDeleteFailed,
            EngineError::StackLookup { .. } => ErrorCode::StackNotFound,
            EngineError::Timeout { .. } => ErrorCode::OperationTimeout,
            EngineError::OperationFailed { operation, .. } => match operation {
                Operation::Create => ErrorCode::StackCreateFailed,
                Operation::Modify => ErrorCode::StackModifyFailed,
                Operation::Delete => ErrorCode::StackDeleteFailed,
            },
            EngineError::UnsupportedOperation { .. } | EngineError::UnsupportedTemplateKind { .. } => {
                ErrorCode::UnsupportedOperation
            }
            EngineError::ClientInit => ErrorCode::ClientInit,
            EngineError::RepoInit => ErrorCode::RepoInit,
            EngineError::TransportInit => ErrorCode::TransportInit,
            EngineError::RepoTimeout { .. } => ErrorCode::RepoTimeout,
            EngineError::RepoUrl { .. } => ErrorCode::RepoUrl,
            EngineError::RepoMissing { .. } => ErrorCode::RepoMissing,
            EngineError::RepoPermission { .. } => ErrorCode::RepoPermission,
            EngineError::RepoUnknown { .. } => ErrorCode::RepoUnknown,
            EngineError::FileNotInRepo { .. } => ErrorCode::FileNotInRepo,
            EngineError::Unexpected { .. } => ErrorCode::UnknownException,
            EngineError::Integration { .. }
            | EngineError::MalformedStatus { .. }
            | EngineError::WorkerNotFound { .. }
            | EngineError::Internal { .. } => ErrorCode::Unclassified,
        }
    }
}
