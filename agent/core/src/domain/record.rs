// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Durable target records and the outcome mapping.
//!
//! Exactly one outcome is written per job. The record store itself is an
//! external collaborator; this module defines the narrow contract plus the
//! error-to-outcome mapping applied at the worker boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{EngineError, ErrorCode, RollbackOutcome};
use crate::domain::job::Operation;

/// Prefix applied to every rollback line appended to an outcome message.
const ROLLBACK_GLUE: &str = "\n[ROLLBACK] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Submitted,
    Success,
    /// Execution failure with compensation attempted.
    Error,
    /// Any other failure surfaced by the engine.
    InternalError,
    /// Written by the downstream consumer when it could not process the
    /// result notification; triggers a resend.
    DispatchError,
    /// Written by the downstream consumer after acknowledging the result.
    DispatchSuccess,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Submitted => "Submitted",
            RecordStatus::Success => "Success",
            // Both failure classes persist as the same user-visible status;
            // the error code tells them apart.
            RecordStatus::Error | RecordStatus::InternalError => "Error",
            RecordStatus::DispatchError => "Dispatch_Error",
            RecordStatus::DispatchSuccess => "Dispatch_Success",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of one job, keyed by correlation id. Seeded by the inbound
/// front end, finalized exactly once by the owning worker, and flipped to a
/// dispatch status by the downstream consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRecord {
    pub correlation_id: String,
    pub request_id: String,
    pub resource_id: String,
    pub resource_type: String,
    pub resource_template_version: Option<String>,
    pub template_kind: String,
    pub operation: Operation,
    pub region: String,
    pub status: RecordStatus,
    pub error_code: Option<ErrorCode>,
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, record: TargetRecord) -> Result<(), EngineError>;

    async fn get_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Option<TargetRecord>, EngineError>;

    async fn update_status(
        &self,
        correlation_id: &str,
        status: RecordStatus,
        error_code: Option<ErrorCode>,
        error_msg: Option<String>,
    ) -> Result<(), EngineError>;
}

/// Terminal result of one job as persisted to the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: RecordStatus,
    pub error_code: Option<ErrorCode>,
    pub error_msg: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            status: RecordStatus::Success,
            error_code: None,
            error_msg: None,
        }
    }

    /// Maps an engine error to its persisted form. A compensated operation
    /// failure keeps its own code and carries the rollback note in the
    /// message, one `[ROLLBACK]`-prefixed line per rollback message line.
    pub fn from_error(error: &EngineError) -> Self {
        match error {
            EngineError::OperationFailed {
                rollback: Some(rollback),
                ..
            } => Self {
                status: RecordStatus::Error,
                error_code: Some(error.code()),
                error_msg: Some(append_rollback(error.to_string(), rollback)),
            },
            other => Self {
                status: RecordStatus::InternalError,
                error_code: Some(other.code()),
                error_msg: Some(other.to_string()),
            },
        }
    }
}

fn append_rollback(message: String, rollback: &RollbackOutcome) -> String {
    let note = rollback
        .note()
        .split('\n')
        .collect::<Vec<_>>()
        .join(ROLLBACK_GLUE);
    format!("{message}{ROLLBACK_GLUE}{note}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_create(rollback: Option<RollbackOutcome>) -> EngineError {
        EngineError::OperationFailed {
            operation: Operation::Create,
            stack: "demo".to_string(),
            details: "resource refused".to_string(),
            rollback,
        }
    }

    #[test]
    fn success_outcome_has_no_error_fields() {
        let outcome = Outcome::success();
        assert_eq!(RecordStatus::Success, outcome.status);
        assert_eq!(None, outcome.error_code);
        assert_eq!(None, outcome.error_msg);
    }

    #[test]
    fn unclassified_error_maps_to_unknown_code() {
        let error = EngineError::Unexpected {
            details: "attempt to divide by zero".to_string(),
        };
        let outcome = Outcome::from_error(&error);
        assert_eq!(RecordStatus::InternalError, outcome.status);
        assert_eq!(Some(ErrorCode::UnknownException), outcome.error_code);
        assert_eq!(Some(error.to_string()), outcome.error_msg);
    }

    #[test]
    fn domain_error_keeps_its_code() {
        let error = EngineError::Integration {
            action: "stacks.get".to_string(),
            details: "connection reset".to_string(),
        };
        let outcome = Outcome::from_error(&error);
        assert_eq!(RecordStatus::InternalError, outcome.status);
        assert_eq!(Some(ErrorCode::Unclassified), outcome.error_code);
    }

    #[test]
    fn uncompensated_failure_is_internal() {
        let outcome = Outcome::from_error(&failed_create(None));
        assert_eq!(RecordStatus::InternalError, outcome.status);
        assert_eq!(Some(ErrorCode::StackCreateFailed), outcome.error_code);
        assert!(!outcome.error_msg.unwrap().contains("[ROLLBACK]"));
    }

    #[test]
    fn compensated_failure_appends_rollback_success() {
        let error = failed_create(Some(RollbackOutcome::Succeeded));
        let outcome = Outcome::from_error(&error);
        assert_eq!(RecordStatus::Error, outcome.status);
        assert_eq!(
            Some(format!("{error}\n[ROLLBACK] success")),
            outcome.error_msg
        );
    }

    #[test]
    fn compensated_failure_appends_rollback_fail() {
        let error = failed_create(Some(RollbackOutcome::Failed {
            message: String::new(),
        }));
        let outcome = Outcome::from_error(&error);
        assert_eq!(Some(format!("{error}\n[ROLLBACK] fail")), outcome.error_msg);
    }

    #[test]
    fn multiline_rollback_message_prefixes_every_line() {
        let error = failed_create(Some(RollbackOutcome::Failed {
            message: "a\nbb\nccc".to_string(),
        }));
        let outcome = Outcome::from_error(&error);
        assert_eq!(
            Some(format!(
                "{error}\n[ROLLBACK] a\n[ROLLBACK] bb\n[ROLLBACK] ccc"
            )),
            outcome.error_msg
        );
    }
}
