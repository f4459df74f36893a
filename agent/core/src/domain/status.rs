// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Interpretation of raw orchestrator status strings.
//!
//! A stack reports `ACTION_STATUS` (e.g. `CREATE_IN_PROGRESS`), split on the
//! first underscore. The checker classifies each observation relative to the
//! action the worker expects, so a stale view of the previous action keeps
//! the poll loop pending instead of terminating it early.

use crate::domain::error::EngineError;
use crate::domain::job::Operation;
use crate::domain::orchestrator::StackView;

pub const ACTION_CREATE: &str = "CREATE";
pub const ACTION_UPDATE: &str = "UPDATE";
pub const ACTION_DELETE: &str = "DELETE";

pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_COMPLETE: &str = "COMPLETE";
pub const STATUS_FAILED: &str = "FAILED";

/// Remote action label corresponding to a requested operation.
pub fn remote_action(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => ACTION_CREATE,
        Operation::Modify => ACTION_UPDATE,
        Operation::Delete => ACTION_DELETE,
    }
}

/// Splits a raw status into `(action, status)` on the first underscore.
pub fn split_action_status(raw: &str) -> Result<(&str, &str), EngineError> {
    raw.split_once('_')
        .ok_or_else(|| EngineError::MalformedStatus {
            raw: raw.to_string(),
        })
}

/// Classifies a stream of stack observations against an expected action.
///
/// Holds no state beyond the first observation's `updated_time` (the modify
/// race guard) and the latest parsed action/status pair.
#[derive(Debug)]
pub struct OperationStatusChecker {
    expected_action: &'static str,
    initial_updated_time: Option<String>,
    action: String,
    status: String,
}

impl OperationStatusChecker {
    pub fn new(initial: &StackView, operation: Operation) -> Result<Self, EngineError> {
        let (action, status) = split_action_status(&initial.status)?;
        Ok(Self {
            expected_action: remote_action(operation),
            initial_updated_time: initial.updated_time.clone(),
            action: action.to_string(),
            status: status.to_string(),
        })
    }

    /// Classifies the latest observation. Pending while the reported status
    /// is in-progress or the reported action is not the expected one; for
    /// updates, additionally while `updated_time` still equals the first
    /// observation's (a complete-looking snapshot taken before the update
    /// was accepted).
    pub fn still_pending(&mut self, view: &StackView) -> Result<bool, EngineError> {
        let (action, status) = split_action_status(&view.status)?;
        self.action = action.to_string();
        self.status = status.to_string();

        let mut pending = self.status == STATUS_IN_PROGRESS || self.action != self.expected_action;
        if self.expected_action == ACTION_UPDATE {
            pending = pending || self.initial_updated_time == view.updated_time;
        }
        Ok(pending)
    }

    pub fn is_fail(&self) -> bool {
        self.status == STATUS_FAILED
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == STATUS_IN_PROGRESS
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

/// Run-length-encoded history of observed status strings, kept per poll loop
/// for diagnostics only.
#[derive(Debug)]
pub struct StatusTransitions {
    transitions: Vec<String>,
    hits: Vec<u32>,
}

impl StatusTransitions {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            transitions: vec![status.into()],
            hits: vec![1],
        }
    }

    pub fn add(&mut self, status: &str) {
        if self.transitions.last().map(String::as_str) != Some(status) {
            self.transitions.push(status.to_string());
            self.hits.push(0);
        }
        if let Some(last) = self.hits.last_mut() {
            *last += 1;
        }
    }

    pub fn last(&self) -> &str {
        self.transitions
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for StatusTransitions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chunks: Vec<String> = self
            .transitions
            .iter()
            .zip(&self.hits)
            .map(|(status, hits)| {
                if *hits > 1 {
                    format!("{status}({hits})")
                } else {
                    status.clone()
                }
            })
            .collect();
        f.write_str(&chunks.join(" ~> "))
    }
}
