// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-job stack operation worker.
//!
//! One worker owns one job's whole lifecycle: fetch the template, submit the
//! operation, poll the orchestrator to a terminal state, compensate a failed
//! create, persist the outcome exactly once, deliver the result notification,
//! clean up, deregister. Every failure funnels into the persisted outcome;
//! nothing escapes the lifecycle.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::application::context::EngineContext;
use crate::application::dispatcher::WorkerRegistry;
use crate::domain::error::{EngineError, RollbackOutcome};
use crate::domain::job::{JobDescriptor, Operation, WorkerHandle};
use crate::domain::notification::{NotificationPayload, NotifyContext, ResourceExtraMetadata};
use crate::domain::orchestrator::StackView;
use crate::domain::record::{Outcome, RecordStatus};
use crate::domain::status::{OperationStatusChecker, StatusTransitions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Completed,
    Failed,
}

pub struct StackWorker {
    handle: WorkerHandle,
    descriptor: JobDescriptor,
    context: Arc<EngineContext>,
    registry: Arc<WorkerRegistry>,
    state: Mutex<WorkerState>,
}

impl StackWorker {
    pub(crate) fn new(
        handle: WorkerHandle,
        descriptor: JobDescriptor,
        context: Arc<EngineContext>,
        registry: Arc<WorkerRegistry>,
    ) -> Self {
        Self {
            handle,
            descriptor,
            context,
            registry,
            state: Mutex::new(WorkerState::Created),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Executes the job lifecycle. Runs exactly once; the worker always
    /// reaches cleanup and deregistration, whichever path was taken.
    pub async fn run(&self) {
        {
            let mut state = self.state.lock();
            if *state != WorkerState::Created {
                warn!(handle = %self.handle, "worker lifecycle already consumed");
                return;
            }
            *state = WorkerState::Running;
        }
        debug!(
            handle = %self.handle,
            operation = %self.descriptor.operation,
            stack = %self.descriptor.stack_name,
            locator = %self.descriptor.template_locator,
            "worker starting"
        );

        let mut template_path: Option<PathBuf> = None;
        let mut failed = true;

        match self.check_engine_initialized().await {
            Ok(true) => {
                let result = self.fetch_and_execute(&mut template_path).await;
                failed = result.is_err();
                self.persist_outcome(result.err().as_ref()).await;
            }
            // Poisoned by a failed dependency initialization; the error
            // outcome is already written.
            Ok(false) => {}
            Err(store_error) => {
                error!(
                    handle = %self.handle,
                    %store_error,
                    "failed to persist the dependency-initialization error"
                );
            }
        }

        // Attempted on every path, even the short-circuited ones. A delivery
        // failure is a data-loss risk: the downstream consumer may never
        // learn this job's outcome.
        if let Err(delivery_error) = self.deliver_results().await {
            error!(
                handle = %self.handle,
                %delivery_error,
                "INCOMPLETE OPERATION: result delivery failed, the listener may never see this outcome"
            );
        }

        self.cleanup_template(template_path.as_deref());

        *self.state.lock() = if failed {
            WorkerState::Failed
        } else {
            WorkerState::Completed
        };

        if let Err(remove_error) = self.registry.remove(self.handle) {
            warn!(handle = %self.handle, %remove_error, "worker was already deregistered");
        }
        debug!(handle = %self.handle, "worker exiting");
    }

    /// Short-circuits a worker poisoned at context initialization: the
    /// dependency's error code is persisted as the outcome and no
    /// orchestrator interaction happens.
    async fn check_engine_initialized(&self) -> Result<bool, EngineError> {
        let Some(code) = self.descriptor.init_error else {
            return Ok(true);
        };
        debug!(handle = %self.handle, %code, "dependency initialization failed; recording error outcome");
        self.context
            .record_store()
            .update_status(
                &self.descriptor.correlation_id,
                RecordStatus::InternalError,
                Some(code),
                Some(code.description().to_string()),
            )
            .await?;
        Ok(false)
    }

    async fn fetch_and_execute(
        &self,
        template_path: &mut Option<PathBuf>,
    ) -> Result<(), EngineError> {
        *template_path = self.fetch_template().await?;
        self.execute_operation(template_path.as_deref()).await
    }

    /// Fetches the template when the operation submits one; delete needs none.
    async fn fetch_template(&self) -> Result<Option<PathBuf>, EngineError> {
        if !self.descriptor.operation.requires_template() {
            return Ok(None);
        }
        debug!(locator = %self.descriptor.template_locator, "fetching template");
        let repo = self.context.template_repo()?;
        repo.fetch(&self.descriptor.template_locator).await.map(Some)
    }

    async fn execute_operation(&self, template: Option<&Path>) -> Result<(), EngineError> {
        let operation = self.descriptor.operation;
        let stack = match operation {
            Operation::Create => self.create_stack(template).await?,
            Operation::Modify => self.update_stack(template).await?,
            Operation::Delete => self.delete_stack().await?,
        };

        match self.wait_for_completion(&stack, operation).await {
            Ok(()) => Ok(()),
            Err(EngineError::OperationFailed {
                operation,
                stack,
                details,
                rollback: _,
            }) if operation == Operation::Create => {
                let rollback = self.rollback().await;
                Err(EngineError::OperationFailed {
                    operation,
                    stack,
                    details,
                    rollback: Some(rollback),
                })
            }
            Err(error) => Err(error),
        }
    }

    async fn create_stack(&self, template: Option<&Path>) -> Result<StackView, EngineError> {
        let template = template.ok_or_else(|| EngineError::Internal {
            details: "create operation reached submission without a fetched template".to_string(),
        })?;
        debug!(stack = %self.descriptor.stack_name, "creating stack");
        let orchestrator = self.context.orchestrator()?;
        let created = orchestrator
            .create_stack(&self.descriptor.stack_name, template)
            .await?;
        orchestrator.get_stack(&created.id).await
    }

    async fn update_stack(&self, template: Option<&Path>) -> Result<StackView, EngineError> {
        let template = template.ok_or_else(|| EngineError::Internal {
            details: "modify operation reached submission without a fetched template".to_string(),
        })?;
        debug!(stack = %self.descriptor.stack_name, "updating stack");
        let orchestrator = self.context.orchestrator()?;
        let stack = orchestrator
            .find_stack_by_name(&self.descriptor.stack_name)
            .await?;
        orchestrator.update_stack(&stack.id, template).await?;
        // The pre-update view: its updated_time is the stale-snapshot guard
        // baseline for the poll loop.
        Ok(stack)
    }

    async fn delete_stack(&self) -> Result<StackView, EngineError> {
        info!(stack = %self.descriptor.stack_name, "deleting stack");
        let orchestrator = self.context.orchestrator()?;
        let stack = orchestrator
            .find_stack_by_name(&self.descriptor.stack_name)
            .await?;
        orchestrator.delete_stack(&stack.id).await?;
        Ok(stack)
    }

    /// Polls the orchestrator until the classifier reports a terminal state
    /// for the expected action, or the operation-class timeout elapses.
    async fn wait_for_completion(
        &self,
        initial: &StackView,
        operation: Operation,
    ) -> Result<(), EngineError> {
        let poll_interval = self.context.config().poll_interval;
        let max_wait = self.context.config().timeout_for(&self.descriptor);
        debug!(
            stack = %initial.name,
            %operation,
            poll_interval_ms = poll_interval.as_millis() as u64,
            max_wait = %format_interval(max_wait, false),
            "waiting for the orchestrator"
        );

        let orchestrator = self.context.orchestrator()?;
        let mut transitions = StatusTransitions::new(initial.status.clone());
        let mut checker = OperationStatusChecker::new(initial, operation)?;
        let mut current = initial.clone();
        let started = Instant::now();

        let mut pending = checker.still_pending(&current)?;
        while pending && started.elapsed() <= max_wait {
            sleep(poll_interval).await;
            current = orchestrator.get_stack(&current.id).await?;
            transitions.add(&current.status);
            debug!(
                handle = %self.handle,
                stack = %current.name,
                waited = %format_interval(started.elapsed(), false),
                %transitions,
                "stack status transition"
            );
            pending = checker.still_pending(&current)?;
        }

        debug!(
            handle = %self.handle,
            stack = %current.name,
            action = checker.action(),
            status = checker.status(),
            "done waiting for stack"
        );

        if pending {
            return Err(EngineError::Timeout {
                operation,
                stack: self.descriptor.stack_name.clone(),
            });
        }
        if checker.is_fail() {
            let details = current
                .status_reason
                .clone()
                .unwrap_or_else(|| current.status.clone());
            return Err(EngineError::OperationFailed {
                operation,
                stack: current.name.clone(),
                details,
                rollback: None,
            });
        }
        Ok(())
    }

    /// Compensating delete after a failed create, polled to its own terminal
    /// state. The outcome folds into the parent failure; it never raises.
    async fn rollback(&self) -> RollbackOutcome {
        info!(stack = %self.descriptor.stack_name, "create failed; rolling back with a compensating delete");
        let attempt = async {
            let stack = self.delete_stack().await?;
            self.wait_for_completion(&stack, Operation::Delete).await
        };
        match attempt.await {
            Ok(()) => RollbackOutcome::Succeeded,
            Err(error) => {
                error!(stack = %self.descriptor.stack_name, %error, "rollback delete failed");
                RollbackOutcome::Failed {
                    message: error.to_string(),
                }
            }
        }
    }

    /// Writes the job's one outcome record. Store failures are logged as
    /// critical and swallowed so the lifecycle still reaches cleanup.
    async fn persist_outcome(&self, failure: Option<&EngineError>) {
        let outcome = match failure {
            None => Outcome::success(),
            Some(error) => {
                error!(handle = %self.handle, %error, "operation failed");
                Outcome::from_error(error)
            }
        };
        if let Err(store_error) = self
            .context
            .record_store()
            .update_status(
                &self.descriptor.correlation_id,
                outcome.status,
                outcome.error_code,
                outcome.error_msg,
            )
            .await
        {
            error!(handle = %self.handle, %store_error, "failed to persist job outcome");
        }
    }

    /// Sends the result notification, then watches the record store for the
    /// downstream acknowledgement, resending on a dispatch error until the
    /// budget runs out. Exhaustion is logged, never escalated.
    async fn deliver_results(&self) -> Result<(), EngineError> {
        let store = self.context.record_store();
        let record = store
            .get_by_correlation(&self.descriptor.correlation_id)
            .await?
            .ok_or_else(|| EngineError::Internal {
                details: format!(
                    "no target record for correlation id {}",
                    self.descriptor.correlation_id
                ),
            })?;

        let mut payload = NotificationPayload::from_record(&record);
        let original_status = payload.status.clone();
        self.attach_image_metadata(&mut payload).await;

        let context = NotifyContext {
            request_id: record.request_id.clone(),
        };
        let notifier = self.context.notifier()?;
        debug!(request_id = %context.request_id, status = %payload.status, "sending result notification");
        notifier.send(&context, &payload).await;

        let budget = self.context.config().resend_retry_limit;
        let mut remaining = budget.saturating_sub(1);
        while remaining > 0 {
            sleep(self.context.config().resend_poll_interval).await;
            let current = store
                .get_by_correlation(&self.descriptor.correlation_id)
                .await?
                .ok_or_else(|| EngineError::Internal {
                    details: format!(
                        "target record vanished for correlation id {}",
                        self.descriptor.correlation_id
                    ),
                })?;

            if current.status == RecordStatus::DispatchError {
                debug!(remaining, "listener reported a dispatch error; resending result");
                payload.status = original_status.clone();
                notifier.send(&context, &payload).await;
            }
            if current.status == RecordStatus::DispatchSuccess {
                debug!("listener acknowledged the result");
                return Ok(());
            }
            remaining -= 1;
        }
        warn!(
            handle = %self.handle,
            budget,
            "resend budget exhausted without listener acknowledgement"
        );
        Ok(())
    }

    /// Best-effort image details for successful non-delete image operations.
    /// Failures here are swallowed; they must never change the outcome.
    async fn attach_image_metadata(&self, payload: &mut NotificationPayload) {
        if !self.descriptor.is_image_kind()
            || payload.status != RecordStatus::Success.as_str()
            || payload.resource_operation == Operation::Delete
        {
            return;
        }
        if let Err(error) = self.try_attach_image_metadata(payload).await {
            error!(%error, "unable to collect extra image metadata");
        }
    }

    async fn try_attach_image_metadata(
        &self,
        payload: &mut NotificationPayload,
    ) -> Result<(), EngineError> {
        let orchestrator = self.context.orchestrator()?;
        let stack = orchestrator
            .find_stack_by_name(&self.descriptor.stack_name)
            .await?;
        let resources = orchestrator.stack_resources(&stack.id).await?;
        let Some(image) = resources
            .iter()
            .filter(|resource| resource.resource_type.contains("Image"))
            .next_back()
        else {
            return Ok(());
        };
        let metadata = orchestrator.image_metadata(&image.physical_id).await?;
        payload.resource_extra_metadata = Some(ResourceExtraMetadata {
            checksum: metadata.checksum,
            size: metadata.size.to_string(),
            virtual_size: metadata.virtual_size.to_string(),
        });
        Ok(())
    }

    /// Removes the locally materialized template. Best-effort; never fatal.
    fn cleanup_template(&self, template: Option<&Path>) {
        let Some(path) = template else { return };
        info!(path = %path.display(), "removing local template copy");
        if path.is_file() {
            if let Err(remove_error) = std::fs::remove_file(path) {
                error!(path = %path.display(), %remove_error, "failed to remove local template copy");
            }
        }
    }
}

/// Renders a wait duration for diagnostics, largest unit first: `1h 0m 5s`,
/// `1s 500ms` with milliseconds enabled, `0ms` for an empty interval.
pub(crate) fn format_interval(delay: Duration, show_ms: bool) -> String {
    let mut remainder = delay.as_secs_f64();
    let mut chunks: Vec<f64> = Vec::new();
    let mut suffixes = vec!["ms", "s", "m", "h", "d"];

    for div in [1.0, 60.0, 60.0, 24.0] {
        if remainder == 0.0 {
            break;
        }
        chunks.push(remainder % div);
        remainder = (remainder / div).floor();
    }
    if remainder != 0.0 {
        chunks.push(remainder);
    }
    if !chunks.is_empty() {
        chunks[0] *= 1000.0;
        if !show_ms {
            chunks.remove(0);
            suffixes.remove(0);
        }
    }

    let rendered: Vec<String> = chunks
        .iter()
        .zip(&suffixes)
        .map(|(chunk, suffix)| format!("{}{suffix}", *chunk as u64))
        .rev()
        .collect();
    if rendered.is_empty() {
        return "0ms".to_string();
    }
    rendered.join(" ")
}
