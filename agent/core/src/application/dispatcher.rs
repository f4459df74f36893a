// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Worker dispatch and registry.
//!
//! The registry is the only shared mutable state in the engine. Register,
//! lookup, and remove are each a single critical section under one mutex,
//! because dispatch and worker completion race across in-flight jobs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::context::EngineContext;
use crate::application::worker::StackWorker;
use crate::domain::error::EngineError;
use crate::domain::job::{JobDescriptor, WorkerHandle, TEMPLATE_KIND_PLAYBOOK, TEMPLATE_KIND_STACK};

/// Handle-to-worker map. At most one live worker per handle; a handle stops
/// resolving the moment its worker deregisters.
pub(crate) struct WorkerRegistry {
    workers: Mutex<HashMap<WorkerHandle, Arc<StackWorker>>>,
}

impl WorkerRegistry {
    fn new() -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, handle: WorkerHandle, worker: Arc<StackWorker>) {
        self.workers.lock().insert(handle, worker);
    }

    fn get(&self, handle: WorkerHandle) -> Result<Arc<StackWorker>, EngineError> {
        self.workers
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(EngineError::WorkerNotFound { handle })
    }

    pub(crate) fn remove(&self, handle: WorkerHandle) -> Result<(), EngineError> {
        match self.workers.lock().remove(&handle) {
            Some(_) => {
                debug!(%handle, "worker deregistered");
                Ok(())
            }
            None => Err(EngineError::WorkerNotFound { handle }),
        }
    }

    fn len(&self) -> usize {
        self.workers.lock().len()
    }
}

pub struct WorkerDispatcher {
    context: Arc<EngineContext>,
    registry: Arc<WorkerRegistry>,
}

impl WorkerDispatcher {
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self {
            context,
            registry: Arc::new(WorkerRegistry::new()),
        }
    }

    /// Registers a worker for the job and returns its handle.
    ///
    /// Fails fast on an unsupported template kind, before anything is
    /// registered. The playbook kind is accepted at the boundary but not
    /// dispatched, so it yields no handle.
    pub fn dispatch(
        &self,
        mut descriptor: JobDescriptor,
    ) -> Result<Option<WorkerHandle>, EngineError> {
        let kind = descriptor.template_kind.to_ascii_lowercase();
        match kind.as_str() {
            TEMPLATE_KIND_STACK => {
                if descriptor.init_error.is_none() {
                    descriptor.init_error = self.context.init_error();
                }
                let handle = WorkerHandle::new();
                let worker = StackWorker::new(
                    handle,
                    descriptor,
                    self.context.clone(),
                    self.registry.clone(),
                );
                self.registry.insert(handle, Arc::new(worker));
                info!(%handle, "worker registered");
                Ok(Some(handle))
            }
            TEMPLATE_KIND_PLAYBOOK => {
                debug!(
                    correlation_id = %descriptor.correlation_id,
                    "playbook job accepted but not dispatched"
                );
                Ok(None)
            }
            _ => Err(EngineError::UnsupportedTemplateKind {
                kind: descriptor.template_kind,
            }),
        }
    }

    /// Starts the worker's asynchronous lifecycle. A missing handle means the
    /// job's identity is no longer valid (completed or never registered).
    pub fn execute(&self, handle: WorkerHandle) -> Result<JoinHandle<()>, EngineError> {
        let worker = self.registry.get(handle)?;
        Ok(tokio::spawn(async move { worker.run().await }))
    }

    /// Deregisters a handle. Workers call this themselves as their final
    /// action; anything else racing here sees `WorkerNotFound`.
    pub fn remove(&self, handle: WorkerHandle) -> Result<(), EngineError> {
        self.registry.remove(handle)
    }

    pub fn active_workers(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::EngineConfig;
    use crate::domain::job::Operation;
    use crate::domain::notification::{NotificationPayload, NotifyContext, ResultNotifier};
    use crate::domain::orchestrator::{
        ImageMetadata, StackId, StackOrchestrator, StackRef, StackResource, StackView,
    };
    use crate::domain::template::TemplateRepository;
    use crate::infrastructure::record_store::InMemoryRecordStore;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    struct UnreachableOrchestrator;

    #[async_trait]
    impl StackOrchestrator for UnreachableOrchestrator {
        async fn create_stack(&self, _: &str, _: &Path) -> Result<StackRef, EngineError> {
            Err(EngineError::ClientInit)
        }
        async fn update_stack(&self, _: &StackId, _: &Path) -> Result<(), EngineError> {
            Err(EngineError::ClientInit)
        }
        async fn delete_stack(&self, _: &StackId) -> Result<(), EngineError> {
            Err(EngineError::ClientInit)
        }
        async fn get_stack(&self, _: &StackId) -> Result<StackView, EngineError> {
            Err(EngineError::ClientInit)
        }
        async fn find_stack_by_name(&self, _: &str) -> Result<StackView, EngineError> {
            Err(EngineError::ClientInit)
        }
        async fn list_stacks(&self) -> Result<Vec<StackView>, EngineError> {
            Err(EngineError::ClientInit)
        }
        async fn stack_resources(&self, _: &StackId) -> Result<Vec<StackResource>, EngineError> {
            Err(EngineError::ClientInit)
        }
        async fn image_metadata(&self, _: &str) -> Result<ImageMetadata, EngineError> {
            Err(EngineError::ClientInit)
        }
    }

    struct UnreachableTemplateRepo;

    #[async_trait]
    impl TemplateRepository for UnreachableTemplateRepo {
        async fn fetch(&self, _: &str) -> Result<PathBuf, EngineError> {
            Err(EngineError::RepoInit)
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl ResultNotifier for SilentNotifier {
        async fn send(&self, _: &NotifyContext, _: &NotificationPayload) {}
    }

    fn dispatcher() -> WorkerDispatcher {
        let context = EngineContext::with_ports(
            EngineConfig::default(),
            Arc::new(UnreachableOrchestrator),
            Arc::new(UnreachableTemplateRepo),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(SilentNotifier),
            None,
        );
        WorkerDispatcher::new(context)
    }

    fn descriptor(template_kind: &str) -> JobDescriptor {
        JobDescriptor {
            operation: Operation::Create,
            template_locator: "region/stack/flavor/demo.yaml".to_string(),
            stack_name: "demo".to_string(),
            correlation_id: "corr-1".to_string(),
            resource_kind: "flavor".to_string(),
            template_kind: template_kind.to_string(),
            init_error: None,
        }
    }

    #[tokio::test]
    async fn dispatch_registers_one_worker() {
        let dispatcher = dispatcher();
        let handle = dispatcher.dispatch(descriptor("stack")).unwrap();
        assert!(handle.is_some());
        assert_eq!(1, dispatcher.active_workers());
    }

    #[tokio::test]
    async fn unsupported_kind_never_registers() {
        let dispatcher = dispatcher();
        let err = dispatcher.dispatch(descriptor("shell")).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTemplateKind { .. }));
        assert_eq!(0, dispatcher.active_workers());
    }

    #[tokio::test]
    async fn playbook_kind_is_accepted_without_a_worker() {
        let dispatcher = dispatcher();
        let handle = dispatcher.dispatch(descriptor("playbook")).unwrap();
        assert!(handle.is_none());
        assert_eq!(0, dispatcher.active_workers());
    }

    #[tokio::test]
    async fn execute_unknown_handle_fails() {
        let dispatcher = dispatcher();
        let err = dispatcher.execute(WorkerHandle::new()).unwrap_err();
        assert!(matches!(err, EngineError::WorkerNotFound { .. }));
    }

    #[tokio::test]
    async fn remove_unknown_handle_fails() {
        let dispatcher = dispatcher();
        let err = dispatcher.remove(WorkerHandle::new()).unwrap_err();
        assert!(matches!(err, EngineError::WorkerNotFound { .. }));
    }

    #[tokio::test]
    async fn remove_is_single_shot() {
        let dispatcher = dispatcher();
        let handle = dispatcher.dispatch(descriptor("stack")).unwrap().unwrap();
        dispatcher.remove(handle).unwrap();
        assert!(dispatcher.remove(handle).is_err());
        assert_eq!(0, dispatcher.active_workers());
    }
}
