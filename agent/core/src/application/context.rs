// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared engine context.
//!
//! Owns the configuration and the collaborator handles every worker needs.
//! Built once at startup and passed down explicitly; a collaborator that
//! fails to initialize leaves its poison code here so that every worker
//! dispatched afterwards short-circuits with that error instead of touching
//! a half-initialized client.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::config::EngineConfig;
use crate::domain::error::{EngineError, ErrorCode};
use crate::domain::notification::ResultNotifier;
use crate::domain::orchestrator::StackOrchestrator;
use crate::domain::record::RecordStore;
use crate::domain::template::TemplateRepository;
use crate::infrastructure::notifier::HttpResultNotifier;
use crate::infrastructure::orchestrator::HttpStackOrchestrator;
use crate::infrastructure::template_repo::GitTemplateRepository;

pub struct EngineContext {
    config: EngineConfig,
    orchestrator: Option<Arc<dyn StackOrchestrator>>,
    template_repo: Option<Arc<dyn TemplateRepository>>,
    record_store: Arc<dyn RecordStore>,
    notifier: Option<Arc<dyn ResultNotifier>>,
    init_error: Option<ErrorCode>,
}

impl EngineContext {
    /// Builds the production context. Initialization happens exactly once;
    /// a failing dependency poisons the context rather than aborting, so the
    /// engine still accepts jobs and reports the failure per job.
    pub fn initialize(config: EngineConfig, record_store: Arc<dyn RecordStore>) -> Arc<Self> {
        info!("initializing engine collaborators");
        let mut init_error = None;

        let orchestrator: Option<Arc<dyn StackOrchestrator>> =
            match HttpStackOrchestrator::new(&config) {
                Ok(client) => Some(Arc::new(client)),
                Err(error) => {
                    error!(%error, "failed to initialize the orchestrator client");
                    init_error = Some(ErrorCode::ClientInit);
                    None
                }
            };

        let template_repo: Option<Arc<dyn TemplateRepository>> =
            Some(Arc::new(GitTemplateRepository::new(&config)));

        let notifier: Option<Arc<dyn ResultNotifier>> = match HttpResultNotifier::new(&config) {
            Ok(notifier) => Some(Arc::new(notifier)),
            Err(error) => {
                error!(%error, "failed to initialize the result transport");
                if init_error.is_none() {
                    init_error = Some(ErrorCode::TransportInit);
                }
                None
            }
        };

        Arc::new(Self {
            config,
            orchestrator,
            template_repo,
            record_store,
            notifier,
            init_error,
        })
    }

    /// Builds a context from explicit port implementations.
    pub fn with_ports(
        config: EngineConfig,
        orchestrator: Arc<dyn StackOrchestrator>,
        template_repo: Arc<dyn TemplateRepository>,
        record_store: Arc<dyn RecordStore>,
        notifier: Arc<dyn ResultNotifier>,
        init_error: Option<ErrorCode>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            orchestrator: Some(orchestrator),
            template_repo: Some(template_repo),
            record_store,
            notifier: Some(notifier),
            init_error,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Poison code recorded at initialization time, if any.
    pub fn init_error(&self) -> Option<ErrorCode> {
        self.init_error
    }

    pub fn orchestrator(&self) -> Result<Arc<dyn StackOrchestrator>, EngineError> {
        self.orchestrator.clone().ok_or(EngineError::ClientInit)
    }

    pub fn template_repo(&self) -> Result<Arc<dyn TemplateRepository>, EngineError> {
        self.template_repo.clone().ok_or(EngineError::RepoInit)
    }

    pub fn record_store(&self) -> Arc<dyn RecordStore> {
        self.record_store.clone()
    }

    pub fn notifier(&self) -> Result<Arc<dyn ResultNotifier>, EngineError> {
        self.notifier.clone().ok_or(EngineError::TransportInit)
    }
}
