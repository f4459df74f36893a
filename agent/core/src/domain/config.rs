// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Engine configuration.
//!
//! Loaded from a YAML file; every field has a default so a partial file (or
//! none at all) yields a working local configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::error::EngineError;
use crate::domain::job::JobDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Base URL of the stack orchestration service.
    pub orchestrator_endpoint: String,

    /// Endpoint of the downstream status listener.
    pub listener_endpoint: String,

    /// Remote template repository URL.
    pub template_repo_url: String,

    /// Local clone of the template repository.
    pub template_repo_dir: PathBuf,

    /// Region label echoed in result notifications.
    pub region: String,

    /// Delay between two consecutive stack status reads.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Delay between two reads of the record store while waiting for the
    /// downstream listener to acknowledge a result.
    #[serde(with = "humantime_serde")]
    pub resend_poll_interval: Duration,

    /// Total send budget for one result notification (first send included).
    pub resend_retry_limit: u32,

    /// Attempts per template fetch before its failure is classified.
    pub fetch_retry_limit: u32,

    /// Budget for a single template repository operation.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Max wait for a stack operation to reach a terminal state.
    #[serde(with = "humantime_serde")]
    pub stack_timeout: Duration,

    /// Max wait for image-kind resources, which build far slower.
    #[serde(with = "humantime_serde")]
    pub image_stack_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            orchestrator_endpoint: "http://127.0.0.1:8004".to_string(),
            listener_endpoint: "http://127.0.0.1:8777/v1/listener".to_string(),
            template_repo_url: String::new(),
            template_repo_dir: PathBuf::from("/var/lib/stackd/templates"),
            region: "local".to_string(),
            poll_interval: Duration::from_secs(5),
            resend_poll_interval: Duration::from_secs(10),
            resend_retry_limit: 3,
            fetch_retry_limit: 5,
            fetch_timeout: Duration::from_secs(15),
            stack_timeout: Duration::from_secs(1200),
            image_stack_timeout: Duration::from_secs(14400),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Internal {
            details: format!("can't load {}: {e}", path.display()),
        })?;
        serde_yaml::from_str(&raw).map_err(|e| EngineError::Internal {
            details: format!("invalid configuration {}: {e}", path.display()),
        })
    }

    /// Poll budget for one job: image-kind resources get the long class.
    pub fn timeout_for(&self, descriptor: &JobDescriptor) -> Duration {
        if descriptor.is_image_kind() {
            self.image_stack_timeout
        } else {
            self.stack_timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{Operation, TEMPLATE_KIND_STACK};

    fn descriptor(resource_kind: &str) -> JobDescriptor {
        JobDescriptor {
            operation: Operation::Create,
            template_locator: "demo.yaml".to_string(),
            stack_name: "demo".to_string(),
            correlation_id: "1".to_string(),
            resource_kind: resource_kind.to_string(),
            template_kind: TEMPLATE_KIND_STACK.to_string(),
            init_error: None,
        }
    }

    #[test]
    fn defaults_match_operational_baseline() {
        let config = EngineConfig::default();
        assert_eq!(Duration::from_secs(5), config.poll_interval);
        assert_eq!(Duration::from_secs(10), config.resend_poll_interval);
        assert_eq!(3, config.resend_retry_limit);
        assert_eq!(Duration::from_secs(1200), config.stack_timeout);
        assert_eq!(Duration::from_secs(14400), config.image_stack_timeout);
    }

    #[test]
    fn image_kind_selects_long_timeout() {
        let config = EngineConfig::default();
        assert_eq!(
            config.image_stack_timeout,
            config.timeout_for(&descriptor("Image"))
        );
        assert_eq!(config.stack_timeout, config.timeout_for(&descriptor("flavor")));
    }

    #[test]
    fn partial_yaml_overlays_defaults() {
        let config: EngineConfig =
            serde_yaml::from_str("poll_interval: 1s\nregion: east\n").unwrap();
        assert_eq!(Duration::from_secs(1), config.poll_interval);
        assert_eq!("east", config.region);
        assert_eq!(3, config.resend_retry_limit);
    }
}
