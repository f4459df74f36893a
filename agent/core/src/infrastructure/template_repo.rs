// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Git-backed template repository client.
//!
//! Keeps one local clone per agent, refreshed with a fetch before every
//! checkout. The stale local copy of a template is removed before it is
//! materialized again, so a failed checkout can never leave an old version
//! behind for the worker to submit.

use async_trait::async_trait;
use git2::{ErrorClass, ErrorCode as GitErrorCode, Repository};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::template::TemplateRepository;

const REMOTE_NAME: &str = "origin";
const FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

const LABEL_PULL: &str = "PullTemplate";

pub struct GitTemplateRepository {
    remote_url: String,
    local_dir: PathBuf,
    fetch_timeout: Duration,
    retry_limit: u32,
}

impl GitTemplateRepository {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            remote_url: config.template_repo_url.clone(),
            local_dir: config.template_repo_dir.clone(),
            fetch_timeout: config.fetch_timeout,
            retry_limit: config.fetch_retry_limit.max(1),
        }
    }

    fn pull_once(
        remote_url: &str,
        local_dir: &Path,
        locator: &str,
    ) -> Result<PathBuf, EngineError> {
        let repo = open_or_init(local_dir)?;

        let mut remote = match repo.find_remote(REMOTE_NAME) {
            Ok(remote) => remote,
            Err(_) => repo
                .remote(REMOTE_NAME, remote_url)
                .map_err(|e| classify(LABEL_PULL, &e))?,
        };
        remote
            .fetch(&[FETCH_REFSPEC], None, None)
            .map_err(|e| classify(LABEL_PULL, &e))?;
        drop(remote);

        // Drop the previous version before checking the fresh one out.
        let target = local_dir.join(locator);
        if target.is_file() {
            std::fs::remove_file(&target).map_err(|e| EngineError::RepoUnknown {
                label: LABEL_PULL.to_string(),
                details: e.to_string(),
            })?;
        }

        let fetch_head = repo
            .revparse_single("FETCH_HEAD")
            .map_err(|e| classify(LABEL_PULL, &e))?;
        let commit = fetch_head
            .peel_to_commit()
            .map_err(|e| classify(LABEL_PULL, &e))?;
        let tree = commit.tree().map_err(|e| classify(LABEL_PULL, &e))?;
        let entry = tree
            .get_path(Path::new(locator))
            .map_err(|_| EngineError::FileNotInRepo {
                label: LABEL_PULL.to_string(),
            })?;
        let blob = entry
            .to_object(&repo)
            .and_then(|object| object.peel_to_blob())
            .map_err(|e| classify(LABEL_PULL, &e))?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::RepoUnknown {
                label: LABEL_PULL.to_string(),
                details: e.to_string(),
            })?;
        }
        std::fs::write(&target, blob.content()).map_err(|e| EngineError::RepoUnknown {
            label: LABEL_PULL.to_string(),
            details: e.to_string(),
        })?;
        Ok(target)
    }
}

#[async_trait]
impl TemplateRepository for GitTemplateRepository {
    async fn fetch(&self, locator: &str) -> Result<PathBuf, EngineError> {
        debug!(locator, "template pull initiated");
        let mut last_error = EngineError::RepoInit;

        for attempt in 1..=self.retry_limit {
            let remote_url = self.remote_url.clone();
            let local_dir = self.local_dir.clone();
            let locator = locator.to_string();
            let work = tokio::task::spawn_blocking(move || {
                Self::pull_once(&remote_url, &local_dir, &locator)
            });

            match timeout(self.fetch_timeout, work).await {
                Ok(Ok(Ok(path))) => {
                    debug!(path = %path.display(), "template pull completed");
                    return Ok(path);
                }
                Ok(Ok(Err(error))) => {
                    warn!(attempt, retry_limit = self.retry_limit, %error, "template pull failed");
                    last_error = error;
                }
                Ok(Err(join_error)) => {
                    warn!(attempt, %join_error, "template pull task aborted");
                    last_error = EngineError::Unexpected {
                        details: join_error.to_string(),
                    };
                }
                Err(_) => {
                    warn!(
                        attempt,
                        timeout_secs = self.fetch_timeout.as_secs(),
                        "template pull exceeded its time budget"
                    );
                    last_error = EngineError::RepoTimeout {
                        label: LABEL_PULL.to_string(),
                    };
                }
            }
        }
        Err(last_error)
    }
}

fn open_or_init(local_dir: &Path) -> Result<Repository, EngineError> {
    if let Ok(repo) = Repository::open(local_dir) {
        return Ok(repo);
    }
    info!(path = %local_dir.display(), "initializing local template repository");
    Repository::init(local_dir).map_err(|e| classify("RepoInit", &e))
}

/// Maps a git error to the engine's fetch error kinds: bad URL, missing
/// repository, permission denied, or unknown.
fn classify(label: &str, error: &git2::Error) -> EngineError {
    let label = label.to_string();
    match (error.class(), error.code()) {
        (_, GitErrorCode::Auth) | (ErrorClass::Ssh, _) => EngineError::RepoPermission { label },
        (ErrorClass::Net, GitErrorCode::NotFound) => EngineError::RepoMissing { label },
        (ErrorClass::Net, _) | (ErrorClass::Http, _) => EngineError::RepoUrl { label },
        (ErrorClass::Repository, _) | (ErrorClass::Odb, _) if error.code() == GitErrorCode::NotFound => {
            EngineError::RepoMissing { label }
        }
        _ => EngineError::RepoUnknown {
            label,
            details: error.message().to_string(),
        },
    }
}
