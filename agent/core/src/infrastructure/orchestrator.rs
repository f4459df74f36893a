// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST adapter for the stack orchestration service.
//!
//! Anti-corruption layer: wire shapes stay private here and every failure is
//! converted to the engine error for its action label.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::orchestrator::{
    ImageMetadata, StackId, StackOrchestrator, StackRef, StackResource, StackView,
};

pub struct HttpStackOrchestrator {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct CreateStackRequest<'a> {
    stack_name: &'a str,
    template: String,
}

#[derive(Serialize)]
struct UpdateStackRequest {
    template: String,
}

#[derive(Deserialize)]
struct StackEnvelope {
    stack: StackWire,
}

#[derive(Deserialize)]
struct StackListWire {
    stacks: Vec<StackWire>,
}

#[derive(Deserialize)]
struct StackWire {
    id: String,
    stack_name: String,
    stack_status: String,
    #[serde(default)]
    stack_status_reason: Option<String>,
    #[serde(default)]
    updated_time: Option<String>,
}

impl From<StackWire> for StackView {
    fn from(wire: StackWire) -> Self {
        StackView {
            id: StackId::new(wire.id),
            name: wire.stack_name,
            status: wire.stack_status,
            status_reason: wire.stack_status_reason,
            updated_time: wire.updated_time,
        }
    }
}

#[derive(Deserialize)]
struct ResourceListWire {
    resources: Vec<ResourceWire>,
}

#[derive(Deserialize)]
struct ResourceWire {
    resource_type: String,
    physical_resource_id: String,
}

#[derive(Deserialize)]
struct ImageWire {
    checksum: String,
    size: u64,
    virtual_size: u64,
}

fn error_for(action: &str, details: String) -> EngineError {
    match action {
        "stacks.create" => EngineError::StackCreate { details },
        "stacks.update" => EngineError::StackModify { details },
        "stacks.delete" => EngineError::StackDelete { details },
        _ => EngineError::Integration {
            action: action.to_string(),
            details,
        },
    }
}

fn load_template(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|e| EngineError::Internal {
        details: format!("can't load {}: {e}", path.display()),
    })
}

impl HttpStackOrchestrator {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::with_endpoint(&config.orchestrator_endpoint)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self, EngineError> {
        reqwest::Url::parse(endpoint).map_err(|_| EngineError::ClientInit)?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/v1/{suffix}", self.endpoint)
    }

    async fn check(
        &self,
        action: &str,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, EngineError> {
        let response = result.map_err(|e| error_for(action, e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(error_for(action, format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl StackOrchestrator for HttpStackOrchestrator {
    async fn create_stack(&self, name: &str, template: &Path) -> Result<StackRef, EngineError> {
        let action = "stacks.create";
        let request = CreateStackRequest {
            stack_name: name,
            template: load_template(template)?,
        };
        let result = self
            .client
            .post(self.url("stacks"))
            .json(&request)
            .send()
            .await;
        let envelope: StackEnvelope = self
            .check(action, result)
            .await?
            .json()
            .await
            .map_err(|e| error_for(action, e.to_string()))?;
        Ok(StackRef {
            id: StackId::new(envelope.stack.id),
        })
    }

    async fn update_stack(&self, id: &StackId, template: &Path) -> Result<(), EngineError> {
        let action = "stacks.update";
        let request = UpdateStackRequest {
            template: load_template(template)?,
        };
        let result = self
            .client
            .put(self.url(&format!("stacks/{id}")))
            .json(&request)
            .send()
            .await;
        self.check(action, result).await?;
        Ok(())
    }

    async fn delete_stack(&self, id: &StackId) -> Result<(), EngineError> {
        let result = self
            .client
            .delete(self.url(&format!("stacks/{id}")))
            .send()
            .await;
        self.check("stacks.delete", result).await?;
        Ok(())
    }

    async fn get_stack(&self, id: &StackId) -> Result<StackView, EngineError> {
        let action = "stacks.get";
        let result = self.client.get(self.url(&format!("stacks/{id}"))).send().await;
        let wire: StackWire = self
            .check(action, result)
            .await?
            .json()
            .await
            .map_err(|e| error_for(action, e.to_string()))?;
        Ok(wire.into())
    }

    async fn find_stack_by_name(&self, name: &str) -> Result<StackView, EngineError> {
        self.list_stacks()
            .await?
            .into_iter()
            .find(|stack| stack.name == name)
            .ok_or_else(|| EngineError::StackLookup {
                query: format!("name={name:?}"),
            })
    }

    async fn list_stacks(&self) -> Result<Vec<StackView>, EngineError> {
        let action = "stacks.list";
        let result = self.client.get(self.url("stacks")).send().await;
        let wire: StackListWire = self
            .check(action, result)
            .await?
            .json()
            .await
            .map_err(|e| error_for(action, e.to_string()))?;
        Ok(wire.stacks.into_iter().map(StackView::from).collect())
    }

    async fn stack_resources(&self, id: &StackId) -> Result<Vec<StackResource>, EngineError> {
        let action = "stacks.resources";
        let result = self
            .client
            .get(self.url(&format!("stacks/{id}/resources")))
            .send()
            .await;
        let wire: ResourceListWire = self
            .check(action, result)
            .await?
            .json()
            .await
            .map_err(|e| error_for(action, e.to_string()))?;
        Ok(wire
            .resources
            .into_iter()
            .map(|resource| StackResource {
                resource_type: resource.resource_type,
                physical_id: resource.physical_resource_id,
            })
            .collect())
    }

    async fn image_metadata(&self, image_id: &str) -> Result<ImageMetadata, EngineError> {
        let action = "images.get";
        let result = self
            .client
            .get(self.url(&format!("images/{image_id}")))
            .send()
            .await;
        let wire: ImageWire = self
            .check(action, result)
            .await?
            .json()
            .await
            .map_err(|e| error_for(action, e.to_string()))?;
        Ok(ImageMetadata {
            checksum: wire.checksum,
            size: wire.size,
            virtual_size: wire.virtual_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;
    use std::io::Write;

    fn template_file(payload: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(payload.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn create_stack_returns_the_new_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/stacks")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "stack_name": "demo",
                "template": "resources: {}",
            })))
            .with_status(200)
            .with_body(r#"{"stack": {"id": "s-1", "stack_name": "demo", "stack_status": "CREATE_IN_PROGRESS"}}"#)
            .create_async()
            .await;

        let client = HttpStackOrchestrator::with_endpoint(&server.url()).unwrap();
        let template = template_file("resources: {}");
        let created = client.create_stack("demo", template.path()).await.unwrap();

        mock.assert_async().await;
        assert_eq!("s-1", created.id.as_str());
    }

    #[tokio::test]
    async fn create_stack_failure_maps_to_create_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/stacks")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = HttpStackOrchestrator::with_endpoint(&server.url()).unwrap();
        let template = template_file("resources: {}");
        let err = client.create_stack("demo", template.path()).await.unwrap_err();

        assert!(matches!(err, EngineError::StackCreate { .. }));
        assert_eq!(ErrorCode::StackCreateFailed, err.code());
    }

    #[tokio::test]
    async fn get_stack_maps_wire_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/stacks/s-1")
            .with_status(200)
            .with_body(
                r#"{"id": "s-1", "stack_name": "demo", "stack_status": "UPDATE_COMPLETE",
                    "stack_status_reason": "done", "updated_time": "2026-06-02T16:30:00Z"}"#,
            )
            .create_async()
            .await;

        let client = HttpStackOrchestrator::with_endpoint(&server.url()).unwrap();
        let view = client.get_stack(&StackId::new("s-1")).await.unwrap();

        assert_eq!("demo", view.name);
        assert_eq!("UPDATE_COMPLETE", view.status);
        assert_eq!(Some("2026-06-02T16:30:00Z".to_string()), view.updated_time);
    }

    #[tokio::test]
    async fn find_stack_by_name_reports_lookup_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/stacks")
            .with_status(200)
            .with_body(r#"{"stacks": [{"id": "s-2", "stack_name": "other", "stack_status": "CREATE_COMPLETE"}]}"#)
            .create_async()
            .await;

        let client = HttpStackOrchestrator::with_endpoint(&server.url()).unwrap();
        let err = client.find_stack_by_name("demo").await.unwrap_err();

        assert!(matches!(err, EngineError::StackLookup { .. }));
        assert_eq!(ErrorCode::StackNotFound, err.code());
    }

    #[tokio::test]
    async fn image_metadata_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/images/img-1")
            .with_status(200)
            .with_body(r#"{"checksum": "dae557b1", "size": 10, "virtual_size": 12}"#)
            .create_async()
            .await;

        let client = HttpStackOrchestrator::with_endpoint(&server.url()).unwrap();
        let metadata = client.image_metadata("img-1").await.unwrap();

        assert_eq!("dae557b1", metadata.checksum);
        assert_eq!(10, metadata.size);
        assert_eq!(12, metadata.virtual_size);
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(HttpStackOrchestrator::with_endpoint("not a url").is_err());
    }
}
