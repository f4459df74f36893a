// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fire-and-forget HTTP notifier towards the downstream status listener.
//!
//! Delivery is unacknowledged at this layer; failures are logged and
//! swallowed. The worker's confirmation loop decides whether to resend.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::domain::config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::notification::{NotificationPayload, NotifyContext, ResultNotifier};

pub struct HttpResultNotifier {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct ListenerEnvelope<'a> {
    context: &'a NotifyContext,
    #[serde(rename = "status-listener")]
    listener: &'a NotificationPayload,
}

impl HttpResultNotifier {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::with_endpoint(&config.listener_endpoint)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self, EngineError> {
        reqwest::Url::parse(endpoint).map_err(|_| EngineError::TransportInit)?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ResultNotifier for HttpResultNotifier {
    async fn send(&self, context: &NotifyContext, payload: &NotificationPayload) {
        let envelope = ListenerEnvelope {
            context,
            listener: payload,
        };
        match self.client.post(&self.endpoint).json(&envelope).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(request_id = %context.request_id, "result notification delivered");
            }
            Ok(response) => {
                warn!(
                    request_id = %context.request_id,
                    status = %response.status(),
                    "listener rejected the result notification"
                );
            }
            Err(send_error) => {
                error!(request_id = %context.request_id, %send_error, "failed to deliver result notification");
            }
        }
    }
}
