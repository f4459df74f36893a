// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Result notification payload and transport port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::job::Operation;
use crate::domain::record::TargetRecord;

/// Payload delivered to the downstream status listener. Echoes the original
/// request's identifying fields plus the final outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotificationPayload {
    pub request_id: String,
    pub resource_id: String,
    pub resource_type: String,
    pub resource_template_version: Option<String>,
    pub resource_template_kind: String,
    pub resource_operation: Operation,
    pub correlation_id: String,
    pub region: String,
    pub status: String,
    pub error_code: Option<String>,
    pub error_msg: Option<String>,
    /// Best-effort image details attached to successful non-delete image
    /// operations; absent everywhere else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_extra_metadata: Option<ResourceExtraMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceExtraMetadata {
    pub checksum: String,
    pub size: String,
    pub virtual_size: String,
}

impl NotificationPayload {
    pub fn from_record(record: &TargetRecord) -> Self {
        Self {
            request_id: record.request_id.clone(),
            resource_id: record.resource_id.clone(),
            resource_type: record.resource_type.clone(),
            resource_template_version: record.resource_template_version.clone(),
            resource_template_kind: record.template_kind.clone(),
            resource_operation: record.operation,
            correlation_id: record.correlation_id.clone(),
            region: record.region.clone(),
            status: record.status.as_str().to_string(),
            error_code: record.error_code.map(|code| code.as_str().to_string()),
            error_msg: record.error_msg.clone(),
            resource_extra_metadata: None,
        }
    }
}

/// Delivery context forwarded alongside each notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyContext {
    pub request_id: String,
}

/// Fire-and-forget transport towards the downstream listener. Delivery is
/// not acknowledged at this layer; implementations log failures and return.
#[async_trait]
pub trait ResultNotifier: Send + Sync {
    async fn send(&self, context: &NotifyContext, payload: &NotificationPayload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;
    use crate::domain::record::RecordStatus;
    use chrono::Utc;

    fn record() -> TargetRecord {
        TargetRecord {
            correlation_id: "corr-1".to_string(),
            request_id: "req-1".to_string(),
            resource_id: "res-1".to_string(),
            resource_type: "image".to_string(),
            resource_template_version: Some("2".to_string()),
            template_kind: "stack".to_string(),
            operation: Operation::Create,
            region: "local".to_string(),
            status: RecordStatus::Success,
            error_code: Some(ErrorCode::StackCreateFailed),
            error_msg: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn payload_echoes_record_fields() {
        let payload = NotificationPayload::from_record(&record());
        assert_eq!("req-1", payload.request_id);
        assert_eq!("Success", payload.status);
        assert_eq!(Some("STK_000".to_string()), payload.error_code);
        assert!(payload.resource_extra_metadata.is_none());
    }

    #[test]
    fn payload_serializes_with_wire_names() {
        let payload = NotificationPayload::from_record(&record());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!("create", value["resource-operation"]);
        assert_eq!("corr-1", value["correlation-id"]);
        assert!(value.get("resource-extra-metadata").is_none());
    }
}
