//! The request/response contract with the orchestrator that triggers the
//! bootstrap. Field names follow the orchestrator's PascalCase wire format.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle tag carried by an invocation. Unknown tags are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    Create,
    Update,
    Delete,
    Other(String),
}

impl RequestType {
    pub fn as_str(&self) -> &str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
            RequestType::Other(tag) => tag,
        }
    }
}

impl From<String> for RequestType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "Create" => RequestType::Create,
            "Update" => RequestType::Update,
            "Delete" => RequestType::Delete,
            _ => RequestType::Other(tag),
        }
    }
}

impl From<RequestType> for String {
    fn from(request_type: RequestType) -> Self {
        match request_type {
            RequestType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event delivered by the orchestrator once the database is reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationEvent {
    #[schema(value_type = String, example = "Create")]
    pub request_type: RequestType,
    pub logical_resource_id: String,
    pub request_id: String,
    pub stack_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub resource_properties: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Failed,
}

/// Response handed back to the orchestrator; correlation ids are echoed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationResult {
    pub status: Status,
    pub reason: String,
    pub logical_resource_id: String,
    pub request_id: String,
    pub stack_id: String,
}

impl InvocationResult {
    pub fn success(event: &InvocationEvent) -> Self {
        Self::echo(event, Status::Success, String::new())
    }

    pub fn failed(event: &InvocationEvent, reason: impl Into<String>) -> Self {
        Self::echo(event, Status::Failed, reason.into())
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    fn echo(event: &InvocationEvent, status: Status, reason: String) -> Self {
        Self {
            status,
            reason,
            logical_resource_id: event.logical_resource_id.clone(),
            request_id: event.request_id.clone(),
            stack_id: event.stack_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> InvocationEvent {
        serde_json::from_value(json!({
            "RequestType": "Create",
            "ServiceToken": "arn:aws:lambda:us-east-1:000000000000:function:provider",
            "ResponseURL": "https://example.invalid/response",
            "StackId": "stack-1",
            "RequestId": "req-123",
            "LogicalResourceId": "res-abc",
            "ResourceType": "AWS::CloudFormation::CustomResource",
            "ResourceProperties": { "host": "cluster.internal" }
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_orchestrator_event() {
        let event = sample_event();
        assert_eq!(event.request_type, RequestType::Create);
        assert_eq!(event.request_id, "req-123");
        assert_eq!(event.logical_resource_id, "res-abc");
        assert_eq!(event.stack_id, "stack-1");
        assert_eq!(event.physical_resource_id, None);
        assert_eq!(
            event.resource_properties,
            Some(json!({ "host": "cluster.internal" }))
        );
    }

    #[test]
    fn unknown_request_type_is_preserved() {
        let event: InvocationEvent = serde_json::from_value(json!({
            "RequestType": "Refresh",
            "StackId": "s",
            "RequestId": "r",
            "LogicalResourceId": "l"
        }))
        .unwrap();
        assert_eq!(event.request_type, RequestType::Other("Refresh".into()));
        assert_eq!(
            serde_json::to_value(&event).unwrap()["RequestType"],
            "Refresh"
        );
    }

    #[test]
    fn missing_correlation_id_is_rejected() {
        let result: Result<InvocationEvent, _> = serde_json::from_value(json!({
            "RequestType": "Create",
            "StackId": "s",
            "LogicalResourceId": "l"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn result_echoes_correlation_ids() {
        let event = sample_event();
        let result = InvocationResult::success(&event);

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "Status": "SUCCESS",
                "Reason": "",
                "LogicalResourceId": "res-abc",
                "RequestId": "req-123",
                "StackId": "stack-1"
            })
        );
    }

    #[test]
    fn failed_result_carries_reason() {
        let result = InvocationResult::failed(&sample_event(), "connection refused");
        assert!(!result.is_success());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["Status"], "FAILED");
        assert_eq!(value["Reason"], "connection refused");
        assert_eq!(value["RequestId"], "req-123");
    }
}
