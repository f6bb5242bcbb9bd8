//! Transformation mapper.
//!
//! Pure translation between the client-facing envelope and the payload each
//! backend's native API expects, and back again:
//!
//! | style          | request                                              | response            |
//! |----------------|------------------------------------------------------|---------------------|
//! | direct compute | body passed through to the invoke API                | response template   |
//! | queue          | `Action=SendMessage&MessageBody=<url-encoded JSON>`  | fixed 200           |
//! | event bus      | `{"Entries":[{"Source",..,"Detail":"<JSON>"}]}`      | fixed 200           |
//! | workflow       | `{"input":"<JSON>","stateMachineArn":..}`            | fixed 200           |
//!
//! Backend failures are forwarded unmodified. Nothing here performs I/O or
//! touches shared state, so every function may be called concurrently.
use bytes::Bytes;
use http::{HeaderName, HeaderValue};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::core::{
    envelope::{APPLICATION_JSON, BackendPayload, BackendResponse, ClientResponse, RequestEnvelope},
    integration::{Integration, IntegrationStyle},
    template::url_encode,
};

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const AMZ_JSON_1_0: &str = "application/x-amz-json-1.0";
pub const AMZ_JSON_1_1: &str = "application/x-amz-json-1.1";

const AMZ_TARGET: &str = "x-amz-target";
const PUT_EVENTS_TARGET: &str = "AWSEvents.PutEvents";
const START_EXECUTION_TARGET: &str = "AWSStepFunctions.StartExecution";

/// Header set by the compute backend when the invoked function itself failed.
pub const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";

/// Error type for request mapping
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MappingError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Translate a client request into the payload the route's backend expects.
pub fn map_request(
    integration: &Integration,
    envelope: &RequestEnvelope,
) -> Result<BackendPayload, MappingError> {
    let payload = match integration {
        Integration::DirectCompute { function_name, .. } => BackendPayload {
            style: IntegrationStyle::DirectCompute,
            path: invoke_path(function_name),
            content_type: envelope
                .content_type()
                .unwrap_or(APPLICATION_JSON)
                .to_string(),
            headers: Vec::new(),
            body: envelope.body.clone(),
        },
        Integration::Queue { queue_path } => {
            let message = compact_body(envelope)?;
            BackendPayload {
                style: IntegrationStyle::Queue,
                path: queue_resource_path(queue_path),
                content_type: FORM_URLENCODED.to_string(),
                headers: Vec::new(),
                body: Bytes::from(format!(
                    "Action=SendMessage&MessageBody={}",
                    url_encode(&message)
                )),
            }
        }
        Integration::EventBus {
            source,
            detail_type,
            event_bus_name,
        } => {
            let mut entry = Map::new();
            entry.insert("Source".into(), Value::String(source.clone()));
            entry.insert("DetailType".into(), Value::String(detail_type.clone()));
            entry.insert("Detail".into(), Value::String(compact_body(envelope)?));
            if let Some(bus) = event_bus_name {
                entry.insert("EventBusName".into(), Value::String(bus.clone()));
            }
            BackendPayload {
                style: IntegrationStyle::EventBus,
                path: "/".to_string(),
                content_type: AMZ_JSON_1_1.to_string(),
                headers: vec![amz_target(PUT_EVENTS_TARGET)],
                body: Bytes::from(json!({ "Entries": [Value::Object(entry)] }).to_string()),
            }
        }
        Integration::Workflow { state_machine_arn } => BackendPayload {
            style: IntegrationStyle::Workflow,
            path: "/".to_string(),
            content_type: AMZ_JSON_1_0.to_string(),
            headers: vec![amz_target(START_EXECUTION_TARGET)],
            body: Bytes::from(
                json!({
                    "input": compact_body(envelope)?,
                    "stateMachineArn": state_machine_arn,
                })
                .to_string(),
            ),
        },
    };

    Ok(payload)
}

/// Forward a request untransformed to the route's backend action. Used when
/// the request's content type has no mapping template and passthrough is allowed.
pub fn passthrough_request(integration: &Integration, envelope: &RequestEnvelope) -> BackendPayload {
    let (path, headers) = match integration {
        Integration::DirectCompute { function_name, .. } => (invoke_path(function_name), Vec::new()),
        Integration::Queue { queue_path } => (queue_resource_path(queue_path), Vec::new()),
        Integration::EventBus { .. } => (
            "/".to_string(),
            vec![amz_target(PUT_EVENTS_TARGET)],
        ),
        Integration::Workflow { .. } => (
            "/".to_string(),
            vec![amz_target(START_EXECUTION_TARGET)],
        ),
    };

    BackendPayload {
        style: integration.style(),
        path,
        content_type: envelope
            .content_type()
            .unwrap_or(APPLICATION_JSON)
            .to_string(),
        headers,
        body: envelope.body.clone(),
    }
}

/// Translate a backend response into what the client sees.
pub fn map_response(integration: &Integration, response: BackendResponse) -> ClientResponse {
    if !response.status.is_success() {
        return ClientResponse::forwarded(response);
    }

    match integration {
        Integration::DirectCompute {
            response_template, ..
        } => {
            if response.headers.contains_key(FUNCTION_ERROR_HEADER) {
                return ClientResponse::forwarded(response);
            }
            match response_template {
                Some(template) => ClientResponse::ok(template.render(&response.body)),
                None => ClientResponse::ok(response.body),
            }
        }
        Integration::Queue { .. } | Integration::EventBus { .. } | Integration::Workflow { .. } => {
            if response.body.is_empty() {
                ClientResponse::ok(Bytes::from_static(b"{}"))
            } else {
                ClientResponse::ok(response.body)
            }
        }
    }
}

/// Compact JSON text of the body, or an empty string for an empty body.
fn compact_body(envelope: &RequestEnvelope) -> Result<String, MappingError> {
    Ok(envelope
        .json()?
        .map(|value| value.to_string())
        .unwrap_or_default())
}

fn amz_target(target: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(AMZ_TARGET),
        HeaderValue::from_static(target),
    )
}

fn invoke_path(function_name: &str) -> String {
    format!(
        "/2015-03-31/functions/{}/invocations",
        urlencoding::encode(function_name)
    )
}

fn queue_resource_path(queue_path: &str) -> String {
    format!("/{}", queue_path.trim_start_matches('/'))
}
