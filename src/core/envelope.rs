//! Request and response shapes exchanged with clients and backends.
use bytes::Bytes;
use http::{
    HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    header::{self, CONTENT_TYPE},
};
use serde_json::Value;

use crate::core::{integration::IntegrationStyle, mapper::MappingError};

pub const APPLICATION_JSON: &str = "application/json";

/// The inbound client request as seen by the mapper. Immutable per request.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestEnvelope {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
        }
    }

    /// Convenience constructor for a JSON body with no extra headers.
    pub fn json_body(method: Method, path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        Self::new(method, path, headers, body.into())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Whether the body is empty or only whitespace.
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Parse the body; `None` for an empty body.
    pub fn json(&self) -> Result<Option<Value>, MappingError> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&self.body)?))
    }
}

/// A fully shaped backend request, minus the endpoint it is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPayload {
    pub style: IntegrationStyle,
    /// Path appended to the route's endpoint.
    pub path: String,
    pub content_type: String,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

/// What the backend answered.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }
}

/// What the gateway answers the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl ClientResponse {
    /// Normalized success envelope.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: APPLICATION_JSON.to_string(),
            body: body.into(),
        }
    }

    /// Backend failure passed through untouched.
    pub fn forwarded(response: BackendResponse) -> Self {
        let content_type = response
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(APPLICATION_JSON)
            .to_string();
        Self {
            status: response.status,
            content_type,
            body: response.body,
        }
    }

    /// Error body in the managed gateway's `{"message": ...}` shape.
    pub fn gateway_error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            content_type: APPLICATION_JSON.to_string(),
            body: Bytes::from(serde_json::json!({ "message": message }).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_json_parsing() {
        let envelope = RequestEnvelope::json_body(Method::POST, "/queue", r#"{"book":"CDK"}"#);
        assert_eq!(envelope.json().unwrap(), Some(json!({"book": "CDK"})));
        assert_eq!(envelope.content_type(), Some(APPLICATION_JSON));

        let blank = RequestEnvelope::json_body(Method::POST, "/queue", " \n");
        assert!(blank.is_empty());
        assert_eq!(blank.json().unwrap(), None);

        let broken = RequestEnvelope::json_body(Method::POST, "/queue", "{nope");
        assert!(matches!(broken.json(), Err(MappingError::InvalidJson(_))));
    }

    #[test]
    fn test_forwarded_keeps_backend_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));
        let response = ClientResponse::forwarded(BackendResponse::new(
            StatusCode::BAD_REQUEST,
            headers,
            "<Error/>",
        ));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.content_type, "text/xml");
        assert_eq!(response.body, Bytes::from_static(b"<Error/>"));
    }

    #[test]
    fn test_gateway_error_shape() {
        let response = ClientResponse::gateway_error(StatusCode::FORBIDDEN, "Missing Authentication Token");
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body, json!({"message": "Missing Authentication Token"}));
    }
}
