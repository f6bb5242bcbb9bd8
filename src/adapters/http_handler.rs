use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use axum::{
    body::Body as AxumBody,
    http::{Method, StatusCode, header},
};
use bytes::Bytes;
use eyre::{Result, WrapErr};
use http_body_util::{BodyExt, LengthLimitError};
use hyper::{Request, Response};
use tracing::Instrument;

use crate::{
    adapters::middleware::ResourcePath,
    config::HEALTH_PATH,
    core::{
        BackendPayload, BackendResponse, ClientResponse, ContentDecision, GatewayService,
        RequestEnvelope, Route, map_request, map_response, passthrough_request,
    },
    ports::http_client::HttpClient,
};

/// Largest request body the gateway accepts.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const MISSING_AUTHENTICATION_TOKEN: &str = "Missing Authentication Token";
const UNSUPPORTED_MEDIA_TYPE: &str = "Unsupported Media Type";
const INVALID_REQUEST_BODY: &str = "Invalid request body";
const REQUEST_TOO_LONG: &str = "Request Too Long";
const ENDPOINT_TIMED_OUT: &str = "Endpoint request timed out";
const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// Why an integration call produced no backend response.
#[derive(Debug)]
enum IntegrationFailure {
    TimedOut(Duration),
    Failed(String),
}

/// HTTP handler for the Switchyard gateway
#[derive(Clone)]
pub struct HttpHandler {
    gateway: Arc<ArcSwap<GatewayService>>,
    http_client: Arc<dyn HttpClient>,
}

impl HttpHandler {
    pub fn new(gateway: Arc<ArcSwap<GatewayService>>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            gateway,
            http_client,
        }
    }

    /// Main request handler. The gateway snapshot is loaded once so a reload
    /// mid-request does not change the route being served.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Result<Response<AxumBody>> {
        let gateway = self.gateway.load_full();

        if req.method() == Method::GET && req.uri().path() == HEALTH_PATH {
            return self.handle_health_check(&gateway);
        }

        self.handle_integration(&gateway, req).await
    }

    /// Handle health check endpoint
    fn handle_health_check(&self, gateway: &GatewayService) -> Result<Response<AxumBody>> {
        let health_data = serde_json::json!({
            "status": "ok",
            "routes": gateway.route_count(),
            "stage": gateway.stage(),
        });

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(AxumBody::from(health_data.to_string()))
            .wrap_err("Failed to build health check response")
    }

    async fn handle_integration(
        &self,
        gateway: &GatewayService,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>> {
        let path = req.uri().path().to_string();

        let Some(route) = gateway
            .find_route(&path)
            .filter(|route| route.accepts(req.method()))
        else {
            tracing::debug!(method = %req.method(), %path, "No route for request");
            return into_response(
                ClientResponse::gateway_error(StatusCode::FORBIDDEN, MISSING_AUTHENTICATION_TOKEN),
                None,
            );
        };
        let resource = Some(route.resource());

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        let decision = route.content_decision(content_type);
        if decision == ContentDecision::Reject {
            tracing::debug!(?content_type, resource = route.resource(), "Rejected content type");
            return into_response(
                ClientResponse::gateway_error(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    UNSUPPORTED_MEDIA_TYPE,
                ),
                resource,
            );
        }

        let (parts, body) = req.into_parts();
        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(body) => body,
            Err(e) if exceeds_length_limit(&e) => {
                return into_response(
                    ClientResponse::gateway_error(StatusCode::PAYLOAD_TOO_LARGE, REQUEST_TOO_LONG),
                    resource,
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return into_response(
                    ClientResponse::gateway_error(StatusCode::BAD_REQUEST, INVALID_REQUEST_BODY),
                    resource,
                );
            }
        };
        let envelope = RequestEnvelope::new(parts.method, path, parts.headers, body);

        let payload = match decision {
            ContentDecision::Passthrough => passthrough_request(route.integration(), &envelope),
            _ => match map_request(route.integration(), &envelope) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::debug!(error = %e, resource = route.resource(), "Request mapping failed");
                    return into_response(
                        ClientResponse::gateway_error(
                            StatusCode::BAD_REQUEST,
                            INVALID_REQUEST_BODY,
                        ),
                        resource,
                    );
                }
            },
        };

        let client_response = match self
            .invoke(route, payload, gateway.backend_timeout())
            .await
        {
            Ok(backend_response) => map_response(route.integration(), backend_response),
            Err(IntegrationFailure::TimedOut(after)) => {
                tracing::warn!(
                    resource = route.resource(),
                    timeout = ?after,
                    "Integration timed out"
                );
                ClientResponse::gateway_error(StatusCode::GATEWAY_TIMEOUT, ENDPOINT_TIMED_OUT)
            }
            Err(IntegrationFailure::Failed(reason)) => {
                tracing::error!(resource = route.resource(), %reason, "Integration failed");
                ClientResponse::gateway_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_SERVER_ERROR,
                )
            }
        };

        into_response(client_response, resource)
    }

    /// Send the payload to the route's backend and collect the full response,
    /// all within the integration timeout.
    async fn invoke(
        &self,
        route: &Route,
        payload: BackendPayload,
        timeout: Duration,
    ) -> std::result::Result<BackendResponse, IntegrationFailure> {
        let uri = route.backend_uri(&payload);
        let span = tracing::info_span!(
            "backend_request",
            integration = %payload.style,
            backend.url = %uri,
            http.status_code = tracing::field::Empty,
        );

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&uri)
            .header(header::CONTENT_TYPE, payload.content_type.as_str());
        for (name, value) in &payload.headers {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(AxumBody::from(payload.body))
            .map_err(|e| IntegrationFailure::Failed(format!("Invalid backend request {uri}: {e}")))?;

        let call = async {
            let response = self
                .http_client
                .send_request(request)
                .await
                .map_err(|e| IntegrationFailure::Failed(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let body: Bytes = body
                .collect()
                .await
                .map_err(|e| IntegrationFailure::Failed(format!("Failed to read backend body: {e}")))?
                .to_bytes();
            tracing::Span::current().record("http.status_code", parts.status.as_u16());
            Ok::<_, IntegrationFailure>(BackendResponse::new(parts.status, parts.headers, body))
        };

        tokio::time::timeout(timeout, call)
            .instrument(span)
            .await
            .unwrap_or(Err(IntegrationFailure::TimedOut(timeout)))
    }
}

fn into_response(response: ClientResponse, resource: Option<&str>) -> Result<Response<AxumBody>> {
    let mut response = Response::builder()
        .status(response.status)
        .header(header::CONTENT_TYPE, response.content_type)
        .body(AxumBody::from(response.body))
        .wrap_err("Failed to build client response")?;
    if let Some(resource) = resource {
        response
            .extensions_mut()
            .insert(ResourcePath(resource.to_string()));
    }
    Ok(response)
}

fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
