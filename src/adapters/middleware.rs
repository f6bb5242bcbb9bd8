//! Axum middleware used by the gateway router.
//!
//! * [`request_id_middleware`] tags each request with a UUID, exposed to the
//!   handler as a [`RequestId`] extension and to the client as `X-Request-ID`.
//! * [`access_log_middleware`] writes one structured event per request on the
//!   `access_log` tracing target, using the standard stage access-log fields.
use std::{future::Future, net::SocketAddr, pin::Pin, sync::Arc, time::Instant};

use arc_swap::ArcSwap;
use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request},
    http::{HeaderValue, Version, header},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::core::GatewayService;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request identifier generated at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Resource a request was dispatched to, set by the handler on its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath(pub String);

/// Generate a per-request UUID and expose it via tracing plus `X-Request-ID`.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Emit the access-log event for a request once its response is ready.
pub async fn access_log_middleware(
    req: Request,
    next: Next,
    gateway: Arc<ArcSwap<GatewayService>>,
) -> Response {
    if !gateway.load().config().access_log.enabled {
        return next.run(req).await;
    }

    let start = Instant::now();
    let request_time = chrono::Utc::now().format("%d/%b/%Y:%H:%M:%S %z").to_string();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| "-".to_string(), |id| id.0.clone());
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_string(), |info| info.0.ip().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let protocol = protocol_name(req.version());

    let response = next.run(req).await;

    let resource_path = response
        .extensions()
        .get::<ResourcePath>()
        .map_or(path, |resource| resource.0.clone());

    tracing::info!(
        target: "access_log",
        requestId = %request_id,
        ip = %ip,
        caller = "-",
        user = "-",
        requestTime = %request_time,
        httpMethod = %method,
        resourcePath = %resource_path,
        status = response.status().as_u16(),
        protocol = protocol,
        responseLength = response_length(&response),
        latencyMs = start.elapsed().as_millis() as u64,
    );

    response
}

/// Create a cloneable closure wrapping [`access_log_middleware`].
pub fn create_access_log_middleware(
    gateway: Arc<ArcSwap<GatewayService>>,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone {
    move |req, next| {
        let gateway = gateway.clone();
        Box::pin(async move { access_log_middleware(req, next, gateway).await })
    }
}

fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Body length when known up front, else the declared `Content-Length`, else 0.
fn response_length(response: &Response) -> u64 {
    response.body().size_hint().exact().unwrap_or_else(|| {
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    })
}
