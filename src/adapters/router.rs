//! Axum router wiring: every path goes to the [`HttpHandler`], wrapped in the
//! request-id, access-log and trace layers.
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{MethodRouter, any},
};
use tower_http::trace::TraceLayer;

use crate::{
    adapters::{
        http_handler::{HttpHandler, MAX_BODY_BYTES},
        middleware::{create_access_log_middleware, request_id_middleware},
    },
    core::GatewayService,
};

fn handler_route(handler: Arc<HttpHandler>) -> MethodRouter {
    any(move |req: Request| {
        let handler = handler.clone();
        async move {
            match handler.handle_request(req).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Request handling error: {:?}", e);
                    internal_error()
                }
            }
        }
    })
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"message":"Internal server error"}"#,
    )
        .into_response()
}

/// Build the gateway's router. Layers run outermost first: trace, request id,
/// access log, then the handler.
pub fn build_router(handler: Arc<HttpHandler>, gateway: Arc<ArcSwap<GatewayService>>) -> Router {
    Router::new()
        .route("/", handler_route(handler.clone()))
        .route("/{*path}", handler_route(handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(create_access_log_middleware(gateway)))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
