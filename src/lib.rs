//! Switchyard - an API gateway that speaks its backends' native APIs.
//!
//! Each route binds one resource path to one integration style, and the
//! gateway rewrites the client's JSON request into the payload that backend
//! expects:
//!
//! - **direct compute**: the body is passed through to the function invoke
//!   API; an optional response template reshapes the function's answer
//! - **queue**: `Action=SendMessage&MessageBody=<url-encoded JSON>`
//! - **event bus**: a `PutEvents` envelope whose `Detail` is the body
//! - **workflow**: a `StartExecution` envelope whose `input` is the body
//!
//! Successful backend calls answer the client with 200 and a JSON body;
//! backend failures are forwarded unmodified.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use switchyard::{GatewayService, config::ServerConfig};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg: ServerConfig = switchyard::config::loader::load_config("switchyard.toml").await?;
//! let gateway = GatewayService::new(Arc::new(cfg))?;
//! println!("{} routes under /{}", gateway.route_count(), gateway.stage());
//! # Ok(()) }
//! ```
//!
//! The request mapping itself is pure and usable without a server:
//!
//! ```
//! use http::Method;
//! use switchyard::core::{Integration, RequestEnvelope, map_request};
//!
//! let queue = Integration::Queue { queue_path: "123456789012/orders".into() };
//! let envelope = RequestEnvelope::json_body(Method::POST, "/dev/orders", r#"{"book":"CDK"}"#);
//! let payload = map_request(&queue, &envelope).unwrap();
//! assert_eq!(&payload.body[..], b"Action=SendMessage&MessageBody=%7B%22book%22%3A%22CDK%22%7D");
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping
//! the mapping and routing logic inside `core`.
//!
//! # Error Handling
//! Domain errors are `thiserror` enums (`MappingError`, `TemplateError`,
//! `ValidationError`, `HttpClientError`); orchestration returns
//! `eyre::Result<T>` with `WrapErr` context.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{FileConfigProvider, HttpClientAdapter, HttpHandler, build_router},
    core::GatewayService,
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};
