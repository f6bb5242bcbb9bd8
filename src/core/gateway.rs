//! Core gateway orchestration service.
//!
//! The `GatewayService` compiles an immutable `ServerConfig` into routes the
//! handler can dispatch on. It provides:
//! * Stage-prefixed exact resource lookup
//! * Per-route method and content-type admission
//! * Loaded response templates, ready for the mapper
//!
//! Nothing here performs network I/O; templates are read once while building.
use std::{collections::HashMap, sync::Arc, time::Duration};

use eyre::{Result, WrapErr};
use http::Method;

use crate::{
    config::{PassthroughBehavior, RouteConfig, ServerConfig, normalize_resource},
    core::{
        envelope::{APPLICATION_JSON, BackendPayload},
        integration::Integration,
        template::MappingTemplate,
    },
};

/// How a request body should reach the backend given its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDecision {
    /// Run the route's request mapping.
    Transform,
    /// Forward the body as-is to the backend action.
    Passthrough,
    /// Answer 415 without calling the backend.
    Reject,
}

/// A compiled route: one resource, one method, one integration.
#[derive(Debug, Clone)]
pub struct Route {
    resource: String,
    method: Method,
    endpoint: String,
    passthrough: PassthroughBehavior,
    integration: Integration,
}

impl Route {
    fn compile(resource: &str, config: &RouteConfig) -> Result<Self> {
        let method = Method::from_bytes(config.method().to_ascii_uppercase().as_bytes())
            .wrap_err_with(|| format!("Invalid method '{}'", config.method()))?;

        let integration = match config {
            RouteConfig::DirectCompute {
                function_name,
                response_template,
                ..
            } => {
                let response_template = response_template
                    .as_deref()
                    .map(|path| {
                        MappingTemplate::load(path)
                            .wrap_err_with(|| format!("Failed to load response template '{path}'"))
                    })
                    .transpose()?;
                Integration::DirectCompute {
                    function_name: function_name.clone(),
                    response_template,
                }
            }
            RouteConfig::Queue { queue_path, .. } => Integration::Queue {
                queue_path: queue_path.clone(),
            },
            RouteConfig::EventBus {
                source,
                detail_type,
                event_bus_name,
                ..
            } => Integration::EventBus {
                source: source.clone(),
                detail_type: detail_type.clone(),
                event_bus_name: event_bus_name.clone(),
            },
            RouteConfig::Workflow {
                state_machine_arn, ..
            } => Integration::Workflow {
                state_machine_arn: state_machine_arn.clone(),
            },
        };

        Ok(Self {
            resource: normalize_resource(resource),
            method,
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            passthrough: config.passthrough(),
            integration,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn integration(&self) -> &Integration {
        &self.integration
    }

    pub fn passthrough(&self) -> PassthroughBehavior {
        self.passthrough
    }

    pub fn accepts(&self, method: &Method) -> bool {
        self.method == method
    }

    /// Decide how a body with the given content type is handled.
    ///
    /// Mapped styles only carry an `application/json` request template, so a
    /// missing content type counts as JSON and anything else is either passed
    /// through or rejected depending on the route's passthrough behaviour.
    pub fn content_decision(&self, content_type: Option<&str>) -> ContentDecision {
        if !self.integration.style().has_request_template() {
            return match self.passthrough {
                PassthroughBehavior::Never => ContentDecision::Reject,
                _ => ContentDecision::Transform,
            };
        }

        if content_type.is_none_or(is_json_media_type) {
            return ContentDecision::Transform;
        }

        match self.passthrough {
            PassthroughBehavior::WhenNoMatch => ContentDecision::Passthrough,
            PassthroughBehavior::WhenNoTemplates | PassthroughBehavior::Never => {
                ContentDecision::Reject
            }
        }
    }

    /// Full backend URI for a mapped payload.
    pub fn backend_uri(&self, payload: &BackendPayload) -> String {
        format!("{}{}", self.endpoint, payload.path)
    }
}

fn is_json_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(APPLICATION_JSON))
}

/// Central orchestrator for route resolution. Built once per configuration
/// snapshot and swapped wholesale on reload.
pub struct GatewayService {
    config: Arc<ServerConfig>,
    routes: HashMap<String, Route>,
    backend_timeout: Duration,
}

impl GatewayService {
    /// Compile every configured route. Fails on the first route that cannot be
    /// built (bad method, unreadable or malformed template).
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let mut routes = HashMap::with_capacity(config.routes.len());
        for (resource, route_config) in &config.routes {
            let route = Route::compile(resource, route_config)
                .wrap_err_with(|| format!("Invalid route '{resource}'"))?;
            routes.insert(route.resource.clone(), route);
        }

        let backend_timeout = config.backend.timeout_duration().wrap_err_with(|| {
            format!("Invalid backend timeout '{}'", config.backend.timeout)
        })?;

        tracing::debug!(
            routes = routes.len(),
            stage = %config.stage,
            "Gateway routes compiled"
        );

        Ok(Self {
            config,
            routes,
            backend_timeout,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stage(&self) -> &str {
        &self.config.stage
    }

    pub fn backend_timeout(&self) -> Duration {
        self.backend_timeout
    }

    /// Strip the stage prefix from a request path, yielding the resource it names.
    ///
    /// Returns `None` when the path lies outside the stage.
    pub fn resolve_resource(&self, path: &str) -> Option<String> {
        let stage = self.stage();
        let rest = if stage.is_empty() {
            path
        } else {
            let rest = path.strip_prefix('/')?.strip_prefix(stage)?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest
        };
        Some(normalize_resource(rest))
    }

    /// Exact route lookup for an incoming request path.
    pub fn find_route(&self, path: &str) -> Option<&Route> {
        let resource = self.resolve_resource(path)?;
        self.routes.get(&resource)
    }

    /// Look a route up by its resource path (without stage).
    pub fn route(&self, resource: &str) -> Option<&Route> {
        self.routes.get(&normalize_resource(resource))
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::core::integration::IntegrationStyle;

    const ENDPOINT: &str = "http://localhost:4566/";
    const ARN: &str = "arn:aws:states:us-east-1:123456789012:stateMachine:StateMachine";

    fn service_with(stage: &str) -> GatewayService {
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .stage(stage)
            .route("/queue", RouteConfig::queue(ENDPOINT, "123456789012/ApiSqsQueue"))
            .route("/event/", RouteConfig::event_bus(ENDPOINT))
            .route("/workflow", RouteConfig::workflow(ENDPOINT, ARN))
            .route("/", RouteConfig::direct_compute(ENDPOINT, "LambdaBackend"))
            .backend_timeout("3s")
            .build()
            .unwrap();
        GatewayService::new(Arc::new(config)).unwrap()
    }

    #[test]
    fn test_resolves_resources_under_stage() {
        let service = service_with("dev");
        assert_eq!(service.route_count(), 4);
        assert_eq!(service.backend_timeout(), Duration::from_secs(3));

        assert_eq!(service.resolve_resource("/dev/queue").as_deref(), Some("/queue"));
        assert_eq!(service.resolve_resource("/dev").as_deref(), Some("/"));
        assert_eq!(service.resolve_resource("/dev/").as_deref(), Some("/"));
        assert_eq!(service.resolve_resource("/queue"), None);
        assert_eq!(service.resolve_resource("/development/queue"), None);

        let route = service.find_route("/dev/event").unwrap();
        assert_eq!(route.integration().style(), IntegrationStyle::EventBus);
        assert_eq!(route.resource(), "/event");
        assert!(service.find_route("/dev/missing").is_none());
        assert_eq!(
            service.find_route("/dev").unwrap().integration().style(),
            IntegrationStyle::DirectCompute
        );
    }

    #[test]
    fn test_empty_stage_serves_from_root() {
        let service = service_with("");
        assert!(service.find_route("/queue").is_some());
        assert!(service.find_route("/dev/queue").is_none());
    }

    #[test]
    fn test_route_method_and_uri() {
        let service = service_with("dev");
        let queue = service.route("/queue").unwrap();
        assert!(queue.accepts(&Method::POST));
        assert!(!queue.accepts(&Method::GET));
        assert_eq!(queue.endpoint(), "http://localhost:4566");

        let lambda = service.route("/").unwrap();
        assert!(lambda.accepts(&Method::GET));
    }

    #[test]
    fn test_content_decisions() {
        let service = service_with("dev");
        let queue = service.route("/queue").unwrap();
        assert_eq!(queue.content_decision(None), ContentDecision::Transform);
        assert_eq!(
            queue.content_decision(Some("Application/JSON; charset=utf-8")),
            ContentDecision::Transform
        );
        assert_eq!(queue.content_decision(Some("text/plain")), ContentDecision::Reject);

        let lambda = service.route("/").unwrap();
        assert_eq!(lambda.content_decision(Some("text/plain")), ContentDecision::Transform);

        let mut when_no_match = RouteConfig::queue(ENDPOINT, "1/q");
        if let RouteConfig::Queue { passthrough, .. } = &mut when_no_match {
            *passthrough = PassthroughBehavior::WhenNoMatch;
        }
        let route = Route::compile("/q", &when_no_match).unwrap();
        assert_eq!(route.content_decision(Some("text/plain")), ContentDecision::Passthrough);

        let mut never = RouteConfig::direct_compute(ENDPOINT, "LambdaBackend");
        if let RouteConfig::DirectCompute { passthrough, .. } = &mut never {
            *passthrough = PassthroughBehavior::Never;
        }
        let route = Route::compile("/", &never).unwrap();
        assert_eq!(route.content_decision(None), ContentDecision::Reject);
    }

    #[test]
    fn test_response_template_is_loaded() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "$input.json('$.body')").unwrap();

        let config = RouteConfig::DirectCompute {
            endpoint: ENDPOINT.to_string(),
            function_name: "LambdaBackend".to_string(),
            method: "get".to_string(),
            response_template: Some(file.path().display().to_string()),
            passthrough: PassthroughBehavior::WhenNoTemplates,
        };
        let route = Route::compile("/", &config).unwrap();
        assert_eq!(route.method(), &Method::GET);
        assert!(matches!(
            route.integration(),
            Integration::DirectCompute {
                response_template: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_broken_template_fails_with_context() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "$input.json('$.body'").unwrap();

        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .route(
                "/lambda",
                RouteConfig::DirectCompute {
                    endpoint: ENDPOINT.to_string(),
                    function_name: "LambdaBackend".to_string(),
                    method: "GET".to_string(),
                    response_template: Some(file.path().display().to_string()),
                    passthrough: PassthroughBehavior::WhenNoTemplates,
                },
            )
            .build()
            .unwrap();

        let err = GatewayService::new(Arc::new(config)).err().unwrap();
        assert!(format!("{err:#}").contains("Invalid route '/lambda'"));
    }
}
