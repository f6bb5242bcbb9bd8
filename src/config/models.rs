//! Configuration data structures for Switchyard.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. They are
//! serde‑friendly and include defaults so that minimal configs remain concise.
//! Builders and enums here are considered part of the public API for embedding.
use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::core::integration::IntegrationStyle;

fn default_stage() -> String {
    "dev".to_string()
}

fn default_backend_timeout() -> String {
    "29s".to_string()
}

fn default_access_log_enabled() -> bool {
    true
}

fn default_get() -> String {
    "GET".to_string()
}

fn default_post() -> String {
    "POST".to_string()
}

fn default_event_source() -> String {
    "apigateway".to_string()
}

fn default_detail_type() -> String {
    "api-request".to_string()
}

/// Stage access logging, one JSON event per request.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AccessLogConfig {
    pub enabled: bool,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_access_log_enabled(),
        }
    }
}

/// Settings shared by every backend call.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    /// Integration timeout, parsed by humantime (e.g. "29s", "500ms")
    pub timeout: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout: default_backend_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn timeout_duration(&self) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(&self.timeout)
    }
}

/// What to do with a request whose content type has no mapping template.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughBehavior {
    /// Forward untransformed whenever no template matches the content type.
    WhenNoMatch,
    /// Forward untransformed only if the route has no templates at all.
    #[default]
    WhenNoTemplates,
    /// Reject anything without a matching template.
    Never,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Path prefix the routes are published under; empty for none.
    #[serde(default = "default_stage")]
    pub stage: String,
    pub routes: HashMap<String, RouteConfig>,
    #[serde(default)]
    pub access_log: AccessLogConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    listen_addr: Option<String>,
    stage: Option<String>,
    routes: HashMap<String, RouteConfig>,
    access_log: Option<AccessLogConfig>,
    backend: Option<BackendConfig>,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the stage name (use "" to serve routes at the root)
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Add a route for the given resource path
    pub fn route(mut self, resource: impl Into<String>, config: RouteConfig) -> Self {
        self.routes.insert(resource.into(), config);
        self
    }

    pub fn access_log(mut self, enabled: bool) -> Self {
        self.access_log = Some(AccessLogConfig { enabled });
        self
    }

    /// Set the backend integration timeout (humantime format)
    pub fn backend_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.backend = Some(BackendConfig {
            timeout: timeout.into(),
        });
        self
    }

    /// Build the final ServerConfig
    pub fn build(self) -> Result<ServerConfig, String> {
        let listen_addr = self
            .listen_addr
            .ok_or_else(|| "listen_addr is required".to_string())?;

        if self.routes.is_empty() {
            return Err("At least one route must be configured".to_string());
        }

        Ok(ServerConfig {
            listen_addr,
            stage: self.stage.unwrap_or_else(default_stage),
            routes: self.routes,
            access_log: self.access_log.unwrap_or_default(),
            backend: self.backend.unwrap_or_default(),
        })
    }
}

/// Route definitions (tagged enum), one integration style per resource path.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum RouteConfig {
    /// Synchronous function invocation.
    DirectCompute {
        endpoint: String,
        function_name: String,
        #[serde(default = "default_get")]
        method: String,
        /// Path to a response mapping template file
        #[serde(default)]
        response_template: Option<String>,
        #[serde(default)]
        passthrough: PassthroughBehavior,
    },
    /// Message ingestion into a queue.
    Queue {
        endpoint: String,
        /// "<account>/<queue name>"
        queue_path: String,
        #[serde(default = "default_post")]
        method: String,
        #[serde(default)]
        passthrough: PassthroughBehavior,
    },
    /// Event publishing onto an event bus.
    EventBus {
        endpoint: String,
        #[serde(default = "default_event_source")]
        source: String,
        #[serde(default = "default_detail_type")]
        detail_type: String,
        #[serde(default)]
        event_bus_name: Option<String>,
        #[serde(default = "default_post")]
        method: String,
        #[serde(default)]
        passthrough: PassthroughBehavior,
    },
    /// Workflow execution start.
    Workflow {
        endpoint: String,
        state_machine_arn: String,
        #[serde(default = "default_post")]
        method: String,
        #[serde(default)]
        passthrough: PassthroughBehavior,
    },
}

impl RouteConfig {
    pub fn style(&self) -> IntegrationStyle {
        match self {
            RouteConfig::DirectCompute { .. } => IntegrationStyle::DirectCompute,
            RouteConfig::Queue { .. } => IntegrationStyle::Queue,
            RouteConfig::EventBus { .. } => IntegrationStyle::EventBus,
            RouteConfig::Workflow { .. } => IntegrationStyle::Workflow,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            RouteConfig::DirectCompute { endpoint, .. }
            | RouteConfig::Queue { endpoint, .. }
            | RouteConfig::EventBus { endpoint, .. }
            | RouteConfig::Workflow { endpoint, .. } => endpoint,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            RouteConfig::DirectCompute { method, .. }
            | RouteConfig::Queue { method, .. }
            | RouteConfig::EventBus { method, .. }
            | RouteConfig::Workflow { method, .. } => method,
        }
    }

    pub fn passthrough(&self) -> PassthroughBehavior {
        match self {
            RouteConfig::DirectCompute { passthrough, .. }
            | RouteConfig::Queue { passthrough, .. }
            | RouteConfig::EventBus { passthrough, .. }
            | RouteConfig::Workflow { passthrough, .. } => *passthrough,
        }
    }

    /// Shorthand for a queue route with default method and passthrough.
    pub fn queue(endpoint: impl Into<String>, queue_path: impl Into<String>) -> Self {
        RouteConfig::Queue {
            endpoint: endpoint.into(),
            queue_path: queue_path.into(),
            method: default_post(),
            passthrough: PassthroughBehavior::default(),
        }
    }

    /// Shorthand for an event bus route publishing with the default source and detail type.
    pub fn event_bus(endpoint: impl Into<String>) -> Self {
        RouteConfig::EventBus {
            endpoint: endpoint.into(),
            source: default_event_source(),
            detail_type: default_detail_type(),
            event_bus_name: None,
            method: default_post(),
            passthrough: PassthroughBehavior::default(),
        }
    }

    pub fn workflow(endpoint: impl Into<String>, state_machine_arn: impl Into<String>) -> Self {
        RouteConfig::Workflow {
            endpoint: endpoint.into(),
            state_machine_arn: state_machine_arn.into(),
            method: default_post(),
            passthrough: PassthroughBehavior::default(),
        }
    }

    pub fn direct_compute(endpoint: impl Into<String>, function_name: impl Into<String>) -> Self {
        RouteConfig::DirectCompute {
            endpoint: endpoint.into(),
            function_name: function_name.into(),
            method: default_get(),
            response_template: None,
            passthrough: PassthroughBehavior::default(),
        }
    }
}
