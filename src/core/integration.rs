//! Compiled per-route backend descriptions.
//!
//! A [`RouteConfig`](crate::config::RouteConfig) is what the operator writes; an
//! [`Integration`] is what the mapper consumes once templates are loaded and
//! defaults resolved.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::template::MappingTemplate;

/// The four backend invocation patterns a route can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStyle {
    DirectCompute,
    Queue,
    EventBus,
    Workflow,
}

impl IntegrationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStyle::DirectCompute => "direct_compute",
            IntegrationStyle::Queue => "queue",
            IntegrationStyle::EventBus => "event_bus",
            IntegrationStyle::Workflow => "workflow",
        }
    }

    /// Styles that carry an `application/json` request mapping template.
    pub fn has_request_template(&self) -> bool {
        !matches!(self, IntegrationStyle::DirectCompute)
    }
}

impl fmt::Display for IntegrationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend target plus everything the mapper needs to shape its payload.
#[derive(Debug, Clone)]
pub enum Integration {
    DirectCompute {
        function_name: String,
        response_template: Option<MappingTemplate>,
    },
    Queue {
        queue_path: String,
    },
    EventBus {
        source: String,
        detail_type: String,
        event_bus_name: Option<String>,
    },
    Workflow {
        state_machine_arn: String,
    },
}

impl Integration {
    pub fn style(&self) -> IntegrationStyle {
        match self {
            Integration::DirectCompute { .. } => IntegrationStyle::DirectCompute,
            Integration::Queue { .. } => IntegrationStyle::Queue,
            Integration::EventBus { .. } => IntegrationStyle::EventBus,
            Integration::Workflow { .. } => IntegrationStyle::Workflow,
        }
    }
}
