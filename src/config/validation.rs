#![allow(clippy::collapsible_if)]

use std::{collections::HashMap, net::SocketAddr, path::Path};

use eyre::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::models::{BackendConfig, RouteConfig, ServerConfig};

static STAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]*$").expect("invalid stage regex"));

static STATE_MACHINE_ARN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:aws[A-Za-z-]*:states:[a-z0-9-]+:\d{12}:stateMachine:[A-Za-z0-9_-]{1,80}$")
        .expect("invalid state machine ARN regex")
});

/// Path answered by the gateway itself, outside any stage.
pub const HEALTH_PATH: &str = "/health";

const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Route conflict detected: {message}")]
    RouteConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if !STAGE_NAME.is_match(&config.stage) {
            errors.push(ValidationError::InvalidField {
                field: "stage".to_string(),
                message: "Stage names may only contain letters, digits, '-' and '_'".to_string(),
            });
        }

        if let Err(e) = Self::validate_backend_config(&config.backend) {
            errors.push(e);
        }

        if config.routes.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "routes".to_string(),
            });
        } else {
            for (path, route_config) in &config.routes {
                if let Err(mut route_errors) = Self::validate_single_route(path, route_config) {
                    errors.append(&mut route_errors);
                }
            }
        }

        if let Err(conflict_error_list) = Self::check_route_conflicts(&config.routes) {
            errors.extend(conflict_error_list);
        }

        if config.stage.is_empty() {
            if let Some(path) = Self::shadowed_by_health_check(&config.routes) {
                errors.push(ValidationError::RouteConflict {
                    message: format!(
                        "Route '{path}' is unreachable without a stage: GET {HEALTH_PATH} is the health check"
                    ),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_backend_config(config: &BackendConfig) -> ValidationResult<()> {
        match config.timeout_duration() {
            Ok(timeout) if timeout.is_zero() => Err(ValidationError::InvalidField {
                field: "backend.timeout".to_string(),
                message: "Timeout must be greater than 0".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(ValidationError::InvalidField {
                field: "backend.timeout".to_string(),
                message: format!("Invalid duration '{}': {e}", config.timeout),
            }),
        }
    }

    /// Validate a single route configuration
    fn validate_single_route(path: &str, config: &RouteConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: format!("route path: {path}"),
                message: "Route paths must start with '/'".to_string(),
            });
        }

        if path.chars().any(char::is_whitespace) {
            errors.push(ValidationError::InvalidField {
                field: format!("route path: {path}"),
                message: "Route paths cannot contain whitespace".to_string(),
            });
        }

        if let Err(e) = Self::validate_url(config.endpoint(), &format!("route '{path}' endpoint")) {
            errors.push(e);
        }

        if !ALLOWED_METHODS.contains(&config.method().to_ascii_uppercase().as_str()) {
            errors.push(ValidationError::InvalidField {
                field: format!("route '{path}' method"),
                message: format!(
                    "Unsupported method '{}', expected one of {}",
                    config.method(),
                    ALLOWED_METHODS.join(", ")
                ),
            });
        }

        match config {
            RouteConfig::DirectCompute {
                function_name,
                response_template,
                ..
            } => {
                Self::require_non_empty(&mut errors, path, "function_name", function_name);
                if let Some(template) = response_template {
                    if !Path::new(template).is_file() {
                        errors.push(ValidationError::InvalidField {
                            field: format!("route '{path}' response_template"),
                            message: format!("Template file '{template}' does not exist"),
                        });
                    }
                }
            }
            RouteConfig::Queue { queue_path, .. } => {
                Self::require_non_empty(&mut errors, path, "queue_path", queue_path);
                if queue_path.chars().any(char::is_whitespace) {
                    errors.push(ValidationError::InvalidField {
                        field: format!("route '{path}' queue_path"),
                        message: "Queue path cannot contain whitespace".to_string(),
                    });
                }
            }
            RouteConfig::EventBus {
                source,
                detail_type,
                event_bus_name,
                ..
            } => {
                Self::require_non_empty(&mut errors, path, "source", source);
                Self::require_non_empty(&mut errors, path, "detail_type", detail_type);
                if let Some(bus) = event_bus_name {
                    Self::require_non_empty(&mut errors, path, "event_bus_name", bus);
                }
            }
            RouteConfig::Workflow {
                state_machine_arn, ..
            } => {
                if !STATE_MACHINE_ARN.is_match(state_machine_arn) {
                    errors.push(ValidationError::InvalidField {
                        field: format!("route '{path}' state_machine_arn"),
                        message: format!("'{state_machine_arn}' is not a state machine ARN"),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn require_non_empty(errors: &mut Vec<ValidationError>, path: &str, field: &str, value: &str) {
        if value.trim().is_empty() {
            errors.push(ValidationError::InvalidField {
                field: format!("route '{path}' {field}"),
                message: "Cannot be empty".to_string(),
            });
        }
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                if url.query().is_some() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "Endpoint URLs cannot carry a query string".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    /// Resources are matched exactly, so only paths that normalize to the
    /// same resource ("/queue" and "/queue/") conflict.
    fn check_route_conflicts(routes: &HashMap<String, RouteConfig>) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen: HashMap<String, &String> = HashMap::new();

        let mut paths: Vec<&String> = routes.keys().collect();
        paths.sort();

        for path in paths {
            let normalized = normalize_resource(path);
            if let Some(previous) = seen.insert(normalized.clone(), path) {
                errors.push(ValidationError::RouteConflict {
                    message: format!(
                        "Routes '{previous}' and '{path}' both resolve to resource '{normalized}'"
                    ),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// A stage-less GET route on the health check path that could never be served.
    fn shadowed_by_health_check(routes: &HashMap<String, RouteConfig>) -> Option<&String> {
        routes.iter().find_map(|(path, route)| {
            (normalize_resource(path) == HEALTH_PATH && route.method().eq_ignore_ascii_case("GET"))
                .then_some(path)
        })
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

/// Strip a trailing '/' from everything but the root resource.
pub fn normalize_resource(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
