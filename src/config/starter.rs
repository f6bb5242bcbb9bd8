//! Files written by `switchyard init`.

/// Response template for the direct-compute route: unwraps the function's
/// `body` field.
pub const STARTER_RESPONSE_TEMPLATE: &str = "$input.json('$.body')\n";

/// Starter configuration with one route per integration style. The
/// `{response_template}` placeholder is replaced with the template's path as
/// a quoted string.
pub const STARTER_CONFIG: &str = r#"# Switchyard gateway configuration

# The address to listen on
listen_addr = "127.0.0.1:8080"

# Routes are published under /<stage>/...
stage = "dev"

[backend]
timeout = "29s"

[access_log]
enabled = true

# Synchronous function invocation: GET /dev/lambda
[routes."/lambda"]
type = "direct_compute"
endpoint = "http://localhost:4566"
function_name = "LambdaBackend"
response_template = {response_template}

# Queue ingestion: POST /dev/queue
[routes."/queue"]
type = "queue"
endpoint = "http://localhost:4566"
queue_path = "000000000000/ApiSqsQueue"

# Event publishing: POST /dev/event
[routes."/event"]
type = "event_bus"
endpoint = "http://localhost:4566"
source = "apigateway"
detail_type = "api-request"

# Workflow execution: POST /dev/
[routes."/"]
type = "workflow"
endpoint = "http://localhost:4566"
state_machine_arn = "arn:aws:states:us-east-1:000000000000:stateMachine:StateMachine"
"#;

/// Render the starter configuration pointing at `response_template`.
///
/// A JSON string literal is also a valid TOML basic string, so the path is
/// quoted and escaped through `serde_json`.
pub fn starter_config(response_template: &str) -> String {
    let quoted = serde_json::Value::String(response_template.to_string()).to_string();
    STARTER_CONFIG.replace("{response_template}", &quoted)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::{
        config::{RouteConfig, ServerConfigValidator, loader::load_config_sync},
        core::IntegrationStyle,
    };

    #[test]
    fn test_starter_config_is_valid() {
        let dir = tempdir().unwrap();
        let template_path = dir.path().join("response-template-lambda");
        fs::write(&template_path, STARTER_RESPONSE_TEMPLATE).unwrap();

        let config_path = dir.path().join("switchyard.toml");
        fs::write(
            &config_path,
            starter_config(&template_path.display().to_string()),
        )
        .unwrap();

        let config = load_config_sync(config_path.to_str().unwrap()).unwrap();
        assert_eq!(config.routes.len(), 4);
        assert_eq!(config.routes["/"].style(), IntegrationStyle::Workflow);
        assert_eq!(config.routes["/lambda"].method(), "GET");
        ServerConfigValidator::validate(&config).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_starter_config_escapes_template_path() {
        let dir = tempdir().unwrap();
        let template_dir = dir.path().join(r#"tpl\dir "quoted""#);
        fs::create_dir(&template_dir).unwrap();
        let template_path = template_dir.join("response-template-lambda");
        fs::write(&template_path, STARTER_RESPONSE_TEMPLATE).unwrap();
        let template = template_path.display().to_string();

        let config_path = dir.path().join("switchyard.toml");
        fs::write(&config_path, starter_config(&template)).unwrap();

        let config = load_config_sync(config_path.to_str().unwrap()).unwrap();
        match &config.routes["/lambda"] {
            RouteConfig::DirectCompute {
                response_template, ..
            } => assert_eq!(response_template.as_deref(), Some(template.as_str())),
            other => panic!("unexpected route {other:?}"),
        }
        ServerConfigValidator::validate(&config).unwrap();
    }
}
