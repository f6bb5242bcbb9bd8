use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Load configuration from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Yaml,
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(server_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{config::models::PassthroughBehavior, core::integration::IntegrationStyle};

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
listen_addr: "127.0.0.1:3000"
stage: "prod"
backend:
  timeout: "5s"
routes:
  "/queue":
    type: "queue"
    endpoint: "http://localhost:4566"
    queue_path: "123456789012/ApiSqsQueue"
  "/workflow":
    type: "workflow"
    endpoint: "http://localhost:4566"
    state_machine_arn: "arn:aws:states:us-east-1:123456789012:stateMachine:StateMachine"
    passthrough: "never"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.stage, "prod");
        assert_eq!(config.backend.timeout, "5s");
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes["/queue"].style(), IntegrationStyle::Queue);
        assert_eq!(
            config.routes["/workflow"].passthrough(),
            PassthroughBehavior::Never
        );
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let toml_content = r#"
listen_addr = "127.0.0.1:3000"

[routes."/event"]
type = "event_bus"
endpoint = "http://localhost:4566"
event_bus_name = "orders"

[routes."/lambda"]
type = "direct_compute"
endpoint = "http://localhost:4566"
function_name = "LambdaBackend"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config_sync(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.stage, "dev");
        assert_eq!(config.routes["/event"].method(), "POST");
        assert_eq!(config.routes["/lambda"].method(), "GET");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config_sync("/definitely/not/here.toml").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to build config"));
    }
}
