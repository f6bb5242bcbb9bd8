use std::{future::IntoFuture, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use http::{HeaderMap, HeaderValue, header};
use switchyard::{
    adapters::{FileConfigProvider, HttpClientAdapter, HttpHandler, build_router},
    config::{
        ServerConfigValidator, load_config,
        models::ServerConfig,
        starter::{STARTER_RESPONSE_TEMPLATE, starter_config},
    },
    core::{ContentDecision, GatewayService, RequestEnvelope, map_request, passthrough_request},
    ports::{config_provider::ConfigProvider, http_client::HttpClient},
    tracing_setup::{self, LogFormat},
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "switchyard.toml")]
    config: String,

    /// Log output format
    #[clap(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,

    /// Log filter, overriding RUST_LOG (e.g. "debug" or "info,access_log=off")
    #[clap(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "switchyard.toml")]
        config: String,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "switchyard.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "switchyard.toml")]
        config: String,
    },
    /// Print the backend request a route would send for a body
    Render {
        /// Configuration file to use
        #[clap(short, long, default_value = "switchyard.toml")]
        config: String,
        /// Resource path of the route, without the stage (e.g. "/queue")
        #[clap(short, long)]
        route: String,
        /// Request body; empty when omitted
        #[clap(short, long, default_value = "")]
        body: String,
        /// Request content type
        #[clap(long, default_value = "application/json")]
        content_type: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Render {
            config,
            route,
            body,
            content_type,
        }) => render_command(&config, &route, body, &content_type).await,
        Some(Commands::Serve { config }) => {
            serve(&config, args.log_format, args.log_level.as_deref()).await
        }
        None => serve(&args.config, args.log_format, args.log_level.as_deref()).await,
    }
}

/// Validate a configuration and compile it into a gateway.
fn build_gateway(config: ServerConfig) -> Result<GatewayService> {
    ServerConfigValidator::validate(&config).context("Configuration validation failed")?;
    GatewayService::new(Arc::new(config))
}

async fn serve(config_path: &str, log_format: LogFormat, log_level: Option<&str>) -> Result<()> {
    tracing_setup::init_tracing(log_format, log_level).context("Failed to initialize tracing")?;

    tracing::info!("Loading initial configuration from {config_path}");

    let config_provider = Arc::new(
        FileConfigProvider::new(config_path).context("Failed to create config provider")?,
    );
    let initial_config = config_provider
        .load_config()
        .await
        .with_context(|| format!("Failed to load initial config from {config_path}"))?;
    let gateway = Arc::new(ArcSwap::from_pointee(
        build_gateway(initial_config).context("Invalid initial configuration")?,
    ));

    let http_client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client adapter")?);
    let http_handler = Arc::new(HttpHandler::new(gateway.clone(), http_client));

    spawn_config_watcher(config_provider, gateway.clone(), config_path.to_string());

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    {
        let shutdown = graceful_shutdown.clone();
        tokio::spawn(async move { shutdown.run_signal_handler().await });
    }

    let (addr, stage) = {
        let current = gateway.load();
        for route in current.routes() {
            tracing::info!(
                resource = route.resource(),
                method = %route.method(),
                integration = %route.integration().style(),
                endpoint = route.endpoint(),
                "Configured route"
            );
        }
        let addr: SocketAddr = current
            .config()
            .listen_addr
            .parse()
            .context("Failed to parse listen address")?;
        (addr, current.stage().to_string())
    };

    let app = build_router(http_handler, gateway.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(%addr, %stage, "Switchyard gateway listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = graceful_shutdown.clone();
        async move {
            let reason = shutdown.wait_for_shutdown_signal().await;
            tracing::info!(?reason, "Shutdown signal received, draining connections");
        }
    });

    let drain_deadline = {
        let shutdown = graceful_shutdown.clone();
        async move {
            shutdown.wait_for_shutdown_signal().await;
            tokio::time::sleep(shutdown.drain_timeout()).await;
        }
    };

    tokio::select! {
        result = server.into_future() => result.context("Server error")?,
        _ = drain_deadline => {
            tracing::warn!("Drain timeout exceeded, closing remaining connections");
        }
    }

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Reload the gateway whenever the config file changes. A configuration that
/// fails to load or validate is logged and the running gateway is kept.
fn spawn_config_watcher(
    provider: Arc<FileConfigProvider>,
    gateway: Arc<ArcSwap<GatewayService>>,
    config_path: String,
) {
    let Some(mut notify_rx) = provider.watch() else {
        tracing::warn!("Config watch channel already taken; hot reload disabled");
        return;
    };
    let debounce = Duration::from_millis(500);

    tokio::spawn(async move {
        tracing::debug!("Config watcher task started");

        while notify_rx.recv().await.is_some() {
            // Editors often emit several events per save.
            tokio::time::sleep(debounce).await;
            while notify_rx.try_recv().is_ok() {}

            tracing::info!("Reloading configuration from {config_path}");

            let reloaded = match provider.load_config().await {
                Ok(config) => build_gateway(config),
                Err(e) => Err(e),
            };

            match reloaded {
                Ok(new_gateway) => {
                    let routes = new_gateway.route_count();
                    gateway.store(Arc::new(new_gateway));
                    tracing::info!(routes, "Configuration reloaded");
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to reload configuration: {e:#}. Keeping old configuration."
                    );
                }
            }
        }

        tracing::debug!("Config watcher task is shutting down");
    });
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = ServerConfigValidator::validate(&config) {
        eprintln!("❌ Configuration validation failed:");
        eprintln!("{e}");
        println!();
        println!("💡 Common fixes:");
        println!("   • Ensure endpoint URLs start with http:// or https://");
        println!("   • Check that response template files exist");
        println!("   • Verify listen address format (e.g., '127.0.0.1:8080')");
        println!("   • Use full state machine ARNs for workflow routes");
        std::process::exit(1);
    }

    match GatewayService::new(Arc::new(config)) {
        Ok(gateway) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", gateway.config().listen_addr);
            println!("   • Stage: {}", gateway.stage());
            let mut routes: Vec<_> = gateway.routes().collect();
            routes.sort_by(|a, b| a.resource().cmp(b.resource()));
            for route in routes {
                println!(
                    "   • {} {} -> {} ({}, passthrough: {:?})",
                    route.method(),
                    route.resource(),
                    route.integration().style(),
                    route.endpoint(),
                    route.passthrough()
                );
            }
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Route compilation failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file plus its response template
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let template_path = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join("response-template-lambda");
    if !template_path.exists() {
        tokio::fs::write(&template_path, STARTER_RESPONSE_TEMPLATE)
            .await
            .with_context(|| format!("Failed to write {}", template_path.display()))?;
        println!("✅ Created response template at: {}", template_path.display());
    }

    tokio::fs::write(path, starter_config(&template_path.display().to_string()))
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'switchyard serve --config {config_path}' to start the server");
    Ok(())
}

/// Show the backend request a route would produce, without sending it
async fn render_command(
    config_path: &str,
    resource: &str,
    body: String,
    content_type: &str,
) -> Result<()> {
    let config = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    let gateway = build_gateway(config)?;
    let route = gateway
        .route(resource)
        .ok_or_else(|| eyre!("No route configured for resource '{resource}'"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type).context("Invalid content type")?,
    );
    let envelope = RequestEnvelope::new(
        route.method().clone(),
        route.resource(),
        headers,
        Bytes::from(body),
    );

    let payload = match route.content_decision(Some(content_type)) {
        ContentDecision::Reject => {
            return Err(eyre!(
                "Route '{resource}' rejects content type '{content_type}' (415)"
            ));
        }
        ContentDecision::Passthrough => passthrough_request(route.integration(), &envelope),
        ContentDecision::Transform => {
            map_request(route.integration(), &envelope).context("Request mapping failed")?
        }
    };

    println!("POST {}", route.backend_uri(&payload));
    println!("content-type: {}", payload.content_type);
    for (name, value) in &payload.headers {
        println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    println!();
    println!("{}", String::from_utf8_lossy(&payload.body));
    Ok(())
}
