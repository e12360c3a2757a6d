use std::{net::SocketAddr, path::Path, sync::Arc};

use axum::{Router, body::Body, extract::Request, response::Response, routing::any};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use pantry_gateway::{
    FileRegistry, GatewayService, HealthProber, HttpClient, HttpClientAdapter, HttpHandler,
    config::{GatewayConfigValidator, load_config},
    core::RouteTable,
    ports::registry::{Registration, ServiceRegistry},
    tracing_setup,
    utils::graceful_shutdown::GracefulShutdown,
};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "gateway.yaml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "gateway.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "gateway.yaml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "gateway.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config),
    };

    match command {
        "validate" => return validate_config_command(&config_path),
        "init" => return init_config_command(&config_path).await,
        _ => {}
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {e}"))?;

    tracing::info!("Loading configuration from {config_path}");
    let config =
        load_config(&config_path).with_context(|| format!("Failed to load {config_path}"))?;
    GatewayConfigValidator::validate(&config).context("Invalid configuration")?;
    let config = Arc::new(config);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    // An unreadable registry document at startup is fatal.
    let registry: Arc<dyn ServiceRegistry> = Arc::new(
        FileRegistry::open(&config.registry_path)
            .await
            .context("Failed to open service registry")?,
    );
    let http_client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client")?);

    let gateway = Arc::new(GatewayService::new(
        config.clone(),
        RouteTable::standard(),
        registry.clone(),
    ));

    // Announce ourselves in the shared registry so sibling processes can
    // see the gateway; the owner id lets us clean up our own records only.
    let instance_id = uuid::Uuid::new_v4().to_string();
    registry
        .register(
            "api-gateway",
            Registration {
                url: config.advertised_url(),
                owner_process_id: instance_id.clone(),
            },
        )
        .await
        .context("Failed to register gateway in the service registry")?;

    let prober_handle = if config.health_probe.enabled {
        let prober = HealthProber::new(
            registry.clone(),
            http_client.clone(),
            config.health_probe.clone(),
        );
        Some(tokio::spawn(async move { prober.run().await }))
    } else {
        tracing::info!("health probing disabled by configuration");
        None
    };

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    let http_handler = Arc::new(HttpHandler::new(gateway, http_client));

    let make_request_route = |handler: Arc<HttpHandler>| {
        any(move |req: Request| {
            let handler = handler.clone();
            let span = tracing_setup::request_span(req.method().as_str(), req.uri().path());
            async move {
                match handler.handle_request(req).await {
                    Ok(response) => Ok::<Response<Body>, std::convert::Infallible>(response),
                    Err(e) => {
                        tracing::error!("Request handling error: {e:?}");
                        let error_response = Response::builder()
                            .status(500)
                            .body(Body::from("Internal Server Error"))
                            .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")));
                        Ok(error_response)
                    }
                }
            }
            .instrument(span)
        })
    };

    let app = Router::new()
        .route("/{*path}", make_request_route(http_handler.clone()))
        .route("/", make_request_route(http_handler.clone()))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Pantry Gateway listening on {addr}");

    let server_result = tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Server error")
        },
        shutdown_reason = graceful_shutdown.wait_for_shutdown_signal() => {
            tracing::info!("Shutdown signal received: {shutdown_reason:?}");
            Ok(())
        }
    };

    if let Some(handle) = prober_handle {
        handle.abort();
    }
    match registry.cleanup_owned_by(&instance_id).await {
        Ok(removed) => tracing::info!(removed, "removed own registry records"),
        Err(e) => tracing::warn!("failed to clean up registry records: {e}"),
    }

    server_result
}

/// Validate configuration file and exit
fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match GatewayConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Registry Path: {}", config.registry_path);
            println!("   • Health Probing: {}", config.health_probe.enabled);
            println!(
                "   • Breaker: {} failures / {}s cooldown",
                config.breaker.failure_threshold, config.breaker.cooldown_secs
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            println!("   • Ensure the health probe path starts with '/'");
            println!("   • All thresholds and durations must be at least 1");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Pantry Gateway Configuration

# The address to listen on
listen_addr: "127.0.0.1:3000"

# Shared registry document used for service discovery
registry_path: "./registry.json"

# Background health probing of registered services
health_probe:
  enabled: true
  interval_secs: 30
  initial_delay_secs: 5
  timeout_secs: 5
  path: "/health"

# Per-destination circuit breaker
breaker:
  failure_threshold: 3
  cooldown_secs: 30

# Downstream call timeouts
proxy:
  timeout_secs: 10
  aggregate_timeout_secs: 5
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'pantry-gateway serve --config {config_path}' to start the server");
    Ok(())
}
