//! Gemma API proxy entry point.

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gemma_proxy::config::Config;
use gemma_proxy::metrics;
use gemma_proxy::server::ProxyServer;
use gemma_proxy::utils::shutdown_signal;

/// Gemma API proxy server.
#[derive(Parser, Debug)]
#[command(name = "gemma-proxy")]
#[command(about = "Relay for the Google generative-language API")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the proxy server (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Smoke-test a running proxy: health check plus a dummy relay call.
    SelfTest {
        /// Base URL of the running proxy.
        #[arg(long, default_value = "http://localhost:3001")]
        url: String,

        /// API key sent in the dummy relay call.
        #[arg(long, env = "SELF_TEST_API_KEY", default_value = "test-key")]
        api_key: String,

        /// Model sent in the dummy relay call.
        #[arg(long, default_value = "test-model")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let config = Config::load();

    // Initialize logging
    let (rust_log, json_logs, verbose) = match &config {
        Ok(c) => (c.rust_log.clone(), c.json_logs(), args.verbose || c.verbose),
        Err(_) => ("info".to_string(), false, args.verbose),
    };
    init_logging(&rust_log, json_logs, verbose);

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(config),
        Some(Command::SelfTest {
            url,
            api_key,
            model,
        }) => cmd_self_test(&url, &api_key, &model).await,
        Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)).await,
        None => cmd_serve(config, args.port).await,
    }
}

fn init_logging(rust_log: &str, json: bool, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("gemma_proxy=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(rust_log))
    };

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(filter)
        .init();
}

/// Check configuration validity.
fn cmd_check_config(config: Result<Config, envy::Error>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("GEMMA API PROXY - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match config {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Port: {}", config.port);
    println!("  Upstream: {}", config.upstream_base_url);
    println!("  Default Model: {}", config.default_model);
    println!("  Allowed Origins:");
    for origin in &config.allowed_origins {
        println!("    - {}", origin);
    }
    println!("  Log Format: {}", config.log_format);
    println!(
        "  Metrics: {}",
        if config.metrics_enabled {
            format!("Enabled (port {})", config.metrics_port)
        } else {
            "Disabled".to_string()
        }
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Smoke-test a running proxy.
async fn cmd_self_test(url: &str, api_key: &str, model: &str) -> anyhow::Result<()> {
    println!("Testing proxy server at {}...\n", url);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let base = url.trim_end_matches('/');

    match http.get(format!("{}/health", base)).send().await {
        Ok(response) => println!("Health check: {}", response.text().await?),
        Err(e) => {
            println!("Health check failed: {}", e);
            return Err(anyhow::anyhow!("Proxy is not reachable"));
        }
    }

    let payload = json!({
        "apiKey": api_key,
        "model": model,
        "contents": [{ "parts": [{ "text": "Hello world" }] }],
        "generationConfig": { "temperature": 0.7, "maxOutputTokens": 100 }
    });

    match http
        .post(format!("{}/api/gemma", base))
        .json(&payload)
        .send()
        .await
    {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await?;
            println!("API endpoint status: {}", status.as_u16());
            if status.is_success() {
                println!("API endpoint response: {}", body);
            } else {
                println!("API endpoint error: {}", body);
            }
        }
        Err(e) => println!("API endpoint test failed: {}", e),
    }

    Ok(())
}

/// Run the proxy server until Ctrl+C or SIGTERM.
async fn cmd_serve(config: Result<Config, envy::Error>, port: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if let Some(port) = port {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    info!("Upstream: {}", config.upstream_base_url);
    info!("Default model: {}", config.default_model);

    metrics::init_metrics();
    if config.metrics_enabled {
        metrics::install_exporter(config.metrics_port)?;
    }

    let server = ProxyServer::bind(&config).await?;
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}
