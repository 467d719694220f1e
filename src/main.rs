//! tab-shield command line.
//!
//! ```text
//!   ┌──────────┐   ┌─────────────┐   ┌───────────────────────────────┐
//!   │  config  │──▶│    Guard    │──▶│ headers / sanitize / check    │
//!   │  (toml)  │   │ initialize  │   │ fetch (guarded dispatch)      │
//!   └──────────┘   └──────┬──────┘   │ serve (axum + middleware)     │
//!                         │          └───────────────────────────────┘
//!                         ▼
//!                  ┌─────────────┐
//!                  │ Cache (SWR) │
//!                  └─────────────┘
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::net::TcpListener;

use tab_shield::cache::Cache;
use tab_shield::config::{load_config, ShieldConfig};
use tab_shield::guard::Guard;
use tab_shield::http::{AppState, HttpServer};
use tab_shield::lifecycle::Shutdown;
use tab_shield::net::OutboundRequest;
use tab_shield::observability::{logging, metrics};
use tab_shield::security::SanitizationContext;

#[derive(Parser)]
#[command(name = "tab-shield")]
#[command(about = "Anti-forgery, rate limiting, sanitization and origin allowlisting", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the security header set for the configured origins
    Headers,
    /// Sanitize text, or a JSON object when --schema is given
    Sanitize {
        input: String,
        #[arg(short = 'x', long, default_value = "text")]
        context: SanitizationContext,
        /// JSON map of field name to context; treats input as a JSON object
        #[arg(long)]
        schema: Option<String>,
    },
    /// Check whether a target resolves to a trusted origin
    Check { target: String },
    /// Fetch a URL through the guard
    Fetch { target: String },
    /// Serve the demo endpoints behind the guard middleware
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ShieldConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tab-shield starting");

    let guard = Guard::global(&config)?;
    guard.initialize()?;
    guard.install_panic_hook();

    match cli.command {
        Commands::Headers => {
            if let Some(headers) = guard.security_headers() {
                for (name, value) in headers.iter() {
                    println!("{name}: {value}");
                }
            }
        }
        Commands::Sanitize {
            input,
            context,
            schema,
        } => match schema {
            Some(schema) => {
                let schema: HashMap<String, SanitizationContext> = serde_json::from_str(&schema)?;
                let fields: Map<String, Value> = serde_json::from_str(&input)?;
                let cleaned = guard.sanitize_fields(&fields, &schema);
                println!("{}", serde_json::to_string_pretty(&cleaned)?);
            }
            None => println!("{}", guard.sanitize_input(&input, context)),
        },
        Commands::Check { target } => match guard.trusted_origins().check(&target) {
            Ok(url) => println!("trusted: {url}"),
            Err(rejection) => {
                eprintln!("blocked: {rejection}");
                std::process::exit(1);
            }
        },
        Commands::Fetch { target } => {
            let response = guard.dispatch(OutboundRequest::get(target)).await?;
            eprintln!("{}", response.status);
            println!("{}", response.text());
        }
        Commands::Serve => serve(&config, guard).await?,
    }

    Ok(())
}

async fn serve(config: &ShieldConfig, guard: Arc<Guard>) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let cache = Cache::init_global(&config.cache);
    let listener = TcpListener::bind(&config.server.bind_address).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(AppState {
        guard,
        cache: cache.clone(),
    });
    server.run(listener, shutdown.subscribe()).await?;

    cache.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
