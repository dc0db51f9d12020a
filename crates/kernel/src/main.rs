//! DevCamper API server and data tools.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use devcamper_kernel::services::geocoder;
use devcamper_kernel::{AppState, Config, seed, state};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Load or remove sample data.
    Seed {
        #[command(subcommand)]
        action: SeedAction,
    },
}

#[derive(Subcommand, Debug)]
enum SeedAction {
    /// Import users, bootcamps, courses and reviews from JSON files.
    Import {
        /// Directory holding `users.json`, `bootcamps.json`, `courses.json`, `reviews.json`.
        #[arg(long, value_name = "PATH", default_value = "./_data")]
        dir: PathBuf,
    },

    /// Delete every document.
    Destroy,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Seed { action } => run_seed(&config, action).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!(port = config.port, production = config.production, "Starting DevCamper API");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let cors = build_cors_layer(&config);
    let app = devcamper_kernel::app(state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn run_seed(config: &Config, action: SeedAction) -> Result<()> {
    let store = state::open_store(config).await?;
    match action {
        SeedAction::Import { dir } => {
            let geocoder = geocoder::from_config(config);
            let report = seed::import(store.as_ref(), geocoder.as_deref(), &dir)
                .await
                .with_context(|| format!("failed to import seed data from {}", dir.display()))?;
            info!(?report, "Data imported");
        }
        SeedAction::Destroy => {
            let removed = seed::destroy(store.as_ref()).await?;
            info!(removed, "Data destroyed");
        }
    }
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        // Credentialed CORS forbids wildcard headers.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
