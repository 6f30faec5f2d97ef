//! survey-dashboard - psychometric survey backend
//!
//! Stores respondents with their personality factor and categorization
//! sheets, imports them from uploaded spreadsheets and serves filtered
//! read endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use survey_common::config::{
    prepare_root_folder, resolve_root_folder, TomlConfig, DEFAULT_BIND_ADDRESS, DEFAULT_PORT,
};
use survey_common::db::init::init_database;
use survey_dashboard::{build_router, AppState};
use tracing::{error, info};

/// Command-line arguments; each can also come from the environment
#[derive(Debug, Parser)]
#[command(name = "survey-dashboard", version, about)]
struct Args {
    /// Folder holding survey.db
    #[arg(long, env = "SURVEY_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "SURVEY_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(long, env = "SURVEY_PORT")]
    port: Option<u16>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SURVEY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_or_default(args.config.as_deref());

    // RUST_LOG takes precedence over the config file's log_level
    let default_level = toml_config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!(
        "Starting survey-dashboard v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = prepare_root_folder(&root_folder)
        .with_context(|| format!("Cannot use root folder {}", root_folder.display()))?;
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool);
    let app = build_router(state);

    let bind = args
        .bind
        .or(toml_config.bind_address)
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {bind}:{port}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("survey-dashboard listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
