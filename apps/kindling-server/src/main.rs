use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kindling_db::db::init_db;
use kindling_server::config::ServerConfig;
use kindling_server::services::license_service::{LicenseService, export_batch};
use kindling_server::{AppState, build_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kindling")]
#[command(about = "Kindling breeding tracker server and license administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Keep all state in memory instead of PostgreSQL (development only)
        #[arg(long)]
        in_memory: bool,
    },
    /// License key administration
    Keys {
        #[command(subcommand)]
        subcommand: KeyCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a batch of license keys and save them to a file
    Generate {
        /// Number of keys to create
        #[arg(default_value_t = 5)]
        count: usize,
        /// Notes stored with every key in the batch
        notes: Option<String>,
        /// Directory for the exported key file
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List every key, newest first
    List,
    /// Revoke a key
    Revoke { key: String, reason: String },
    /// Show key counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: failed to load .env file: {}", e);
    }

    let cli = Cli::parse();

    let file_appender = tracing_appender::rolling::never(".", "server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "kindling=debug,kindling_server=debug,kindling_db=debug,tower_http=info,sqlx=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    match cli.command {
        Commands::Serve { in_memory } => {
            let config = ServerConfig::load()?;
            let listen_addr = config.listen_addr.clone();
            let state = if in_memory {
                tracing::warn!("Running with in-memory storage; all data is lost on exit");
                AppState::in_memory(config)
            } else {
                let pool = init_db(&config.database_url, config.db_max_connections).await?;
                AppState::postgres(config, pool)
            };
            run_server(state, &listen_addr).await?;
        }
        Commands::Keys { subcommand } => {
            let config = ServerConfig::load()?;
            let pool = init_db(&config.database_url, config.db_max_connections).await?;
            let licenses = AppState::postgres(config, pool).license_service;
            run_keys(&licenses, subcommand).await?;
        }
    }

    Ok(())
}

async fn run_server(state: AppState, listen_addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    tracing::info!("Server running on {}", listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_keys(licenses: &LicenseService, command: KeyCommands) -> Result<()> {
    match command {
        KeyCommands::Generate { count, notes, out } => {
            println!("Generating {} license keys...", count);
            let report = licenses.generate(count, notes.as_deref()).await?;

            for key in &report.created {
                println!("✓ Generated: {}", key.key);
            }
            for failure in &report.failures {
                eprintln!("Error generating key {}: {}", failure.token, failure.reason);
            }

            println!("\n=== SUMMARY ===");
            println!("Successfully generated {} keys", report.created.len());
            println!("Failed: {}", report.failed());

            if let Some(path) = export_batch(&report, notes.as_deref(), &out)? {
                println!("\n✓ Keys saved to {}", path.display());
            }
        }
        KeyCommands::List => {
            for key in licenses.list_all().await? {
                println!(
                    "{}  {:<8} {:<24} {}",
                    key.key,
                    format!("{:?}", key.state).to_lowercase(),
                    key.bound_email.as_deref().unwrap_or("-"),
                    key.notes.as_deref().unwrap_or("")
                );
            }
        }
        KeyCommands::Revoke { key, reason } => {
            licenses.revoke(&key, &reason).await?;
            println!("Revoked {}", key);
        }
        KeyCommands::Stats => {
            let stats = licenses.stats().await?;
            println!("Total keys:   {}", stats.total_keys);
            println!("Used keys:    {}", stats.used_keys);
            println!("Revoked keys: {}", stats.revoked_keys);
            println!("Unused keys:  {}", stats.unused_keys);
        }
    }
    Ok(())
}
