use std::sync::Arc;

use clap::Parser;
use context_core::vector::{create_backend, VectorBackend};
use context_core::ContextConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use context_server::{app, http};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML file; environment variables override its values
    #[arg(short, long, default_value = "context-engine.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match ContextConfig::load(Some(&args.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let pool = match context_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match context_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        let backend = create_backend(&config.vector_store, &pool)?;
        if matches!(backend, VectorBackend::PgVector(_)) {
            match context_core::db::check_pgvector(&pool).await {
                Ok(v) => println!("✅ pgvector version: {}", v),
                Err(e) => {
                    println!("❌ pgvector check failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        match backend.collection_exists().await {
            Ok(true) => println!(
                "✅ {} collection '{}' present",
                backend.name(),
                config.vector_store.collection
            ),
            Ok(false) => println!(
                "⚠️  {} reachable, collection '{}' will be created on start",
                backend.name(),
                config.vector_store.collection
            ),
            Err(e) => {
                println!("❌ {} check failed: {}", backend.name(), e);
                std::process::exit(1);
            }
        }

        println!("✅ Context Engine health check passed");
        return Ok(());
    }

    let state = match app::build_state(&config, &pool).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to initialise services: {}", e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, &config.http, tx.subscribe()).await?;

    Ok(())
}
