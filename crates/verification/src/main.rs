use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use verification_assets::{
    AssetStore, VerificationAssetStore,
    config::Config,
    repos::{PgAssetRepo, PgContactRepo},
    sweeper,
};

#[derive(Parser)]
#[command(name = "asset-sweeper")]
#[command(about = "Removes expired verification assets")]
struct Args {
    /// Run database migrations and exit
    #[arg(long)]
    migrate: bool,

    /// Sweep once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;

    // Guard must stay alive for the whole run
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let database = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&database).await?;
        tracing::info!("Migrations complete");
        return Ok(());
    }

    // Opening the store performs the first sweep
    let store = VerificationAssetStore::open(
        Arc::new(PgAssetRepo::new(database.clone())),
        Arc::new(PgContactRepo::new(database)),
    )
    .await?;

    if args.once {
        tracing::info!("Sweep complete");
        return Ok(());
    }

    let store: Arc<dyn AssetStore> = Arc::new(store);
    let interval = config.sweep_interval();

    tracing::info!(interval_secs = interval.as_secs(), "Sweeper started");

    sweeper::run(store, interval, shutdown_signal()).await;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
