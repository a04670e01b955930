use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use tracing_subscriber::EnvFilter;

use cms_media::config::Config;
use cms_media::models::settings::MediaConfig;
use cms_media::routes::{create_routes, AppState};
use cms_media::services::cleanup::CleanupService;
use cms_media::services::context::ContextResolver;
use cms_media::services::media::MediaService;
use cms_media::services::storage::DiskRegistry;

#[derive(Parser)]
#[command(name = "cms-media", about = "Image variants and file records for CMS content")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending migrations and serve the HTTP API (default)
    Serve,
    /// Run pending migrations and exit
    Migrate,
    /// Purge soft-deleted records past retention once and exit
    Purge {
        /// Override CLEANUP_RETENTION_DAYS
        #[arg(long)]
        days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    Migrator::up(&db, None).await.context("failed to run migrations")?;

    let command = cli.command.unwrap_or(Command::Serve);
    if let Command::Migrate = command {
        tracing::info!("migrations applied");
        return Ok(());
    }

    let media_config = MediaConfig::from_file(&config.media_config_path)?;
    let disks = DiskRegistry::from_config(&media_config, &config).await?;
    let output = media_config.output;
    let provider = Arc::new(media_config);

    let media = MediaService::new(db, provider.clone(), disks.clone(), output);
    let cleanup = CleanupService::new(
        media.records().clone(),
        ContextResolver::new(provider),
        disks,
    );

    match command {
        Command::Purge { days } => {
            let retention = chrono::Duration::days(days.unwrap_or(config.retention_days));
            let report = cleanup.purge_deleted(retention).await?;
            tracing::info!(records = report.records, files = report.files, "purge finished");
        }
        _ => {
            tokio::spawn(cleanup.clone().run_scheduler(
                Duration::from_secs(config.cleanup_interval_secs),
                chrono::Duration::days(config.retention_days),
            ));

            let app = create_routes(AppState { media, cleanup });
            let listener = tokio::net::TcpListener::bind(&config.bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", config.bind_addr))?;
            tracing::info!("listening on {}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
