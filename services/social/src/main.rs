use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod jwt;
mod mail;
mod middleware;
mod models;
mod password;
mod repositories;
mod routes;
mod services;
mod state;
mod validation;

use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};

use crate::{
    config::{AppConfig, MailTransport, StorageBackend},
    mail::{HttpMailer, LogMailer, Mailer},
    repositories::{Database, MemoryDatabase, PgDatabase},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting social service");

    let config = AppConfig::load()?;
    let mailer = build_mailer(&config)?;

    match config.storage {
        StorageBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            // Check database connectivity
            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            run_migrations(&pool).await?;
            serve(PgDatabase::new(pool), mailer, &config).await
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on exit");
            serve(MemoryDatabase::new(), mailer, &config).await
        }
    }
}

fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>> {
    match (config.mail_transport, &config.mail_relay_url) {
        (MailTransport::Http, Some(url)) => {
            info!("Delivering mail through relay {}", url);
            let mailer = HttpMailer::new(
                url.clone(),
                config.mail_from.clone(),
                Duration::from_secs(config.mail_timeout_seconds),
            )?;
            Ok(Arc::new(mailer))
        }
        _ => Ok(Arc::new(LogMailer)),
    }
}

async fn serve<D: Database>(db: D, mailer: Arc<dyn Mailer>, config: &AppConfig) -> Result<()> {
    let app = routes::create_router(AppState::new(db, mailer, config));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Social service listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
