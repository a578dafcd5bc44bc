//! Access Graph Server — process entry point.

mod config;

use std::path::PathBuf;

use accessgraph_core::repository::Pagination;
use accessgraph_db::{DbManager, SurrealGraphStore, run_migrations};
use accessgraph_engine::{AccessGraphService, KetoClient, MokaDecisionCache};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig, ServerConfig};

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("invalid log filter")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Plain => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var_os("ACCESSGRAPH_CONFIG").map(PathBuf::from);
    let config = ServerConfig::load(path.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(config_file = ?path, "Starting accessgraph server");

    let db = DbManager::connect(&config.db)
        .await
        .context("failed to connect to SurrealDB")?;
    run_migrations(db.client())
        .await
        .context("failed to apply schema migrations")?;

    let store = SurrealGraphStore::new(db.into_client());
    let keto = KetoClient::new(config.keto.clone()).context("failed to build Keto client")?;
    let cache = MokaDecisionCache::new(&config.engine.cache);
    let service = AccessGraphService::new(store, keto, cache, config.engine.clone());

    let organizations = service
        .list_organizations(Pagination {
            offset: 0,
            limit: 1,
        })
        .await
        .context("store is not readable")?;
    info!(
        organizations = organizations.total,
        keto_read_url = %config.keto.read_url,
        cache_enabled = config.engine.cache.enabled,
        "Access graph ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");
    Ok(())
}
