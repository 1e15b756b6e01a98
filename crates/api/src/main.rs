use std::sync::Arc;

use anyhow::Context;

use pourline_api::app::{AppServices, build_app};
use pourline_infra::config::AppConfig;
use pourline_infra::seed::demo_catalog;
use pourline_infra::store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().context("invalid configuration")?;
    pourline_observability::init(config.log_format);

    let store = build_store(&config).await?;
    let services = Arc::new(AppServices::new(store, config.heartbeat_interval));
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn InventoryStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresInventoryStore::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store.ensure_schema().await.context("failed to create schema")?;
            if config.seed_demo_catalog() {
                store.load_seed(&demo_catalog()?).await.context("failed to seed demo catalog")?;
                tracing::info!("demo catalog seeded");
            }
            tracing::info!(max_connections = config.db_max_connections, "using Postgres store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            let store = InMemoryInventoryStore::new();
            if config.seed_demo_catalog() {
                demo_catalog()?.load_into(&store)?;
                tracing::info!("demo catalog seeded");
            }
            Ok(Arc::new(store))
        }
    }
}
