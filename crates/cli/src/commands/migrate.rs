//! `counsel migrate` — create or upgrade the database schema.

use anyhow::{bail, Result};
use tracing::info;

use counsel_config::AppConfig;
use counsel_storage::SqliteStore;

pub async fn run() -> Result<()> {
    let config = AppConfig::load()?;

    if config.database.url.starts_with("postgres") {
        #[cfg(feature = "postgres")]
        {
            counsel_storage::PostgresStore::connect(
                &config.database.url,
                config.database.max_connections,
            )
            .await?;
            info!("PostgreSQL schema is up to date");
            return Ok(());
        }
        #[cfg(not(feature = "postgres"))]
        bail!("postgres support is not compiled in — rebuild with --features postgres");
    }

    SqliteStore::new(&config.database.url).await?;
    info!("SQLite schema is up to date");
    Ok(())
}
