// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports validate, migrate and compare plus store lifecycle helpers

pub mod compare;
pub mod migrate;
pub mod validate;

pub use compare::compare;
pub use migrate::migrate;
pub use validate::validate;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::store::{MysqlStore, PostgresStore, Store};

/// Open the source (PostgreSQL) and destination (MySQL) stores.
///
/// If the destination cannot be opened the already-open source is closed
/// before the error is returned.
///
/// # Errors
///
/// Returns an error if either store rejects its configuration or cannot
/// connect.
pub async fn open_stores(config: &Config) -> Result<(PostgresStore, MysqlStore)> {
    let mut source =
        PostgresStore::new(&config.postgresql).context("Invalid postgresql configuration")?;
    let mut destination =
        MysqlStore::new(&config.mysql).context("Invalid mysql configuration")?;

    tracing::info!("Connecting to source database...");
    source
        .open()
        .await
        .context("failed to open pg connection")?;
    tracing::info!("✓ Connected to source");

    tracing::info!("Connecting to destination database...");
    if let Err(e) = destination.open().await {
        close_store(&mut source).await;
        return Err(e).context("failed to open mysql connection");
    }
    tracing::info!("✓ Connected to destination");

    Ok((source, destination))
}

/// Close a store, logging instead of failing so every store gets closed
pub async fn close_store(store: &mut dyn Store) {
    if let Err(e) = store.close().await {
        tracing::warn!("⚠ Failed to close {} connection: {}", store.name(), e);
    }
}
