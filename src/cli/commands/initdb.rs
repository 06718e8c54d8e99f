use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::path::Path;
use tracing::{debug, error, info, trace};

/// Create the parent directory of a file-backed SQLite database.
fn ensure_sqlite_parent(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    if file.is_empty() || file.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        debug!("Ensuring database directory exists: {}", parent.display());
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }
    Ok(())
}

/// Connect and bring the schema up to date.
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection> {
    ensure_sqlite_parent(database_url)?;

    trace!("Attempting to connect to database");
    let db = Database::connect(database_url).await.map_err(|e| {
        error!("Failed to connect to database '{}': {}", database_url, e);
        e
    })?;
    info!("Successfully connected to database");

    info!("Running database migrations");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {}", e);
        return Err(e.into());
    }
    info!("Database migrations completed successfully");

    Ok(db)
}

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    debug!("Database URL: {}", database_url);

    let db = connect_and_migrate(database_url).await?;
    db.close().await?;

    info!("Database initialization completed successfully!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_sqlite_urls_are_ignored() {
        assert!(ensure_sqlite_parent("postgresql://user:pw@localhost/db").is_ok());
        assert!(ensure_sqlite_parent("sqlite::memory:").is_ok());
    }

    #[test]
    fn test_sqlite_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested/courier.db?mode=rwc", dir.path().display());

        ensure_sqlite_parent(&url).unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
