//! Database initialization
//!
//! Creates the catalog database on first run and brings the schema up to date
//! on every start. All statements are idempotent.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL lets the scheduler read while the refresher writes
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create the media and playlog tables
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_media_table(pool).await?;
    create_playlog_table(pool).await?;
    Ok(())
}

async fn create_media_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            modified_ts TIMESTAMP NOT NULL,
            frames INTEGER NOT NULL,
            fps TEXT NOT NULL,
            duration REAL NOT NULL,
            last_seen TIMESTAMP NOT NULL,
            artist TEXT,
            title TEXT,
            release_year INTEGER,
            description TEXT,
            blocked INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_playlog_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlog (
            id INTEGER PRIMARY KEY,
            media_id INTEGER NOT NULL,
            started TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_playlog_media_started ON playlog (media_id, started)")
        .execute(pool)
        .await?;

    Ok(())
}
