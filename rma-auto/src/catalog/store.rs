//! Catalog store
//!
//! Persistent table of known media plus the append-only play log. The store
//! is a cheap clonable handle around the SQLite pool; every operation is a
//! single statement or one short transaction, so the refresher, the scheduler
//! and manual overrides interleave at row granularity.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rma_common::db::{CatalogEntry, FrameRate, MediaKind, PlayLogEntry};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::metadata::{artist_title_from_path, display_metadata};
use crate::amcp::listing::ListingEntry;
use crate::error::{Error, Result};

/// A selectable clip
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub media_id: i64,
    pub path: String,
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl Candidate {
    /// Lowercased artist used for cooldown comparisons
    pub fn artist_key(&self) -> String {
        let (artist, _) = display_metadata(&self.path, self.artist.as_deref(), self.title.as_deref());
        artist.to_lowercase()
    }
}

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Rows after the pass
    pub total: usize,
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Open (creating if needed) the catalog database
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = rma_common::db::init_database(db_path).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool; the schema must already exist
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All catalog paths
    pub async fn known_paths(&self) -> Result<HashSet<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT path FROM media")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths.into_iter().collect())
    }

    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Mirror one full server listing into the catalog
    ///
    /// New paths are inserted with filename-derived artist/title; existing
    /// rows are left untouched; rows whose path is absent from `movies` are
    /// deleted. Runs in one transaction so a failed pass changes nothing.
    pub async fn reconcile(&self, movies: &[ListingEntry], now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut tx = self.pool.begin().await?;

        let known: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT path FROM media")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();

        let mut report = ReconcileReport::default();
        let mut seen: HashSet<&str> = HashSet::with_capacity(movies.len());

        for movie in movies {
            if !seen.insert(movie.path.as_str()) || known.contains(&movie.path) {
                continue;
            }

            let (artist, title) = artist_title_from_path(&movie.path);
            debug!("Adding new media: {}", movie.path);
            sqlx::query(
                r#"
                INSERT INTO media (path, type, size_bytes, modified_ts, frames, fps, duration,
                                   last_seen, artist, title, release_year, description)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)
                "#,
            )
            .bind(&movie.path)
            .bind(movie.kind.as_str())
            .bind(movie.size_bytes as i64)
            .bind(movie.modified_at)
            .bind(movie.frame_count as i64)
            .bind(movie.frame_rate.to_string())
            .bind(movie.duration_secs())
            .bind(now)
            .bind(artist)
            .bind(title)
            .execute(&mut *tx)
            .await?;

            report.added.push(movie.path.clone());
        }

        let mut missing: Vec<&String> = known.iter().filter(|p| !seen.contains(p.as_str())).collect();
        missing.sort();
        for path in missing {
            debug!("Deleting missing media: {}", path);
            sqlx::query("DELETE FROM media WHERE path = ?")
                .bind(path)
                .execute(&mut *tx)
                .await?;
            report.removed.push(path.clone());
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media")
            .fetch_one(&mut *tx)
            .await?;
        report.total = total as usize;

        tx.commit().await?;
        Ok(report)
    }

    /// Unblocked clips under `prefix` not started since `cutoff`
    pub async fn eligible_clips(&self, prefix: &str, cutoff: DateTime<Utc>) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.path, m.artist, m.title
            FROM media m
            LEFT JOIN (
                SELECT media_id, MAX(started) AS last_played
                FROM playlog
                GROUP BY media_id
            ) p ON m.id = p.media_id
            WHERE m.path LIKE ? ESCAPE '\'
              AND m.blocked = 0
              AND (p.last_played IS NULL OR p.last_played < ?)
            ORDER BY m.path
            "#,
        )
        .bind(like_prefix(prefix))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::candidate_from_row).collect())
    }

    /// Every unblocked clip under `prefix`, repeats allowed
    pub async fn unblocked_clips(&self, prefix: &str) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.path, m.artist, m.title
            FROM media m
            WHERE m.path LIKE ? ESCAPE '\'
              AND m.blocked = 0
            ORDER BY m.path
            "#,
        )
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::candidate_from_row).collect())
    }

    fn candidate_from_row(row: &sqlx::sqlite::SqliteRow) -> Candidate {
        Candidate {
            media_id: row.get("id"),
            path: row.get("path"),
            artist: row.get("artist"),
            title: row.get("title"),
        }
    }

    /// Lowercased artists with a play started at or after `since`
    pub async fn recent_artists(&self, since: DateTime<Utc>) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT m.id, m.path, m.artist, m.title
            FROM playlog p
            JOIN media m ON m.id = p.media_id
            WHERE p.started >= ?
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(Self::candidate_from_row)
            .map(|c| c.artist_key())
            .collect())
    }

    /// Append one play start
    pub async fn record_play(&self, media_id: i64, started: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO playlog (media_id, started) VALUES (?, ?)")
            .bind(media_id)
            .bind(started)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent play start of a clip
    pub async fn last_played(&self, media_id: i64) -> Result<Option<DateTime<Utc>>> {
        let last: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(started) FROM playlog WHERE media_id = ?")
                .bind(media_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(last)
    }

    /// Full play history, oldest first
    pub async fn play_history(&self) -> Result<Vec<PlayLogEntry>> {
        let rows = sqlx::query("SELECT id, media_id, started FROM playlog ORDER BY started, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| PlayLogEntry {
                id: row.get("id"),
                media_id: row.get("media_id"),
                started_at: row.get("started"),
            })
            .collect())
    }

    /// `(artist, title)` for display, falling back to the filename
    pub async fn display_metadata(&self, media_id: i64) -> Result<Option<(String, String)>> {
        let row = sqlx::query("SELECT path, artist, title FROM media WHERE id = ?")
            .bind(media_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let path: String = row.get("path");
            let artist: Option<String> = row.get("artist");
            let title: Option<String> = row.get("title");
            display_metadata(&path, artist.as_deref(), title.as_deref())
        }))
    }

    /// Set or clear the blocked flag; paths match case-insensitively
    ///
    /// Returns whether a row matched.
    pub async fn set_blocked(&self, path: &str, blocked: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE media SET blocked = ? WHERE path = ? COLLATE NOCASE")
            .bind(i64::from(blocked))
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn entry_by_path(&self, path: &str) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, path, type, size_bytes, modified_ts, frames, fps, last_seen,
                   artist, title, release_year, description, blocked
            FROM media WHERE path = ?
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::entry_from_row(&row)).transpose()
    }

    /// Every catalog row ordered by path
    pub async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, path, type, size_bytes, modified_ts, frames, fps, last_seen,
                   artist, title, release_year, description, blocked
            FROM media ORDER BY path
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogEntry> {
        let kind: String = row.get("type");
        let fps: String = row.get("fps");
        let size_bytes: i64 = row.get("size_bytes");
        let frames: i64 = row.get("frames");
        let blocked: i64 = row.get("blocked");

        Ok(CatalogEntry {
            id: row.get("id"),
            path: row.get("path"),
            kind: kind.parse::<MediaKind>()?,
            size_bytes: size_bytes.max(0) as u64,
            modified_at: row.get("modified_ts"),
            frame_count: frames.max(0) as u64,
            frame_rate: fps
                .parse::<FrameRate>()
                .map_err(|e| Error::Parse(format!("Stored frame rate for row: {}", e)))?,
            last_seen_at: row.get("last_seen"),
            artist: row.get("artist"),
            title: row.get("title"),
            release_year: row.get("release_year"),
            description: row.get("description"),
            blocked: blocked != 0,
        })
    }
}
