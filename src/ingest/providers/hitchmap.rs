// src/ingest/providers/hitchmap.rs
//! Daily spot dump: one dated sqlite file on disk, queried read-only for
//! rows inside a trailing window.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fetch::CachedFetcher;
use crate::ingest::types::{SourceKind, SourceProvider, SourceRecord, SpotRow};

pub const SNAPSHOT_FILE_PREFIX: &str = "hitchmap_";
pub const SNAPSHOT_FILE_EXT: &str = "sqlite";

const RECENT_POINTS_SQL: &str = "SELECT * FROM points WHERE datetime > ?";

// Column positions in `points`.
const COL_ID: usize = 0;
const COL_LAT: usize = 1;
const COL_LNG: usize = 2;
const COL_RATING: usize = 3;
const COL_COUNTRY: usize = 4;
const COL_WAIT: usize = 5;
const COL_NICKNAME: usize = 6;
const COL_COMMENT: usize = 7;
const COL_DATETIME: usize = 8;
const COL_DEST_LAT: usize = 12;
const COL_DEST_LNG: usize = 13;
const COL_SIGNAL: usize = 14;
const COL_RIDE_DATETIME: usize = 15;
const COL_USER_ID: usize = 16;
const COL_FROM_HITCHWIKI: usize = 17;

pub fn snapshot_file_name(day: NaiveDate) -> String {
    format!(
        "{SNAPSHOT_FILE_PREFIX}{}.{SNAPSHOT_FILE_EXT}",
        day.format("%Y-%m-%d")
    )
}

/// Lower bound (exclusive) of the query window, as stored in `datetime`.
pub fn window_start(today: NaiveDate, window_days: u64) -> String {
    today
        .checked_sub_days(Days::new(window_days))
        .unwrap_or(NaiveDate::MIN)
        .format("%Y-%m-%d")
        .to_string()
}

fn is_snapshot_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(SNAPSHOT_FILE_PREFIX));
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == SNAPSHOT_FILE_EXT);
    name_ok && ext_ok
}

/// Remove every snapshot file in `dir` except `keep`. Returns how many went.
pub async fn cleanup_old_snapshots(dir: &Path, keep: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("listing {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path == keep || !is_snapshot_file(&path) {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed old snapshot");
                removed += 1;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove old snapshot"),
        }
    }
    Ok(removed)
}

fn opt<'r, T>(row: &'r SqliteRow, idx: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

// sqlite decodes NULL as zero for numeric types, so go through Option.
fn required<'r, T>(row: &'r SqliteRow, idx: usize) -> Result<T, sqlx::Error>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<Option<T>, _>(idx)?
        .ok_or_else(|| sqlx::Error::ColumnDecode {
            index: idx.to_string(),
            source: "unexpected NULL".into(),
        })
}

fn coordinate(row: &SqliteRow, idx: usize) -> Result<f64, sqlx::Error> {
    let v: f64 = required(row, idx)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(sqlx::Error::ColumnDecode {
            index: idx.to_string(),
            source: format!("non-finite coordinate {v}").into(),
        })
    }
}

fn spot_from_row(row: &SqliteRow) -> Result<SpotRow, sqlx::Error> {
    Ok(SpotRow {
        id: required(row, COL_ID)?,
        lat: coordinate(row, COL_LAT)?,
        lng: coordinate(row, COL_LNG)?,
        rating: opt(row, COL_RATING),
        country: opt(row, COL_COUNTRY),
        wait: opt(row, COL_WAIT),
        nickname: opt(row, COL_NICKNAME),
        comment: opt(row, COL_COMMENT),
        datetime: required(row, COL_DATETIME)?,
        dest_lat: opt(row, COL_DEST_LAT),
        dest_lng: opt(row, COL_DEST_LNG),
        signal: opt(row, COL_SIGNAL),
        ride_datetime: opt(row, COL_RIDE_DATETIME),
        user_id: opt(row, COL_USER_ID),
        from_hitchwiki: opt(row, COL_FROM_HITCHWIKI),
    })
}

/// Rows of `points` newer than `since`, in table order. Rows missing an id,
/// coordinates or timestamp are logged and skipped.
pub async fn query_recent(path: &Path, since: &str) -> Result<Vec<SpotRow>> {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .connect()
        .await
        .with_context(|| format!("opening snapshot {}", path.display()))?;

    let rows = sqlx::query(RECENT_POINTS_SQL)
        .bind(since)
        .fetch_all(&mut conn)
        .await
        .context("querying recent points")?;

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        match spot_from_row(row) {
            Ok(spot) => out.push(spot),
            Err(e) => tracing::warn!(row = i, error = %e, "skipping malformed snapshot row"),
        }
    }
    let _ = conn.close().await;

    tracing::info!(since, rows = rows.len(), kept = out.len(), "snapshot queried");
    Ok(out)
}

pub struct SnapshotProvider {
    fetcher: Arc<CachedFetcher>,
    url: String,
    dir: PathBuf,
    window_days: u64,
}

impl SnapshotProvider {
    pub fn new(fetcher: Arc<CachedFetcher>, url: &str, dir: impl Into<PathBuf>, window_days: u64) -> Self {
        Self {
            fetcher,
            url: url.to_string(),
            dir: dir.into(),
            window_days,
        }
    }

    pub fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(snapshot_file_name(day))
    }

    /// Make sure today's file is on disk, downloading it only when absent,
    /// then drop any older snapshot files.
    pub async fn ensure_snapshot(&self, today: NaiveDate) -> Result<PathBuf> {
        let path = self.path_for(today);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "snapshot already present");
        } else {
            tracing::info!(url = %self.url, path = %path.display(), "downloading snapshot");
            let body = self
                .fetcher
                .fetch(&self.url)
                .await
                .context("downloading snapshot")?;
            let partial = path.with_extension("part");
            tokio::fs::write(&partial, &body)
                .await
                .with_context(|| format!("writing {}", partial.display()))?;
            tokio::fs::rename(&partial, &path)
                .await
                .with_context(|| format!("moving snapshot into {}", path.display()))?;
            tracing::info!(bytes = body.len(), path = %path.display(), "snapshot saved");
        }

        cleanup_old_snapshots(&self.dir, &path).await?;
        Ok(path)
    }

    pub async fn recent_spots(&self, today: NaiveDate) -> Result<Vec<SpotRow>> {
        let path = self.ensure_snapshot(today).await?;
        query_recent(&path, &window_start(today, self.window_days)).await
    }
}

#[async_trait]
impl SourceProvider for SnapshotProvider {
    fn name(&self) -> &'static str {
        "hitchmap"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Snapshot
    }

    fn units(&self) -> Vec<String> {
        vec!["dump".to_string()]
    }

    async fn fetch_unit(&self, _unit: &str) -> Result<Vec<SourceRecord>> {
        let today = Local::now().date_naive();
        Ok(self
            .recent_spots(today)
            .await?
            .into_iter()
            .map(SourceRecord::Snapshot)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dated_file_name() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(snapshot_file_name(d), "hitchmap_2025-03-07.sqlite");
    }

    #[test]
    fn window_start_crosses_month() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(window_start(d, 12), "2025-02-23");
    }

    #[test]
    fn only_dump_files_match() {
        assert!(is_snapshot_file(Path::new("x/hitchmap_2025-01-01.sqlite")));
        assert!(!is_snapshot_file(Path::new("x/hitchmap_2025-01-01.part")));
        assert!(!is_snapshot_file(Path::new("x/other.sqlite")));
    }
}
