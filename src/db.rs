use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::model::{SaveRequest, SkipRange};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory().context("failed to open in-memory database")?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub(crate) fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS skip_ranges (
                episode_id TEXT PRIMARY KEY,
                start_secs REAL NOT NULL,
                end_secs REAL NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS range_offsets (
                episode_id TEXT NOT NULL,
                file_id TEXT NOT NULL,
                offset_secs REAL NOT NULL,
                PRIMARY KEY (episode_id, file_id)
            );
            "#,
        )?;
        Ok(())
    }

    /// Last write wins for start/end/title; the offset map is merged one
    /// file key at a time.
    pub(crate) fn upsert_range(&self, request: &SaveRequest) -> Result<SkipRange, StoreError> {
        request.validate().map_err(StoreError::InvalidRange)?;

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO skip_ranges (episode_id, start_secs, end_secs, title, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(episode_id) DO UPDATE SET
                start_secs = excluded.start_secs,
                end_secs = excluded.end_secs,
                title = COALESCE(excluded.title, skip_ranges.title),
                updated_at = excluded.updated_at
            "#,
            params![
                request.episode_id,
                request.start,
                request.end,
                request.title,
                now
            ],
        )?;
        if let (Some(file_id), Some(offset)) = (request.file_id.as_deref(), request.offset) {
            tx.execute(
                r#"
                INSERT INTO range_offsets (episode_id, file_id, offset_secs)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(episode_id, file_id) DO UPDATE SET
                    offset_secs = excluded.offset_secs
                "#,
                params![request.episode_id, file_id, offset],
            )?;
        }
        tx.commit()?;

        self.get_range(&request.episode_id)?.ok_or_else(|| {
            StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    pub(crate) fn get_range(&self, episode_id: &str) -> Result<Option<SkipRange>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT episode_id, start_secs, end_secs, title, created_at, updated_at FROM skip_ranges WHERE episode_id = ?1",
                params![episode_id],
                |row| {
                    Ok(SkipRange {
                        episode_id: row.get(0)?,
                        start: row.get(1)?,
                        end: row.get(2)?,
                        title: row.get(3)?,
                        offsets: BTreeMap::new(),
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        let Some(mut range) = row else {
            return Ok(None);
        };
        range.offsets = self.offsets_for(episode_id)?;
        Ok(Some(range))
    }

    pub(crate) fn range_exists(&self, episode_id: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM skip_ranges WHERE episode_id = ?1",
                params![episode_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub(crate) fn delete_range(&self, episode_id: &str) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "DELETE FROM skip_ranges WHERE episode_id = ?1",
            params![episode_id],
        )?;
        tx.execute(
            "DELETE FROM range_offsets WHERE episode_id = ?1",
            params![episode_id],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    pub(crate) fn list_ranges(&self) -> Result<Vec<SkipRange>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT episode_id, start_secs, end_secs, title, created_at, updated_at FROM skip_ranges ORDER BY episode_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SkipRange {
                episode_id: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
                title: row.get(3)?,
                offsets: BTreeMap::new(),
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT episode_id, file_id, offset_secs FROM range_offsets")?;
        let offsets = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        let mut by_episode: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for entry in offsets {
            let (episode_id, file_id, offset) = entry?;
            by_episode
                .entry(episode_id)
                .or_default()
                .insert(file_id, offset);
        }
        for range in &mut out {
            if let Some(offsets) = by_episode.remove(&range.episode_id) {
                range.offsets = offsets;
            }
        }
        Ok(out)
    }

    fn offsets_for(&self, episode_id: &str) -> Result<BTreeMap<String, f64>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT file_id, offset_secs FROM range_offsets WHERE episode_id = ?1 ORDER BY file_id",
        )?;
        let rows = stmt.query_map(params![episode_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (file_id, offset) = row?;
            out.insert(file_id, offset);
        }
        Ok(out)
    }
}
