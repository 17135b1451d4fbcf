use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::source::{Episode, PlayLine, SORT_DEFAULT_KEY, ShowCover, ShowSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StarredShowRecord {
    pub(crate) id: String,
    pub(crate) source_id: String,
    pub(crate) url: String,
    pub(crate) title: String,
    pub(crate) star_time: i64,
    pub(crate) watch_process: String,
    pub(crate) sort_key: String,
    pub(crate) reversal: bool,
    pub(crate) tags: String,
    pub(crate) last_play_line: Option<PlayLine>,
    pub(crate) last_episode: Option<Episode>,
}

impl StarredShowRecord {
    pub(crate) fn starred_now(cover: &ShowCover) -> Self {
        Self {
            id: cover.id.clone(),
            source_id: cover.source_id.clone(),
            url: cover.url.clone(),
            title: cover.title.clone(),
            star_time: Utc::now().timestamp_millis(),
            watch_process: String::new(),
            sort_key: SORT_DEFAULT_KEY.to_string(),
            reversal: false,
            tags: String::new(),
            last_play_line: None,
            last_episode: None,
        }
    }

    pub(crate) fn summary(&self) -> ShowSummary {
        ShowSummary::new(&self.id, &self.source_id, &self.url)
    }

    pub(crate) fn progress(&self) -> Option<(&PlayLine, &Episode)> {
        Some((self.last_play_line.as_ref()?, self.last_episode.as_ref()?))
    }
}

pub(crate) trait StarredStore: Send + Sync {
    fn get_starred(&self, show: &ShowSummary) -> Result<Option<StarredShowRecord>>;
    fn upsert_starred(&self, record: &StarredShowRecord) -> Result<()>;
    fn delete_starred(&self, show: &ShowSummary) -> Result<bool>;
    fn list_starred(&self) -> Result<Vec<StarredShowRecord>>;
}

pub(crate) struct Database {
    conn: Mutex<Connection>,
}

const SELECT_COLUMNS: &str = "id, source_id, url, title, star_time, watch_process, sort_key, reversal, tags, last_play_line, last_episode";

fn json_column<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.filter(|text| !text.trim().is_empty())
        .map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
            })
        })
        .transpose()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StarredShowRecord> {
    Ok(StarredShowRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        star_time: row.get(4)?,
        watch_process: row.get(5)?,
        sort_key: row.get(6)?,
        reversal: row.get(7)?,
        tags: row.get(8)?,
        last_play_line: json_column(row, 9)?,
        last_episode: json_column(row, 10)?,
    })
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
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    pub(crate) fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS starred_shows (
                id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                star_time INTEGER NOT NULL,
                watch_process TEXT NOT NULL DEFAULT '',
                sort_key TEXT NOT NULL DEFAULT 'default',
                reversal INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '',
                last_play_line TEXT,
                last_episode TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (id, source_id, url)
            );
            CREATE INDEX IF NOT EXISTS idx_starred_shows_star_time ON starred_shows(star_time DESC);
            "#,
        )?;
        Ok(())
    }
}

impl StarredStore for Database {
    fn get_starred(&self, show: &ShowSummary) -> Result<Option<StarredShowRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM starred_shows \
                     WHERE id = ?1 AND source_id = ?2 AND url = ?3"
                ),
                params![show.id, show.source_id, show.url],
                record_from_row,
            )
            .optional()
            .with_context(|| format!("failed to load starred show {show}"))?;
        Ok(record)
    }

    fn upsert_starred(&self, record: &StarredShowRecord) -> Result<()> {
        let play_line = record
            .last_play_line
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let episode = record
            .last_episode
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now().to_rfc3339();

        self.conn()?.execute(
            r#"
            INSERT INTO starred_shows (
                id, source_id, url, title, star_time, watch_process, sort_key,
                reversal, tags, last_play_line, last_episode, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id, source_id, url) DO UPDATE SET
                title = excluded.title,
                star_time = excluded.star_time,
                watch_process = excluded.watch_process,
                sort_key = excluded.sort_key,
                reversal = excluded.reversal,
                tags = excluded.tags,
                last_play_line = excluded.last_play_line,
                last_episode = excluded.last_episode,
                updated_at = excluded.updated_at
            "#,
            params![
                record.id,
                record.source_id,
                record.url,
                record.title,
                record.star_time,
                record.watch_process,
                record.sort_key,
                record.reversal,
                record.tags,
                play_line,
                episode,
                now
            ],
        )?;
        Ok(())
    }

    fn delete_starred(&self, show: &ShowSummary) -> Result<bool> {
        let deleted = self.conn()?.execute(
            "DELETE FROM starred_shows WHERE id = ?1 AND source_id = ?2 AND url = ?3",
            params![show.id, show.source_id, show.url],
        )?;
        Ok(deleted > 0)
    }

    fn list_starred(&self) -> Result<Vec<StarredShowRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM starred_shows ORDER BY star_time DESC, title ASC"
        ))?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
