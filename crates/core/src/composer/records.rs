//! SQLite-backed prepared-video records.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::error::RecordError;
use super::traits::RecordStore;
use super::types::{PreparedVideo, PreparedVideoFilter};

fn db_err(e: rusqlite::Error) -> RecordError {
    RecordError::Database(e.to_string())
}

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open the database file, creating it and its tables if needed.
    pub fn new(path: &Path) -> Result<Self, RecordError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RecordError::Database(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, RecordError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RecordError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS prepared_videos (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                scenario TEXT NOT NULL,
                caption TEXT,
                url TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                checksum TEXT,
                duration_secs REAL NOT NULL,
                -- fixed-width RFC 3339 so text order is time order
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_prepared_videos_job ON prepared_videos(job_id);
            CREATE INDEX IF NOT EXISTS idx_prepared_videos_created ON prepared_videos(created_at);

            -- Target accounts, one row per account
            CREATE TABLE IF NOT EXISTS prepared_video_accounts (
                video_id TEXT NOT NULL REFERENCES prepared_videos(id) ON DELETE CASCADE,
                account TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (video_id, account)
            );

            CREATE INDEX IF NOT EXISTS idx_prepared_video_accounts_account
                ON prepared_video_accounts(account);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn load_accounts(conn: &Connection, video_id: &str) -> Result<Vec<String>, RecordError> {
        let mut stmt = conn
            .prepare(
                "SELECT account FROM prepared_video_accounts
                 WHERE video_id = ? ORDER BY position",
            )
            .map_err(db_err)?;
        let accounts = stmt
            .query_map(params![video_id], |row| row.get(0))
            .map_err(db_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(db_err)?;
        Ok(accounts)
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64, RecordError> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM prepared_videos", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as u64)
    }
}

impl RecordStore for SqliteRecordStore {
    fn add_prepared_video(&self, video: &PreparedVideo) -> Result<(), RecordError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "INSERT INTO prepared_videos
                (id, job_id, scenario, caption, url, size_bytes, checksum, duration_secs, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                video.id,
                video.job_id,
                video.scenario,
                video.caption,
                video.url,
                video.size_bytes as i64,
                video.checksum,
                video.duration_secs,
                video.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(db_err)?;

        for (position, account) in video.accounts.iter().enumerate() {
            tx.execute(
                "INSERT INTO prepared_video_accounts (video_id, account, position)
                 VALUES (?, ?, ?)",
                params![video.id, account, position as i64],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn get_one_prepared_video(
        &self,
        filter: &PreparedVideoFilter,
    ) -> Result<Option<PreparedVideo>, RecordError> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT id, job_id, scenario, caption, url, size_bytes, checksum,
                        duration_secs, created_at
                 FROM prepared_videos v
                 WHERE (?1 IS NULL OR v.job_id = ?1)
                   AND (?2 IS NULL OR v.scenario = ?2)
                   AND (?3 IS NULL OR EXISTS (
                        SELECT 1 FROM prepared_video_accounts a
                        WHERE a.video_id = v.id AND a.account = ?3))
                 ORDER BY v.created_at, v.rowid
                 LIMIT 1",
                params![filter.job_id, filter.scenario, filter.account],
                |row| {
                    let size_bytes: i64 = row.get(5)?;
                    let created_at: String = row.get(8)?;
                    Ok((
                        PreparedVideo {
                            id: row.get(0)?,
                            job_id: row.get(1)?,
                            scenario: row.get(2)?,
                            accounts: Vec::new(),
                            caption: row.get(3)?,
                            url: row.get(4)?,
                            size_bytes: size_bytes as u64,
                            checksum: row.get(6)?,
                            duration_secs: row.get(7)?,
                            created_at: Utc::now(),
                        },
                        created_at,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        let Some((mut video, created_at)) = row else {
            return Ok(None);
        };
        video.created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RecordError::Serialization(format!("created_at: {}", e)))?;
        video.accounts = Self::load_accounts(&conn, &video.id)?;
        Ok(Some(video))
    }
}
