use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

use super::traits::{FollowCounts, NewSleepRecord, Storage, StorageRead, StorageTx, StorageWrite};
use crate::query::{Statement, Value};

pub(crate) const DB_SCHEMA_VERSION: i64 = 1;
/// Candidate ids bound per `IN (...)` lookup; stays under SQLite's variable limit.
const ID_CHUNK: usize = 500;

#[derive(Clone)]
pub struct SqliteStorage {
    pub path: String,
}

pub struct SqliteTx {
    conn: Connection,
}

impl StorageTx for SqliteTx {
    fn commit(self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }
}

fn db_query_rows(conn: &Connection, stmt: &Statement) -> rusqlite::Result<Vec<Vec<Value>>> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    let width = prepared.column_count();
    let rows = prepared
        .query_map(params_from_iter(stmt.params.iter()), |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn db_query_count(conn: &Connection, stmt: &Statement) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| {
        row.get(0)
    })?;
    Ok(count.max(0) as u64)
}

fn db_followed_ids_among(
    conn: &Connection,
    follower_id: i64,
    candidates: &[i64],
) -> rusqlite::Result<Vec<i64>> {
    let mut ids = Vec::new();
    for chunk in candidates.chunks(ID_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT followed_id FROM follows WHERE follower_id = ? AND followed_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let bound = std::iter::once(follower_id).chain(chunk.iter().copied());
        for id in stmt.query_map(params_from_iter(bound), |row| row.get(0))? {
            ids.push(id?);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

fn db_follow_counts(conn: &Connection, user_id: i64) -> rusqlite::Result<FollowCounts> {
    conn.query_row(
        r#"
        SELECT
            (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)
        "#,
        params![user_id],
        |row| {
            let followers: i64 = row.get(0)?;
            let followeds: i64 = row.get(1)?;
            Ok(FollowCounts {
                followers: followers as u64,
                followeds: followeds as u64,
            })
        },
    )
}

fn db_upsert_user(conn: &Connection, email: &str, now: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        r#"
        INSERT INTO users (email, created_at, updated_at)
        VALUES (?1, ?2, ?2)
        ON CONFLICT(email) DO UPDATE SET updated_at = excluded.updated_at
        RETURNING id
        "#,
        params![email, now],
        |row| row.get(0),
    )
}

fn db_insert_follow(
    conn: &Connection,
    follower_id: i64,
    followed_id: i64,
    now: i64,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        r#"
        INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at)
        VALUES (?1, ?2, ?3)
        "#,
        params![follower_id, followed_id, now],
    )?;
    Ok(inserted == 1)
}

fn db_delete_follow(
    conn: &Connection,
    follower_id: i64,
    followed_id: i64,
) -> rusqlite::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower_id, followed_id],
    )?;
    Ok(deleted == 1)
}

fn db_close_sleep_record(conn: &Connection, user_id: i64, now: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        r#"
        UPDATE sleep_records
        SET clock_out = ?2, duration = ?2 - clock_in, updated_at = ?2
        WHERE user_id = ?1 AND clock_out IS NULL
        RETURNING id
        "#,
        params![user_id, now],
        |row| row.get(0),
    )
    .optional()
}

fn db_insert_sleep_record(conn: &Connection, record: &NewSleepRecord) -> rusqlite::Result<i64> {
    let duration = record.clock_out.map(|out| out - record.clock_in);
    conn.execute(
        r#"
        INSERT INTO sleep_records (user_id, clock_in, clock_out, duration, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        "#,
        params![
            record.user_id,
            record.clock_in,
            record.clock_out,
            duration,
            record.created_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl StorageRead for SqliteTx {
    fn query_rows(&self, stmt: &Statement) -> Result<Vec<Vec<Value>>> {
        Ok(db_query_rows(&self.conn, stmt)?)
    }

    fn query_count(&self, stmt: &Statement) -> Result<u64> {
        Ok(db_query_count(&self.conn, stmt)?)
    }

    fn followed_ids_among(&self, follower_id: i64, candidates: &[i64]) -> Result<Vec<i64>> {
        Ok(db_followed_ids_among(&self.conn, follower_id, candidates)?)
    }

    fn follow_counts(&self, user_id: i64) -> Result<FollowCounts> {
        Ok(db_follow_counts(&self.conn, user_id)?)
    }
}

impl StorageWrite for SqliteTx {
    fn upsert_user(&self, email: &str, now: i64) -> Result<i64> {
        Ok(db_upsert_user(&self.conn, email, now)?)
    }

    fn insert_follow(&self, follower_id: i64, followed_id: i64, now: i64) -> Result<bool> {
        Ok(db_insert_follow(&self.conn, follower_id, followed_id, now)?)
    }

    fn delete_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        Ok(db_delete_follow(&self.conn, follower_id, followed_id)?)
    }

    fn insert_sleep_record(&self, record: &NewSleepRecord) -> Result<i64> {
        Ok(db_insert_sleep_record(&self.conn, record)?)
    }

    fn close_sleep_record(&self, user_id: i64, now: i64) -> Result<Option<i64>> {
        Ok(db_close_sleep_record(&self.conn, user_id, now)?)
    }
}

impl Storage for SqliteStorage {
    type Tx = SqliteTx;

    fn begin_tx(&self) -> Result<Self::Tx> {
        let conn = Self::open(&self.path)?;
        Self::migrate(&conn)?;

        conn.execute("BEGIN IMMEDIATE", [])?;

        Ok(SqliteTx { conn })
    }
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// Deletes the database file together with its WAL sidecars.
    pub fn reset_all(&self) -> Result<()> {
        for suffix in ["", "-wal", "-shm"] {
            let path = format!("{}{}", self.path, suffix);
            if std::path::Path::new(&path).exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    pub fn init(&self) -> Result<()> {
        self.with_conn(|_conn| Ok(()))?;
        Ok(())
    }

    fn open(path: &str) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_millis(500))?;
        Ok(conn)
    }

    fn with_conn<F, T>(&self, f: F) -> rusqlite::Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = Self::open(&self.path)?;
        Self::migrate(&conn)?;
        f(&conn)
    }

    fn migrate(conn: &Connection) -> rusqlite::Result<()> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version == DB_SCHEMA_VERSION {
            return Ok(());
        }

        log::info!(
            "SQLite schema migration: {} -> {}",
            version,
            DB_SCHEMA_VERSION
        );

        if version == 0 {
            conn.execute_batch(
                r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE follows (
                id INTEGER PRIMARY KEY,
                follower_id INTEGER NOT NULL REFERENCES users(id),
                followed_id INTEGER NOT NULL REFERENCES users(id),
                created_at INTEGER NOT NULL,
                UNIQUE (follower_id, followed_id)
            );
            CREATE INDEX follows_followed_idx ON follows(followed_id);
            CREATE TABLE sleep_records (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                clock_in INTEGER,
                clock_out INTEGER,
                duration INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX sleep_records_open_per_user_idx
                ON sleep_records(user_id)
                WHERE clock_out IS NULL;
            CREATE INDEX sleep_records_created_duration_idx
                ON sleep_records(created_at, duration, id);
            CREATE INDEX sleep_records_user_idx ON sleep_records(user_id);
            "#,
            )?;
            conn.pragma_update(None, "user_version", DB_SCHEMA_VERSION)?;
            return Ok(());
        }

        Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::ErrorCode::SchemaChanged as i32),
            Some("database schema version mismatch; please run with --reset option".to_string()),
        ))
    }
}

impl StorageRead for SqliteStorage {
    fn query_rows(&self, stmt: &Statement) -> Result<Vec<Vec<Value>>> {
        let rows = self.with_conn(|conn| db_query_rows(conn, stmt))?;
        Ok(rows)
    }

    fn query_count(&self, stmt: &Statement) -> Result<u64> {
        let count = self.with_conn(|conn| db_query_count(conn, stmt))?;
        Ok(count)
    }

    fn followed_ids_among(&self, follower_id: i64, candidates: &[i64]) -> Result<Vec<i64>> {
        let ids = self.with_conn(|conn| db_followed_ids_among(conn, follower_id, candidates))?;
        Ok(ids)
    }

    fn follow_counts(&self, user_id: i64) -> Result<FollowCounts> {
        let counts = self.with_conn(|conn| db_follow_counts(conn, user_id))?;
        Ok(counts)
    }
}
