use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Result;

use super::{record::Record, scope::Statement, value::Value};
use crate::storage::{
    traits::{FollowCounts, NewSleepRecord, StorageTx, StorageWrite},
    Storage, SqliteStorage, StorageRead,
};

pub const FIXTURE_NOW: i64 = 1_700_000_000;

pub fn unique_temp_file(prefix: &str, ext: &str) -> PathBuf {
    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let mut p = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    p.push(format!("{}_{}_{}_{}.{}", prefix, std::process::id(), nanos, seq, ext));
    p
}

/// One sleep record per entry, ids 1..=n in order, each owned by its own
/// user so open (NULL duration) records do not collide.
pub fn durations_fixture(durations: &[Option<i64>]) -> SqliteStorage {
    let storage = SqliteStorage::new(unique_temp_file("sleeplog_fixture", "db"));
    storage.init().unwrap();
    let tx = storage.begin_tx().unwrap();
    for (i, duration) in durations.iter().enumerate() {
        let user_id = tx
            .upsert_user(&format!("user{i}@example.com"), FIXTURE_NOW)
            .unwrap();
        let clock_in = FIXTURE_NOW - 86_400;
        tx.insert_sleep_record(&NewSleepRecord {
            user_id,
            clock_in,
            clock_out: duration.map(|d| clock_in + d),
            created_at: FIXTURE_NOW - 60,
        })
        .unwrap();
    }
    tx.commit().unwrap();
    storage
}

pub fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| r.id).collect()
}

/// Counts store round trips, forwarding to `inner` when there is one and
/// answering nothing otherwise.
#[derive(Clone, Default)]
pub struct Counting {
    inner: Option<SqliteStorage>,
    calls: Arc<AtomicUsize>,
}

impl Counting {
    pub fn wrapping(inner: SqliteStorage) -> Self {
        Self {
            inner: Some(inner),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) -> Option<&SqliteStorage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.as_ref()
    }
}

impl StorageRead for Counting {
    fn query_rows(&self, stmt: &Statement) -> Result<Vec<Vec<Value>>> {
        match self.hit() {
            Some(inner) => inner.query_rows(stmt),
            None => Ok(Vec::new()),
        }
    }

    fn query_count(&self, stmt: &Statement) -> Result<u64> {
        match self.hit() {
            Some(inner) => inner.query_count(stmt),
            None => Ok(0),
        }
    }

    fn followed_ids_among(&self, follower_id: i64, candidates: &[i64]) -> Result<Vec<i64>> {
        match self.hit() {
            Some(inner) => inner.followed_ids_among(follower_id, candidates),
            None => Ok(Vec::new()),
        }
    }

    fn follow_counts(&self, user_id: i64) -> Result<FollowCounts> {
        match self.hit() {
            Some(inner) => inner.follow_counts(user_id),
            None => Ok(FollowCounts::default()),
        }
    }
}
