use anyhow::Result;

use crate::query::{Statement, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: u64,
    pub followeds: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSleepRecord {
    pub user_id: i64,
    pub clock_in: i64,
    pub clock_out: Option<i64>,
    pub created_at: i64,
}

pub trait StorageRead {
    /// Runs a rendered select and returns raw rows in select-list order.
    fn query_rows(&self, stmt: &Statement) -> Result<Vec<Vec<Value>>>;
    /// Runs a rendered `SELECT COUNT(*)`.
    fn query_count(&self, stmt: &Statement) -> Result<u64>;
    /// Subset of `candidates` that `follower_id` follows.
    fn followed_ids_among(&self, follower_id: i64, candidates: &[i64]) -> Result<Vec<i64>>;
    fn follow_counts(&self, user_id: i64) -> Result<FollowCounts>;
}

pub trait StorageWrite {
    /// Inserts a user or touches the existing one; returns its id.
    fn upsert_user(&self, email: &str, now: i64) -> Result<i64>;
    /// Returns false when the relationship already existed.
    fn insert_follow(&self, follower_id: i64, followed_id: i64, now: i64) -> Result<bool>;
    /// Returns false when there was no such relationship.
    fn delete_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;
    fn insert_sleep_record(&self, record: &NewSleepRecord) -> Result<i64>;
    /// Clocks out the user's open record, deriving its duration; `None` when
    /// nothing is open.
    fn close_sleep_record(&self, user_id: i64, now: i64) -> Result<Option<i64>>;
}

pub trait StorageTx: StorageRead + StorageWrite {
    fn commit(self) -> Result<()>;
}

pub trait Storage: StorageRead {
    type Tx: StorageTx;

    fn begin_tx(&self) -> Result<Self::Tx>;
}
