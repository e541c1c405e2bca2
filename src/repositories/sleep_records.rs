use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, OnceLock},
};

use super::{ensure_user, users::USERS, WriteError};
use crate::query::{
    filter::{FilterContext, SORT_COLUMN, SORT_DIRECTION},
    Column, ColumnType, OptionValue, Predicate, QueryError, QueryOptions, Record, Registry,
    Repository, Scope, Table, Value,
};
use crate::storage::{
    traits::{NewSleepRecord, StorageTx, StorageWrite},
    Storage, StorageRead,
};

pub static SLEEP_RECORDS: Table = Table {
    name: "sleep_records",
    columns: &[
        Column::new("id", ColumnType::Integer),
        Column::new("user_id", ColumnType::Integer),
        Column::new("clock_in", ColumnType::Timestamp),
        Column::new("clock_out", ColumnType::Timestamp),
        Column::new("duration", ColumnType::Integer),
        Column::new("created_at", ColumnType::Timestamp),
        Column::new("updated_at", ColumnType::Timestamp),
    ],
};

/// Restricts to records of users the acting user follows.
pub const FOLLOWING: &str = "following";
/// Id of the acting user; read by `following`.
pub const CURRENT_USER: &str = "current_user";
pub const USER: &str = "user";

pub const LISTING_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

fn registry() -> Arc<Registry> {
    static REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| {
            Arc::new(
                Registry::with_shared_filters()
                    .register(FOLLOWING, filter_by_following)
                    .register_include(USER, include_user),
            )
        })
        .clone()
}

/// Sleep records created during the week before `now`, longest first, with
/// their owner preloaded.
pub fn repository<S: StorageRead + Clone>(store: S, now: i64) -> Result<Repository<S>, QueryError> {
    let last_week = Scope::new(&SLEEP_RECORDS).filter(Predicate::new(
        "created_at > ?",
        vec![(now - LISTING_WINDOW_SECS).into()],
    ));
    let repo = Repository::new(
        store,
        registry(),
        last_week,
        QueryOptions::new()
            .with(SORT_COLUMN, "duration")
            .with(SORT_DIRECTION, "desc"),
    )?;
    Ok(repo.include(&[USER]))
}

/// Any sleep record by id with its owner, regardless of age.
pub fn find<S: StorageRead + Clone>(store: S, id: i64) -> Result<Option<Record>, QueryError> {
    Repository::new(
        store,
        registry(),
        Scope::new(&SLEEP_RECORDS),
        QueryOptions::new(),
    )?
    .include(&[USER])
    .get(id)
}

/// Opens a sleep record for `user_id` starting at `now`.
pub fn clock_in<S: Storage>(store: &S, user_id: i64, now: i64) -> Result<i64, WriteError> {
    let tx = store.begin_tx()?;
    ensure_user(&tx, user_id)?;
    let open = Scope::new(&SLEEP_RECORDS)
        .filter(Predicate::new(
            "user_id = ? AND clock_out IS NULL",
            vec![user_id.into()],
        ))
        .count();
    if tx.query_count(&open)? > 0 {
        return Err(WriteError::ActiveSleepRecord);
    }
    let id = tx.insert_sleep_record(&NewSleepRecord {
        user_id,
        clock_in: now,
        clock_out: None,
        created_at: now,
    })?;
    tx.commit()?;
    log::info!("user {} clocked in, record {}", user_id, id);
    Ok(id)
}

/// Closes the open sleep record of `user_id` at `now`.
pub fn clock_out<S: Storage>(store: &S, user_id: i64, now: i64) -> Result<i64, WriteError> {
    let tx = store.begin_tx()?;
    let id = tx
        .close_sleep_record(user_id, now)?
        .ok_or(WriteError::NoActiveSleepRecord)?;
    tx.commit()?;
    log::info!("user {} clocked out, record {}", user_id, id);
    Ok(id)
}

fn filter_by_following(ctx: FilterContext<'_>, value: &OptionValue) -> Result<Scope, QueryError> {
    if !value.is_truthy() {
        return Ok(ctx.scope);
    }
    let Some(viewer) = ctx.options.get(CURRENT_USER).and_then(OptionValue::as_i64) else {
        log::debug!("following requested without a current user");
        return Ok(ctx.scope.filter(Predicate::nothing()));
    };
    Ok(ctx.scope.filter(Predicate::new(
        "user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?)",
        vec![viewer.into()],
    )))
}

fn include_user(store: &dyn StorageRead, records: &mut [Record]) -> Result<(), QueryError> {
    let user_ids: BTreeSet<i64> = records
        .iter()
        .filter_map(|r| r.get("user_id").as_i64())
        .collect();

    let stmt = Scope::new(&USERS)
        .filter(Predicate::within(
            "id",
            user_ids.into_iter().map(Value::from).collect(),
        ))
        .select_all();
    let users: BTreeMap<i64, Record> = store
        .query_rows(&stmt)?
        .into_iter()
        .map(|row| Record::from_row(&USERS, row).map(|u| (u.id, u)))
        .collect::<Result<_, _>>()?;

    for record in records.iter_mut() {
        let owner = record
            .get("user_id")
            .as_i64()
            .and_then(|id| users.get(&id));
        if let Some(user) = owner {
            record.associations.insert(USER.to_string(), user.clone());
        }
    }
    Ok(())
}
