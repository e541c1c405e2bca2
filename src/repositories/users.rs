use std::{
    collections::BTreeSet,
    sync::{Arc, OnceLock},
};

use crate::query::{
    filter::{FilterContext, SORT_COLUMN, SORT_DIRECTION},
    Column, ColumnType, OptionValue, Predicate, QueryError, QueryOptions, Record, Registry,
    Repository, Scope, Table,
};
use super::{ensure_user, WriteError};
use crate::storage::{
    traits::{StorageTx, StorageWrite},
    Storage, StorageRead,
};

pub static USERS: Table = Table {
    name: "users",
    columns: &[
        Column::new("id", ColumnType::Integer),
        Column::new("email", ColumnType::Text),
        Column::new("created_at", ColumnType::Timestamp),
        Column::new("updated_at", ColumnType::Timestamp),
    ],
};

/// Case-insensitive e-mail substring search.
pub const Q: &str = "q";

fn registry() -> Arc<Registry> {
    static REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Arc::new(Registry::with_shared_filters().register(Q, filter_by_q)))
        .clone()
}

pub fn repository<S: StorageRead + Clone>(store: S) -> Result<Repository<S>, QueryError> {
    Repository::new(
        store,
        registry(),
        Scope::new(&USERS),
        QueryOptions::new()
            .with(SORT_COLUMN, "id")
            .with(SORT_DIRECTION, "desc"),
    )
}

fn filter_by_q(ctx: FilterContext<'_>, value: &OptionValue) -> Result<Scope, QueryError> {
    let Some(search) = value.as_text().map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(ctx.scope);
    };
    let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
    Ok(ctx.scope.filter(Predicate::new(
        r"LOWER(email) LIKE ? ESCAPE '\'",
        vec![pattern.into()],
    )))
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Ids among `records` that `viewer` follows, in one query.
pub fn followed_by<S: StorageRead>(
    store: &S,
    viewer: i64,
    records: &[Record],
) -> Result<BTreeSet<i64>, QueryError> {
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    Ok(store.followed_ids_among(viewer, &ids)?.into_iter().collect())
}

/// Makes `follower` follow `followed`.
pub fn follow<S: Storage>(
    store: &S,
    follower: i64,
    followed: i64,
    now: i64,
) -> Result<(), WriteError> {
    if follower == followed {
        return Err(WriteError::SelfFollow);
    }
    let tx = store.begin_tx()?;
    ensure_user(&tx, follower)?;
    ensure_user(&tx, followed)?;
    if !tx.insert_follow(follower, followed, now)? {
        return Err(WriteError::AlreadyFollowing(followed));
    }
    tx.commit()?;
    log::info!("user {} followed {}", follower, followed);
    Ok(())
}

pub fn unfollow<S: Storage>(store: &S, follower: i64, followed: i64) -> Result<(), WriteError> {
    let tx = store.begin_tx()?;
    ensure_user(&tx, followed)?;
    if !tx.delete_follow(follower, followed)? {
        return Err(WriteError::NotFollowing(followed));
    }
    tx.commit()?;
    log::info!("user {} unfollowed {}", follower, followed);
    Ok(())
}
