use thiserror::Error;

use crate::query::{Predicate, Scope};
use crate::storage::StorageRead;

pub mod sleep_records;
pub mod users;

/// Failures of the follow and clock in/out actions.
///
/// Everything except [`WriteError::Storage`] is a rule the acting user broke.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("you cannot follow yourself")]
    SelfFollow,
    #[error("you are already following user {0}")]
    AlreadyFollowing(i64),
    #[error("you are not following user {0}")]
    NotFollowing(i64),
    #[error("there is already an active sleep record")]
    ActiveSleepRecord,
    #[error("there is no active sleep record")]
    NoActiveSleepRecord,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

fn ensure_user<S: StorageRead + ?Sized>(store: &S, id: i64) -> Result<(), WriteError> {
    let stmt = Scope::new(&users::USERS)
        .filter(Predicate::new("id = ?", vec![id.into()]))
        .count();
    match store.query_count(&stmt)? {
        0 => Err(WriteError::UserNotFound(id)),
        _ => Ok(()),
    }
}
