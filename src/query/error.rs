use thiserror::Error;

/// Failures raised while building or executing a list query.
///
/// Everything except [`QueryError::Storage`] is a request validation failure
/// and maps to a client error; storage failures are fatal for the request.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Column {0} does not exist")]
    InvalidSortColumn(String),
    #[error("sort direction must be asc/desc, got {0:?}")]
    InvalidSortDirection(String),
    #[error("column {0} cannot be used for sorting")]
    UnsupportedSortColumn(String),
    #[error("cursor must not be blank")]
    BlankCursor,
    #[error("next_cursor and prev_cursor cannot be used together")]
    ConflictingCursors,
    #[error("invalid cursor: {0:?}")]
    InvalidCursor(String),
    #[error("limit must be an integer between 1 and 1000, got {0:?}")]
    InvalidLimit(String),
    #[error("invalid pagination type: {0:?}")]
    InvalidPaginationType(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl QueryError {
    pub fn is_validation(&self) -> bool {
        !matches!(self, QueryError::Storage(_))
    }
}
