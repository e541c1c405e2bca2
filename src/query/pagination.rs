//! Request-scoped list parameters and the three pagination modes.

use std::str::FromStr;

use serde::Serialize;

use super::{
    cursor::{self, BoundaryCursors, NEXT_CURSOR, PREV_CURSOR},
    error::QueryError,
    filter::{self, LIMIT, OFFSET, PAGE},
    options::QueryOptions,
    record::Record,
    repository::Repository,
};
use crate::storage::traits::StorageRead;

pub const PAGINATION_TYPE: &str = "pagination_type";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaginationMode {
    Offset,
    Page,
    #[default]
    Cursor,
}

impl FromStr for PaginationMode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "offset_pagination" => Ok(PaginationMode::Offset),
            "page_pagination" => Ok(PaginationMode::Page),
            "" | "cursor_pagination" => Ok(PaginationMode::Cursor),
            other => Err(QueryError::InvalidPaginationType(other.to_string())),
        }
    }
}

/// Window parameters of one list request plus the filter options to hand to
/// the repository.
#[derive(Clone, Debug, PartialEq)]
pub struct ListParams {
    pub mode: PaginationMode,
    pub limit: u64,
    pub offset: u64,
    pub page: u64,
    pub options: QueryOptions,
}

impl ListParams {
    /// Validates the raw request options without touching the store.
    ///
    /// Keys that belong to another mode are dropped, so an `offset` sent
    /// along with a cursor request has no effect.
    pub fn from_options(raw: &QueryOptions, default_limit: u64) -> Result<Self, QueryError> {
        let mode = match raw.get(PAGINATION_TYPE).filter(|v| !v.is_blank()) {
            Some(value) => value.to_string().parse()?,
            None => PaginationMode::default(),
        };

        let limit = match raw.get(LIMIT) {
            Some(value) if !value.is_blank() => filter::parse_limit(value)?,
            _ => default_limit,
        };
        let offset = raw.get(OFFSET).map(filter::non_negative).unwrap_or(0);
        let page = raw.get(PAGE).map(filter::non_negative).unwrap_or(0);

        if raw.contains_key(NEXT_CURSOR) && raw.contains_key(PREV_CURSOR) {
            return Err(QueryError::ConflictingCursors);
        }

        let dropped: &[&str] = match mode {
            PaginationMode::Cursor => {
                for key in [NEXT_CURSOR, PREV_CURSOR] {
                    if let Some(value) = raw.get(key) {
                        cursor::parse_cursor(value)?;
                    }
                }
                &[PAGINATION_TYPE, OFFSET, PAGE]
            }
            PaginationMode::Offset => &[PAGINATION_TYPE, PAGE, NEXT_CURSOR, PREV_CURSOR],
            PaginationMode::Page => &[PAGINATION_TYPE, OFFSET, NEXT_CURSOR, PREV_CURSOR],
        };
        let options = raw.clone().without(dropped).with(LIMIT, limit);

        Ok(Self {
            mode,
            limit,
            offset,
            page,
            options,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PaginationMeta {
    Offset {
        limit: u64,
        current_offset: u64,
        next_offset: Option<u64>,
        prev_offset: u64,
    },
    Page {
        current_page: u64,
        next_page: Option<u64>,
        prev_page: Option<u64>,
        total_pages: u64,
    },
    Cursor {
        next_cursor: Option<i64>,
        prev_cursor: Option<i64>,
    },
}

impl PaginationMeta {
    pub fn offset(total: u64, limit: u64, offset: u64) -> Self {
        let next = offset.saturating_add(limit);
        PaginationMeta::Offset {
            limit,
            current_offset: offset,
            next_offset: (next < total).then_some(next),
            prev_offset: if offset > limit { offset - limit } else { 0 },
        }
    }

    /// Page numbers are 1-based; a requested page of 0 reads as the first.
    pub fn page(total: u64, limit: u64, page: u64) -> Self {
        let current_page = page.max(1);
        let total_pages = total.div_ceil(limit.max(1));
        PaginationMeta::Page {
            current_page,
            next_page: (current_page < total_pages).then_some(current_page + 1),
            prev_page: (current_page > 1).then_some(current_page - 1),
            total_pages,
        }
    }

    pub fn cursor(cursors: BoundaryCursors) -> Self {
        PaginationMeta::Cursor {
            next_cursor: cursors.next,
            prev_cursor: cursors.prev,
        }
    }
}

/// One materialised window.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// Rows matching the filters; only counted in offset and page modes.
    pub total: Option<u64>,
    pub pagination: PaginationMeta,
}

pub fn paginate<S>(repo: &Repository<S>, params: &ListParams) -> Result<Page, QueryError>
where
    S: StorageRead + Clone,
{
    let _span = tracing::debug_span!(
        "paginate",
        table = repo.scope().table().name,
        mode = ?params.mode,
        limit = params.limit
    )
    .entered();

    let window = repo.filter(&params.options)?.limited()?;
    let records = window.all()?;

    let (total, pagination) = match params.mode {
        PaginationMode::Offset => {
            let total = window.count()?;
            let meta = PaginationMeta::offset(total, params.limit, params.offset);
            (Some(total), meta)
        }
        PaginationMode::Page => {
            let total = window.count()?;
            let meta = PaginationMeta::page(total, params.limit, params.page);
            (Some(total), meta)
        }
        PaginationMode::Cursor => {
            let sort = window.sort_spec()?;
            let cursors = cursor::boundary_cursors(&records, &sort, params.limit);
            (None, PaginationMeta::cursor(cursors))
        }
    };

    log::debug!(
        "{}: {} records, total {:?}",
        repo.scope().table().name,
        records.len(),
        total
    );

    Ok(Page {
        records,
        total,
        pagination,
    })
}
