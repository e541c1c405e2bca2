//! Named filter dispatch.
//!
//! Every repository owns a [`Registry`] mapping option names to predicate
//! builders. Names without an entry are ignored so callers can pass extra
//! request parameters through untouched.

use std::collections::BTreeMap;

use super::{
    cursor,
    error::QueryError,
    options::{OptionValue, QueryOptions},
    record::Record,
    scope::{Predicate, Scope, Table},
    sort::{self, SortSpec},
};
use crate::storage::traits::StorageRead;

pub const DEFAULT_LIMIT: u64 = 10;
/// Largest window a single request may ask for.
pub const MAX_LIMIT: u64 = 1000;
pub const DEFAULT_OFFSET: u64 = 0;

pub const LIMIT: &str = "limit";
pub const OFFSET: &str = "offset";
pub const PAGE: &str = "page";
pub const SORT_COLUMN: &str = "sort_column";
pub const SORT_DIRECTION: &str = "sort_direction";
pub const ORDER_NULLS: &str = "order_nulls";
pub const CASE_INSENSITIVE: &str = "case_insensitive";

/// What a filter sees: the scope narrowed so far, the merged option set and
/// the store for filters that need a lookup.
pub struct FilterContext<'a> {
    pub scope: Scope,
    pub options: &'a QueryOptions,
    pub store: &'a dyn StorageRead,
}

pub type FilterFn = fn(FilterContext<'_>, &OptionValue) -> Result<Scope, QueryError>;

/// Preloads an association for a whole window in one query.
pub type IncludeFn = fn(&dyn StorageRead, &mut [Record]) -> Result<(), QueryError>;

#[derive(Default)]
pub struct Registry {
    filters: BTreeMap<&'static str, FilterFn>,
    includes: BTreeMap<&'static str, IncludeFn>,
}

impl Registry {
    /// A registry preloaded with the window, sort, id and cursor filters.
    /// Every sort-related key re-applies the sort from the merged options.
    pub fn with_shared_filters() -> Self {
        Self::default()
            .register(LIMIT, filter_by_limit)
            .register(OFFSET, filter_by_offset)
            .register(PAGE, filter_by_page)
            .register("id", filter_by_id)
            .register(SORT_COLUMN, filter_by_sort)
            .register(SORT_DIRECTION, filter_by_sort)
            .register(ORDER_NULLS, filter_by_sort)
            .register(CASE_INSENSITIVE, filter_by_sort)
            .register(cursor::NEXT_CURSOR, cursor::filter_by_next_cursor)
            .register(cursor::PREV_CURSOR, cursor::filter_by_prev_cursor)
    }

    pub fn register(mut self, name: &'static str, filter: FilterFn) -> Self {
        self.filters.insert(name, filter);
        self
    }

    pub fn register_include(mut self, name: &'static str, include: IncludeFn) -> Self {
        self.includes.insert(name, include);
        self
    }

    pub fn filter(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }

    pub fn include(&self, name: &str) -> Option<IncludeFn> {
        self.includes.get(name).copied()
    }
}

/// The active sort as described by `options`.
pub fn sort_spec(table: &Table, options: &QueryOptions) -> Result<SortSpec, QueryError> {
    let text = |key: &str| {
        options
            .get(key)
            .filter(|v| !v.is_blank())
            .map(ToString::to_string)
    };
    let column = text(SORT_COLUMN);
    let direction = text(SORT_DIRECTION);
    let nulls = text(ORDER_NULLS);
    let case_insensitive = options
        .get(CASE_INSENSITIVE)
        .is_some_and(OptionValue::is_truthy);
    sort::resolve(
        table,
        column.as_deref(),
        direction.as_deref(),
        nulls.as_deref(),
        case_insensitive,
    )
}

/// Window size from `options`, defaulting when unset.
pub fn limit_of(options: &QueryOptions) -> Result<u64, QueryError> {
    match options.get(LIMIT) {
        None => Ok(DEFAULT_LIMIT),
        Some(value) => parse_limit(value),
    }
}

pub fn parse_limit(value: &OptionValue) -> Result<u64, QueryError> {
    if value.is_blank() {
        return Ok(DEFAULT_LIMIT);
    }
    value
        .as_i64()
        .and_then(|v| u64::try_from(v).ok())
        .filter(|v| (1..=MAX_LIMIT).contains(v))
        .ok_or_else(|| QueryError::InvalidLimit(value.to_string()))
}

/// Lenient non-negative integer: unparsable or negative input reads as zero.
pub fn non_negative(value: &OptionValue) -> u64 {
    value
        .as_i64()
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(0)
}

fn filter_by_limit(ctx: FilterContext<'_>, value: &OptionValue) -> Result<Scope, QueryError> {
    Ok(ctx.scope.limit(parse_limit(value)?))
}

fn filter_by_offset(ctx: FilterContext<'_>, value: &OptionValue) -> Result<Scope, QueryError> {
    let offset = if value.is_blank() {
        DEFAULT_OFFSET
    } else {
        non_negative(value)
    };
    Ok(ctx.scope.offset(offset))
}

fn filter_by_page(ctx: FilterContext<'_>, value: &OptionValue) -> Result<Scope, QueryError> {
    let page = non_negative(value);
    if page <= 1 {
        return Ok(ctx.scope.offset(DEFAULT_OFFSET));
    }
    let limit = limit_of(ctx.options)?;
    Ok(ctx.scope.offset(limit.saturating_mul(page - 1)))
}

fn filter_by_id(ctx: FilterContext<'_>, value: &OptionValue) -> Result<Scope, QueryError> {
    let predicate = match value.as_i64() {
        Some(id) => Predicate::new("id = ?", vec![id.into()]),
        None => Predicate::nothing(),
    };
    Ok(ctx.scope.filter(predicate))
}

fn filter_by_sort(ctx: FilterContext<'_>, _value: &OptionValue) -> Result<Scope, QueryError> {
    let spec = sort_spec(ctx.scope.table(), ctx.options)?;
    log::trace!("ordering {} by {:?}", ctx.scope.table().name, spec.order_terms());
    Ok(ctx.scope.reorder(spec.order_terms()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup_is_by_exact_name() {
        let registry = Registry::with_shared_filters();
        assert!(registry.filter("limit").is_some());
        assert!(registry.filter("next_cursor").is_some());
        assert!(registry.filter("filter_by_limit").is_none());
        assert!(registry.filter("bogus").is_none());
        assert!(registry.include("user").is_none());
    }

    #[test]
    fn parse_limit_defaults_and_validates() {
        assert_eq!(parse_limit(&OptionValue::Null).unwrap(), DEFAULT_LIMIT);
        assert_eq!(parse_limit(&OptionValue::from("25")).unwrap(), 25);
        assert!(matches!(
            parse_limit(&OptionValue::from("0")),
            Err(QueryError::InvalidLimit(_))
        ));
        assert!(matches!(
            parse_limit(&OptionValue::from("many")),
            Err(QueryError::InvalidLimit(_))
        ));
    }

    #[test]
    fn parse_limit_caps_the_window() {
        assert_eq!(parse_limit(&OptionValue::from("1000")).unwrap(), MAX_LIMIT);
        let err = parse_limit(&OptionValue::from("40000")).unwrap_err();
        assert!(matches!(err, QueryError::InvalidLimit(ref got) if got == "40000"));
        assert!(err.is_validation());
    }

    #[test]
    fn non_negative_is_lenient() {
        assert_eq!(non_negative(&OptionValue::from("-3")), 0);
        assert_eq!(non_negative(&OptionValue::from("abc")), 0);
        assert_eq!(non_negative(&OptionValue::Int(4)), 4);
    }

    #[test]
    fn limit_of_reads_merged_options() {
        let options = QueryOptions::new().with(LIMIT, 3i64);
        assert_eq!(limit_of(&options).unwrap(), 3);
        assert_eq!(limit_of(&QueryOptions::new()).unwrap(), DEFAULT_LIMIT);
    }
}
