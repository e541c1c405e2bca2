//! Keyset ("cursor") windows.
//!
//! A cursor is the id of a row the caller has already seen. The window after
//! it is selected with the two-column keyset predicate
//! `(key past v) OR (key = v AND id past X)`, which stays correct when the
//! sort column holds duplicates. The window before it is captured by walking
//! the reversed ordering and then restricting the outer scope to those ids so
//! every other active filter and the display order still apply.

use std::cmp::Ordering;

use serde::Serialize;

use super::{
    error::QueryError,
    filter::{self, FilterContext},
    options::OptionValue,
    record::Record,
    scope::{Predicate, Scope},
    sort::{NullsOrder, SortSpec, ID_COLUMN},
    value::Value,
};
use crate::storage::traits::StorageRead;

pub const NEXT_CURSOR: &str = "next_cursor";
pub const PREV_CURSOR: &str = "prev_cursor";

pub fn parse_cursor(value: &OptionValue) -> Result<i64, QueryError> {
    if value.is_blank() {
        return Err(QueryError::BlankCursor);
    }
    value
        .as_i64()
        .ok_or_else(|| QueryError::InvalidCursor(value.to_string()))
}

pub(super) fn filter_by_next_cursor(
    ctx: FilterContext<'_>,
    value: &OptionValue,
) -> Result<Scope, QueryError> {
    let id = parse_cursor(value)?;
    let sort = filter::sort_spec(ctx.scope.table(), ctx.options)?;
    window_after(ctx.store, ctx.scope, &sort, id)
}

pub(super) fn filter_by_prev_cursor(
    ctx: FilterContext<'_>,
    value: &OptionValue,
) -> Result<Scope, QueryError> {
    let id = parse_cursor(value)?;
    let sort = filter::sort_spec(ctx.scope.table(), ctx.options)?;
    let limit = filter::limit_of(ctx.options)?;
    window_before(ctx.store, ctx.scope, &sort, id, limit)
}

/// Narrows `scope` to the rows strictly after cursor `id`.
///
/// A cursor that does not resolve inside `scope` yields an empty window.
pub fn window_after(
    store: &dyn StorageRead,
    scope: Scope,
    sort: &SortSpec,
    id: i64,
) -> Result<Scope, QueryError> {
    let Some(key) = cursor_key(store, &scope, sort, id)? else {
        log::debug!("next_cursor {} not found in {}", id, scope.table().name);
        return Ok(scope.filter(Predicate::nothing()));
    };
    Ok(scope.filter(keyset_predicate(sort, &key, id)))
}

/// Narrows `scope` to the `limit` rows immediately before cursor `id`,
/// keeping the display order of `sort`.
pub fn window_before(
    store: &dyn StorageRead,
    scope: Scope,
    sort: &SortSpec,
    id: i64,
    limit: u64,
) -> Result<Scope, QueryError> {
    let Some(key) = cursor_key(store, &scope, sort, id)? else {
        log::debug!("prev_cursor {} not found in {}", id, scope.table().name);
        return Ok(scope.filter(Predicate::nothing()));
    };
    let reversed = sort.reversed();
    let preceding = scope
        .clone()
        .unwindowed()
        .filter(keyset_predicate(&reversed, &key, id))
        .reorder(reversed.order_terms())
        .limit(limit)
        .select(&[ID_COLUMN]);
    // Embedded as a subquery so the capture costs no extra round trip.
    let captured = Predicate::new(
        format!("{ID_COLUMN} IN ({})", preceding.sql),
        preceding.params,
    );
    Ok(scope.filter(captured).reorder(sort.order_terms()))
}

/// Sort key of row `id` within `scope`, `None` when the row is not in it.
fn cursor_key(
    store: &dyn StorageRead,
    scope: &Scope,
    sort: &SortSpec,
    id: i64,
) -> Result<Option<Value>, QueryError> {
    let expr = sort.expr();
    let lookup = scope
        .clone()
        .unwindowed()
        .reorder(Vec::new())
        .filter(Predicate::new(format!("{ID_COLUMN} = ?"), vec![id.into()]))
        .limit(1)
        .select(&[expr.as_str()]);
    let rows = store.query_rows(&lookup)?;
    Ok(rows
        .into_iter()
        .next()
        .map(|row| row.into_iter().next().unwrap_or(Value::Null)))
}

/// Rows strictly past `(key, id)` in the order described by `sort`.
pub fn keyset_predicate(sort: &SortSpec, key: &Value, id: i64) -> Predicate {
    let op = sort.direction.past_operator();
    let id_past = Predicate::new(format!("{ID_COLUMN} {op} ?"), vec![id.into()]);
    if sort.is_id() {
        return id_past;
    }

    let expr = sort.expr();
    let is_null = || Predicate::new(format!("{expr} IS NULL"), Vec::new());
    let nulls_first = sort.nulls == NullsOrder::First;

    if key.is_null() {
        let null_tail = Predicate::all_of(vec![is_null(), id_past]);
        return if nulls_first {
            Predicate::any_of(vec![
                Predicate::new(format!("{expr} IS NOT NULL"), Vec::new()),
                null_tail,
            ])
        } else {
            null_tail
        };
    }

    let mut parts = vec![
        Predicate::new(format!("{expr} {op} ?"), vec![key.clone()]),
        Predicate::all_of(vec![
            Predicate::new(format!("{expr} = ?"), vec![key.clone()]),
            id_past,
        ]),
    ];
    if !nulls_first {
        parts.push(is_null());
    }
    Predicate::any_of(parts)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoundaryCursors {
    pub next: Option<i64>,
    pub prev: Option<i64>,
}

#[derive(Clone, Copy)]
enum Edge {
    Leading,
    Trailing,
}

/// Cursors a client should send to move off the page it was just given.
///
/// There is no next cursor when the page is empty or shorter than `limit`,
/// and no prev cursor when it is empty. When sorting by `id` both cursors
/// point at the last row of the page.
pub fn boundary_cursors(records: &[Record], sort: &SortSpec, limit: u64) -> BoundaryCursors {
    let full = !records.is_empty() && records.len() as u64 >= limit;

    if sort.is_id() {
        let last = records.last().map(|r| r.id);
        return BoundaryCursors {
            next: if full { last } else { None },
            prev: last,
        };
    }

    BoundaryCursors {
        next: if full {
            boundary(records, sort, Edge::Trailing)
        } else {
            None
        },
        prev: boundary(records, sort, Edge::Leading),
    }
}

/// Picks the extreme sort-key group on `edge`, then the extreme id inside it.
fn boundary(records: &[Record], sort: &SortSpec, edge: Edge) -> Option<i64> {
    let keyed: Vec<(Value, i64)> = records
        .iter()
        .map(|r| (sort.key_of(r.get(&sort.column)), r.id))
        .collect();
    let toward = |ord: Ordering| match edge {
        Edge::Trailing => ord,
        Edge::Leading => ord.reverse(),
    };

    let extreme = keyed
        .iter()
        .map(|(key, _)| key)
        .max_by(|a, b| toward(sort.compare_keys(a, b)))?;

    keyed
        .iter()
        .filter(|(key, _)| sort.compare_keys(key, extreme) == Ordering::Equal)
        .map(|(_, id)| *id)
        .max_by(|a, b| toward(sort.compare((extreme, *a), (extreme, *b))))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::query::sort::SortDirection;

    fn spec(column: &str, direction: SortDirection) -> SortSpec {
        SortSpec {
            column: column.to_string(),
            direction,
            nulls: match direction {
                SortDirection::Asc => NullsOrder::First,
                SortDirection::Desc => NullsOrder::Last,
            },
            case_insensitive: false,
        }
    }

    fn record(id: i64, duration: Option<i64>) -> Record {
        let mut attributes = BTreeMap::new();
        attributes.insert("id".to_string(), Value::Integer(id));
        attributes.insert("duration".to_string(), Value::from(duration));
        Record {
            id,
            attributes,
            associations: BTreeMap::new(),
        }
    }

    #[test]
    fn parse_cursor_rejects_blank_and_garbage() {
        assert!(matches!(
            parse_cursor(&OptionValue::from("")),
            Err(QueryError::BlankCursor)
        ));
        assert!(matches!(
            parse_cursor(&OptionValue::Null),
            Err(QueryError::BlankCursor)
        ));
        assert!(matches!(
            parse_cursor(&OptionValue::from("abc")),
            Err(QueryError::InvalidCursor(_))
        ));
        assert_eq!(parse_cursor(&OptionValue::from("12")).unwrap(), 12);
    }

    #[test]
    fn keyset_on_id_is_a_single_comparison() {
        let p = keyset_predicate(&spec("id", SortDirection::Desc), &Value::Integer(9), 9);
        assert_eq!(p.sql, "id < ?");
        assert_eq!(p.params, vec![Value::Integer(9)]);
    }

    #[test]
    fn keyset_ascending_excludes_leading_nulls() {
        let p = keyset_predicate(&spec("duration", SortDirection::Asc), &Value::Integer(5), 3);
        assert_eq!(p.sql, "(duration > ?) OR ((duration = ?) AND (id > ?))");
        assert_eq!(
            p.params,
            vec![Value::Integer(5), Value::Integer(5), Value::Integer(3)]
        );
    }

    #[test]
    fn keyset_descending_keeps_trailing_nulls() {
        let p = keyset_predicate(&spec("duration", SortDirection::Desc), &Value::Integer(5), 3);
        assert_eq!(
            p.sql,
            "(duration < ?) OR ((duration = ?) AND (id < ?)) OR (duration IS NULL)"
        );
    }

    #[test]
    fn keyset_from_a_null_key() {
        let asc = keyset_predicate(&spec("duration", SortDirection::Asc), &Value::Null, 3);
        assert_eq!(
            asc.sql,
            "(duration IS NOT NULL) OR ((duration IS NULL) AND (id > ?))"
        );
        let desc = keyset_predicate(&spec("duration", SortDirection::Desc), &Value::Null, 3);
        assert_eq!(desc.sql, "(duration IS NULL) AND (id < ?)");
    }

    #[test]
    fn boundary_cursors_for_duplicate_heavy_descending_page() {
        // durations 5,5,5 shown as ids 3,2,1
        let page = vec![
            record(3, Some(5)),
            record(2, Some(5)),
            record(1, Some(5)),
        ];
        let cursors = boundary_cursors(&page, &spec("duration", SortDirection::Desc), 3);
        assert_eq!(cursors.next, Some(1));
        assert_eq!(cursors.prev, Some(3));
    }

    #[test]
    fn boundary_cursors_pick_group_then_id() {
        let page = vec![record(5, Some(3)), record(4, Some(3)), record(6, Some(2))];
        let desc = boundary_cursors(&page, &spec("duration", SortDirection::Desc), 3);
        assert_eq!(desc.next, Some(6));
        assert_eq!(desc.prev, Some(5));

        let page = vec![record(6, Some(2)), record(4, Some(3)), record(5, Some(3))];
        let asc = boundary_cursors(&page, &spec("duration", SortDirection::Asc), 3);
        assert_eq!(asc.next, Some(5));
        assert_eq!(asc.prev, Some(6));
    }

    #[test]
    fn short_or_empty_pages_have_no_next_cursor() {
        let sort = spec("duration", SortDirection::Desc);
        let short = boundary_cursors(&[record(7, Some(1))], &sort, 3);
        assert_eq!(short.next, None);
        assert_eq!(short.prev, Some(7));
        assert_eq!(boundary_cursors(&[], &sort, 3), BoundaryCursors::default());
    }

    #[test]
    fn id_sort_points_both_cursors_at_the_last_row() {
        let page = vec![record(9, None), record(8, None)];
        let cursors = boundary_cursors(&page, &spec("id", SortDirection::Desc), 2);
        assert_eq!(cursors.next, Some(8));
        assert_eq!(cursors.prev, Some(8));
    }

    #[test]
    fn nulls_respect_their_placement() {
        // desc puts NULL last
        let page = vec![record(2, Some(4)), record(9, None), record(8, None)];
        let cursors = boundary_cursors(&page, &spec("duration", SortDirection::Desc), 3);
        assert_eq!(cursors.next, Some(8));
        assert_eq!(cursors.prev, Some(2));
    }
}
