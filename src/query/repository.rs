//! Composable, immutable list queries over one base table.

use std::sync::Arc;

use super::{
    cursor::{NEXT_CURSOR, PREV_CURSOR},
    error::QueryError,
    filter::{self, FilterContext, Registry, LIMIT},
    options::{OptionValue, QueryOptions},
    record::Record,
    scope::{Predicate, Scope, Statement},
    sort::{SortSpec, ID_COLUMN},
};
use crate::storage::traits::StorageRead;

/// A narrowed scope plus the option set that produced it.
///
/// Every narrowing call returns a new repository; the receiver is left as it
/// was, so partially built repositories can be shared and extended freely.
#[derive(Clone)]
pub struct Repository<S> {
    store: S,
    registry: Arc<Registry>,
    scope: Scope,
    options: QueryOptions,
    includes: Vec<String>,
}

impl<S: StorageRead + Clone> Repository<S> {
    /// Builds a repository over `scope` and applies `defaults` (typically the
    /// default sort) before any caller filter.
    pub fn new(
        store: S,
        registry: Arc<Registry>,
        scope: Scope,
        defaults: QueryOptions,
    ) -> Result<Self, QueryError> {
        Self {
            store,
            registry,
            scope,
            options: QueryOptions::new(),
            includes: Vec::new(),
        }
        .filter(&defaults)
    }

    #[cfg(test)]
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Sort currently in effect.
    pub fn sort_spec(&self) -> Result<SortSpec, QueryError> {
        filter::sort_spec(self.scope.table(), &self.options)
    }

    /// Applies every registered filter named in `options`, in the order the
    /// keys were supplied, with `prev_cursor` moved to the end.
    pub fn filter(&self, options: &QueryOptions) -> Result<Self, QueryError> {
        if options.contains_key(NEXT_CURSOR) && options.contains_key(PREV_CURSOR) {
            return Err(QueryError::ConflictingCursors);
        }

        let merged = self.options.merge(options);
        let mut scope = self.scope.clone();
        for (name, value) in options.clone().with_last(PREV_CURSOR).iter() {
            let Some(apply) = self.registry.filter(name) else {
                log::trace!("{}: no filter named {name}", scope.table().name);
                continue;
            };
            log::trace!("{}: filter_by_{name}({value})", scope.table().name);
            scope = apply(
                FilterContext {
                    scope,
                    options: &merged,
                    store: &self.store,
                },
                value,
            )?;
        }

        Ok(Self {
            store: self.store.clone(),
            registry: Arc::clone(&self.registry),
            scope,
            options: merged,
            includes: self.includes.clone(),
        })
    }

    /// Adds associations to preload on [`Repository::all`].
    pub fn include(&self, names: &[&str]) -> Self {
        let mut includes = self.includes.clone();
        for name in names {
            if self.registry.include(name).is_none() {
                log::warn!("{}: unknown include {name}", self.scope.table().name);
                continue;
            }
            if !includes.iter().any(|n| n == name) {
                includes.push(name.to_string());
            }
        }
        Self {
            includes,
            ..self.clone()
        }
    }

    /// Re-applies the configured limit, or the default one if none is set.
    pub fn limited(&self) -> Result<Self, QueryError> {
        let limit = self
            .scope
            .limit_value()
            .map(OptionValue::from)
            .unwrap_or(OptionValue::Null);
        self.filter(&QueryOptions::new().with(LIMIT, limit))
    }

    /// Rows matching the scope, ignoring limit and offset.
    pub fn count(&self) -> Result<u64, QueryError> {
        Ok(self.store.query_count(&self.scope.count())?)
    }

    pub fn all(&self) -> Result<Vec<Record>, QueryError> {
        let stmt = self.scope.select_all();
        log::debug!("{} {:?}", stmt.sql, stmt.params);
        let mut records = self.load(&stmt)?;
        self.preload(&mut records)?;
        Ok(records)
    }

    /// One record of the scope by id, regardless of the window.
    pub fn get(&self, id: i64) -> Result<Option<Record>, QueryError> {
        let stmt = self
            .scope
            .clone()
            .unwindowed()
            .filter(Predicate::new(format!("{ID_COLUMN} = ?"), vec![id.into()]))
            .limit(1)
            .select_all();
        let mut records = self.load(&stmt)?;
        self.preload(&mut records)?;
        Ok(records.pop())
    }

    fn load(&self, stmt: &Statement) -> Result<Vec<Record>, QueryError> {
        let table = self.scope.table();
        self.store
            .query_rows(stmt)?
            .into_iter()
            .map(|row| Record::from_row(table, row))
            .collect()
    }

    fn preload(&self, records: &mut [Record]) -> Result<(), QueryError> {
        if records.is_empty() {
            return Ok(());
        }
        for name in &self.includes {
            if let Some(include) = self.registry.include(name) {
                include(&self.store, records)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{
        filter::{SORT_COLUMN, SORT_DIRECTION},
        testing::{durations_fixture, ids, Counting},
    };
    use crate::repositories::sleep_records::SLEEP_RECORDS;

    fn repo<S: StorageRead + Clone>(store: S, column: &str, direction: &str) -> Repository<S> {
        Repository::new(
            store,
            Arc::new(Registry::with_shared_filters()),
            Scope::new(&SLEEP_RECORDS),
            QueryOptions::new()
                .with(SORT_COLUMN, column)
                .with(SORT_DIRECTION, direction),
        )
        .unwrap()
    }

    fn page<S: StorageRead + Clone>(repo: &Repository<S>, options: QueryOptions) -> Vec<i64> {
        ids(&repo.filter(&options).unwrap().limited().unwrap().all().unwrap())
    }

    #[test]
    fn duplicate_keys_break_ties_on_id_in_sort_direction() {
        let store = durations_fixture(&[Some(5), Some(5), Some(5), Some(3), Some(3), Some(2), Some(1)]);
        let desc = repo(store.clone(), "duration", "desc");
        assert_eq!(page(&desc, QueryOptions::new().with(LIMIT, 3i64)), vec![3, 2, 1]);
        let asc = repo(store, "duration", "asc");
        assert_eq!(page(&asc, QueryOptions::new().with(LIMIT, 3i64)), vec![7, 6, 4]);
    }

    #[test]
    fn next_and_prev_cursor_walk_the_duplicate_scenario() {
        let store = durations_fixture(&[Some(5), Some(5), Some(5), Some(3), Some(3), Some(2), Some(1)]);
        let repo = repo(store, "duration", "desc");
        let with = |key: &str, id: i64| QueryOptions::new().with(LIMIT, 3i64).with(key, id);

        assert_eq!(page(&repo, with(NEXT_CURSOR, 1)), vec![5, 4, 6]);
        assert_eq!(page(&repo, with(NEXT_CURSOR, 6)), vec![7]);
        assert_eq!(page(&repo, with(PREV_CURSOR, 7)), vec![5, 4, 6]);
        assert_eq!(page(&repo, with(PREV_CURSOR, 5)), vec![3, 2, 1]);
    }

    #[test]
    fn prev_cursor_is_applied_after_every_other_option() {
        let store = durations_fixture(&[Some(5), Some(4), Some(3), Some(2), Some(1)]);
        let repo = repo(store, "id", "desc");
        // prev_cursor supplied before the sort override still sees the override
        let options = QueryOptions::new()
            .with(PREV_CURSOR, 3i64)
            .with(SORT_DIRECTION, "asc")
            .with(LIMIT, 2i64);
        assert_eq!(page(&repo, options), vec![1, 2]);
    }

    #[test]
    fn unknown_cursor_yields_an_empty_page() {
        let store = durations_fixture(&[Some(5), Some(4)]);
        let repo = repo(store, "duration", "desc");
        assert!(page(&repo, QueryOptions::new().with(NEXT_CURSOR, 99i64)).is_empty());
        assert!(page(&repo, QueryOptions::new().with(PREV_CURSOR, 99i64)).is_empty());
    }

    #[test]
    fn conflicting_cursors_fail_before_any_store_access() {
        let store = Counting::default();
        let repo = repo(store.clone(), "duration", "desc");
        let err = repo
            .filter(
                &QueryOptions::new()
                    .with(NEXT_CURSOR, 1i64)
                    .with(PREV_CURSOR, 2i64),
            )
            .err()
            .unwrap();
        assert!(matches!(err, QueryError::ConflictingCursors));
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn unknown_filters_are_ignored() {
        let store = durations_fixture(&[Some(1), Some(2), Some(3)]);
        let repo = repo(store, "id", "desc");
        let plain = page(&repo, QueryOptions::new());
        let noisy = page(&repo, QueryOptions::new().with("utm_source", "mail"));
        assert_eq!(plain, noisy);
    }

    #[test]
    fn filter_leaves_the_receiver_untouched() {
        let store = durations_fixture(&[Some(1), Some(2), Some(3)]);
        let base = repo(store, "id", "desc");
        let narrowed = base.filter(&QueryOptions::new().with("id", 2i64)).unwrap();
        assert_eq!(narrowed.count().unwrap(), 1);
        assert_eq!(base.count().unwrap(), 3);
        assert!(!base.options().contains_key("id"));
    }

    #[test]
    fn count_ignores_the_window() {
        let store = durations_fixture(&[Some(1), Some(2), Some(3), Some(4)]);
        let repo = repo(store, "id", "desc")
            .filter(&QueryOptions::new().with(LIMIT, 2i64).with("offset", 1i64))
            .unwrap();
        assert_eq!(repo.count().unwrap(), 4);
        assert_eq!(ids(&repo.all().unwrap()), vec![3, 2]);
    }

    #[test]
    fn page_filter_uses_the_merged_limit() {
        let store = durations_fixture(&[Some(1), Some(2), Some(3), Some(4), Some(5)]);
        let repo = repo(store, "id", "asc");
        let options = QueryOptions::new().with("page", 2i64).with(LIMIT, 2i64);
        assert_eq!(page(&repo, options), vec![3, 4]);
    }

    #[test]
    fn nulls_follow_the_requested_placement() {
        let store = durations_fixture(&[Some(2), None, Some(1)]);
        let desc = repo(store.clone(), "duration", "desc");
        assert_eq!(page(&desc, QueryOptions::new()), vec![1, 3, 2]);
        let first = page(&desc, QueryOptions::new().with("order_nulls", "first"));
        assert_eq!(first, vec![2, 1, 3]);
        let asc = repo(store, "duration", "asc");
        assert_eq!(page(&asc, QueryOptions::new()), vec![2, 3, 1]);
    }

    #[test]
    fn get_ignores_the_window_but_not_the_predicates() {
        let store = durations_fixture(&[Some(1), Some(2), Some(3)]);
        let repo = repo(store, "id", "desc")
            .filter(&QueryOptions::new().with(LIMIT, 1i64))
            .unwrap();
        assert_eq!(repo.get(1).unwrap().map(|r| r.id), Some(1));
        let only_two = repo.filter(&QueryOptions::new().with("id", 2i64)).unwrap();
        assert!(only_two.get(1).unwrap().is_none());
    }

    #[test]
    fn invalid_sort_column_is_reported() {
        let store = durations_fixture(&[Some(1)]);
        let repo = repo(store, "id", "desc");
        let err = repo
            .filter(&QueryOptions::new().with(SORT_COLUMN, "password"))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Column password does not exist");
    }
}
