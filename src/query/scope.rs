//! Immutable SQL scope builder.
//!
//! A [`Scope`] accumulates predicate fragments, an ordering and a window over
//! one base table. Every method consumes the scope and returns the narrowed
//! one; callers that need the original keep a clone. Rendering produces a
//! positional-parameter [`Statement`] ready for the store.

use super::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    Timestamp,
    #[allow(dead_code)]
    Blob,
}

impl ColumnType {
    pub fn is_orderable(self) -> bool {
        !matches!(self, ColumnType::Blob)
    }

    pub fn is_text(self) -> bool {
        matches!(self, ColumnType::Text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// Static description of a base collection.
#[derive(Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// A SQL boolean fragment with `?` placeholders and their bound values.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Matches no row at all.
    pub fn nothing() -> Self {
        Self::new("1 = 0", Vec::new())
    }

    /// `column IN (...)`; an empty set matches nothing.
    pub fn within(column: &str, values: Vec<Value>) -> Self {
        if values.is_empty() {
            return Self::nothing();
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        Self::new(format!("{column} IN ({placeholders})"), values)
    }

    pub fn all_of(parts: Vec<Predicate>) -> Self {
        Self::join(parts, " AND ")
    }

    pub fn any_of(parts: Vec<Predicate>) -> Self {
        Self::join(parts, " OR ")
    }

    fn join(parts: Vec<Predicate>, sep: &str) -> Self {
        let mut sql = Vec::with_capacity(parts.len());
        let mut params = Vec::new();
        for part in parts {
            sql.push(format!("({})", part.sql));
            params.extend(part.params);
        }
        Self::new(sql.join(sep), params)
    }
}

/// A rendered statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct Scope {
    table: &'static Table,
    predicates: Vec<Predicate>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Scope {
    pub fn new(table: &'static Table) -> Self {
        Self {
            table,
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &'static Table {
        self.table
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Replaces any previous ordering.
    pub fn reorder(mut self, terms: Vec<String>) -> Self {
        self.order = terms;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Drops limit and offset, keeping predicates and order.
    pub fn unwindowed(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn select_all(&self) -> Statement {
        let columns: Vec<&str> = self.table.column_names().collect();
        self.select(&columns)
    }

    pub fn select(&self, columns: &[&str]) -> Statement {
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), self.table.name);
        let mut params = self.push_where(&mut sql);
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ?");
                params.push(Value::Integer(clamp_i64(limit)));
                if let Some(offset) = offset {
                    sql.push_str(" OFFSET ?");
                    params.push(Value::Integer(clamp_i64(offset)));
                }
            }
            (None, Some(offset)) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(Value::Integer(clamp_i64(offset)));
            }
            (None, None) => {}
        }
        Statement { sql, params }
    }

    /// Counts matching rows, ignoring order and window.
    pub fn count(&self) -> Statement {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table.name);
        let params = self.push_where(&mut sql);
        Statement { sql, params }
    }

    fn push_where(&self, sql: &mut String) -> Vec<Value> {
        let mut params = Vec::new();
        if self.predicates.is_empty() {
            return params;
        }
        let clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|p| format!("({})", p.sql))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        for predicate in &self.predicates {
            params.extend(predicate.params.iter().cloned());
        }
        params
    }
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
