use std::cmp::Ordering;

use super::{error::QueryError, scope::Table, value::Value};

pub const ID_COLUMN: &str = "id";
pub const DEFAULT_SORT_COLUMN: &str = ID_COLUMN;
pub const DEFAULT_SORT_DIRECTION: &str = "desc";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(QueryError::InvalidSortDirection(other.to_string())),
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Comparison operator selecting rows that come strictly after a key.
    pub fn past_operator(self) -> &'static str {
        match self {
            SortDirection::Asc => ">",
            SortDirection::Desc => "<",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    fn flipped(self) -> Self {
        match self {
            NullsOrder::First => NullsOrder::Last,
            NullsOrder::Last => NullsOrder::First,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

/// A resolved ordering rule: primary column plus the `id` tie-break.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
    pub nulls: NullsOrder,
    pub case_insensitive: bool,
}

impl SortSpec {
    pub fn is_id(&self) -> bool {
        self.column == ID_COLUMN
    }

    /// SQL expression the primary key is ordered and compared by.
    pub fn expr(&self) -> String {
        if self.case_insensitive {
            format!("LOWER({})", self.column)
        } else {
            self.column.clone()
        }
    }

    pub fn order_terms(&self) -> Vec<String> {
        let id_term = format!("{} {}", ID_COLUMN, self.direction.as_sql());
        if self.is_id() {
            return vec![id_term];
        }
        vec![
            format!(
                "{} {} {}",
                self.expr(),
                self.direction.as_sql(),
                self.nulls.as_sql()
            ),
            id_term,
        ]
    }

    /// The same ordering walked backwards.
    pub fn reversed(&self) -> SortSpec {
        SortSpec {
            column: self.column.clone(),
            direction: self.direction.reversed(),
            nulls: self.nulls.flipped(),
            case_insensitive: self.case_insensitive,
        }
    }

    /// Normalises a raw attribute value into the key the ordering sees.
    pub fn key_of(&self, value: &Value) -> Value {
        if self.case_insensitive {
            value.lowercased()
        } else {
            value.clone()
        }
    }

    /// Compares two primary keys in display order.
    pub fn compare_keys(&self, a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match self.nulls {
                NullsOrder::First => Ordering::Less,
                NullsOrder::Last => Ordering::Greater,
            },
            (false, true) => match self.nulls {
                NullsOrder::First => Ordering::Greater,
                NullsOrder::Last => Ordering::Less,
            },
            (false, false) => {
                let ord = a.sql_cmp(b);
                match self.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        }
    }

    /// Compares two `(key, id)` pairs in display order.
    pub fn compare(&self, a: (&Value, i64), b: (&Value, i64)) -> Ordering {
        let ids = match self.direction {
            SortDirection::Asc => a.1.cmp(&b.1),
            SortDirection::Desc => b.1.cmp(&a.1),
        };
        if self.is_id() {
            return ids;
        }
        self.compare_keys(a.0, b.0).then(ids)
    }
}

/// Validates a requested sort against `table` and builds its ordering rule.
///
/// Blank inputs fall back to `id` / `desc`. NULLs sort first when ascending
/// and last when descending unless `nulls` says otherwise.
pub fn resolve(
    table: &Table,
    column: Option<&str>,
    direction: Option<&str>,
    nulls: Option<&str>,
    case_insensitive: bool,
) -> Result<SortSpec, QueryError> {
    let column = column
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_SORT_COLUMN);
    let direction = direction
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_SORT_DIRECTION);

    let def = table
        .column(column)
        .ok_or_else(|| QueryError::InvalidSortColumn(column.to_string()))?;
    let direction = SortDirection::parse(direction)?;
    if !def.ty.is_orderable() {
        return Err(QueryError::UnsupportedSortColumn(column.to_string()));
    }

    let nulls = match nulls.map(str::trim).filter(|n| !n.is_empty()) {
        Some("first") => NullsOrder::First,
        Some(_) => NullsOrder::Last,
        None => match direction {
            SortDirection::Asc => NullsOrder::First,
            SortDirection::Desc => NullsOrder::Last,
        },
    };

    Ok(SortSpec {
        column: def.name.to_string(),
        direction,
        nulls,
        case_insensitive: case_insensitive && def.ty.is_text(),
    })
}
