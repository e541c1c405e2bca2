//! Filterable, sortable, paginated list queries.

pub mod cursor;
pub mod error;
pub mod filter;
pub mod options;
pub mod pagination;
pub mod record;
pub mod repository;
pub mod scope;
pub mod sort;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use error::QueryError;
pub use filter::Registry;
pub use options::{OptionValue, QueryOptions};
pub use pagination::{paginate, ListParams, PaginationMeta};
pub use record::Record;
pub use repository::Repository;
pub use scope::{Column, ColumnType, Predicate, Scope, Statement, Table};
pub use value::Value;
