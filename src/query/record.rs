use std::collections::BTreeMap;

use anyhow::anyhow;

use super::{error::QueryError, scope::Table, sort::ID_COLUMN, value::Value};

static NULL: Value = Value::Null;

/// One row of a collection plus any preloaded belongs-to associations.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: i64,
    pub attributes: BTreeMap<String, Value>,
    pub associations: BTreeMap<String, Record>,
}

impl Record {
    /// Builds a record from a row selected with [`super::Scope::select_all`].
    pub fn from_row(table: &Table, row: Vec<Value>) -> Result<Self, QueryError> {
        if row.len() != table.columns.len() {
            return Err(anyhow!(
                "{}: expected {} columns, got {}",
                table.name,
                table.columns.len(),
                row.len()
            )
            .into());
        }
        let attributes: BTreeMap<String, Value> = table
            .column_names()
            .map(str::to_string)
            .zip(row)
            .collect();
        let id = attributes
            .get(ID_COLUMN)
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("{}: row without an integer id", table.name))?;
        Ok(Self {
            id,
            attributes,
            associations: BTreeMap::new(),
        })
    }

    /// Attribute value, `NULL` when the attribute is unknown.
    pub fn get(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&NULL)
    }

    pub fn association(&self, name: &str) -> Option<&Record> {
        self.associations.get(name)
    }
}
