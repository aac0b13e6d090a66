//! Row templates
//!
//! A row is an ordered set of named columns. A row may be built on top of a
//! parent row: the effective columns are computed once, at construction, as
//! the parent's columns with the child's values overriding on name collision.

use crate::value::{ColumnValue, Reference, Value};
use crate::{Error, Result};

/// A named row template inside a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row name, unique within its dataset
    pub name: String,
    /// Owning dataset, assigned when the row is added to a dataset
    dataset: String,
    /// Name of the row this one was derived from
    parent: Option<String>,
    /// Effective columns in declaration order
    columns: Vec<(String, ColumnValue)>,
}

impl Row {
    /// Create an empty row
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dataset: String::new(),
            parent: None,
            columns: Vec::new(),
        }
    }

    /// Create a row that starts with every column of `parent`
    pub fn inheriting(name: impl Into<String>, parent: &Row) -> Self {
        Self {
            name: name.into(),
            dataset: parent.dataset.clone(),
            parent: Some(parent.name.clone()),
            columns: parent.columns.clone(),
        }
    }

    /// Set a column, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column; an existing column keeps its position
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<ColumnValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Name of the owning dataset (empty for a detached row)
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub(crate) fn attach(&mut self, dataset: &str) {
        self.dataset = dataset.to_string();
    }

    /// Name of the parent row, if this row was derived from one
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Column names, own and inherited, in declaration order
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterate over `(column, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == column)
    }

    /// Look up a declared column.
    ///
    /// A column that is not declared is assumed to be assigned by the store
    /// (an auto-increment id, for example) and is only readable from the
    /// loaded data view, so the error says where to look instead.
    pub fn get(&self, column: &str) -> Result<&ColumnValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| self.not_loaded(column))
    }

    /// Look up a literal column value; reference columns resolve only after load
    pub fn literal(&self, column: &str) -> Result<&Value> {
        match self.get(column)? {
            ColumnValue::Literal(value) => Ok(value),
            ColumnValue::Ref(_) => Err(self.not_loaded(column)),
        }
    }

    /// A reference to one of this row's columns, for use in another row
    pub fn ref_column(&self, column: impl Into<String>) -> Reference {
        Reference::new(&self.dataset, &self.name, column)
    }

    /// A reference to this whole row, resolving to its primary key
    pub fn reference(&self) -> Reference {
        Reference::to_row(&self.dataset, &self.name)
    }

    /// References held by this row's columns, in column order
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.columns.iter().filter_map(|(_, value)| value.as_reference())
    }

    fn not_loaded(&self, column: &str) -> Error {
        Error::NotLoaded {
            dataset: self.dataset.clone(),
            row: self.name.clone(),
            column: column.to_string(),
        }
    }
}
