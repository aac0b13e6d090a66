//! Datasets - named, ordered collections of row templates
//!
//! A dataset carries a [`Meta`] describing where its rows are stored and how
//! they are keyed. Rows may reference rows of other datasets; those datasets
//! become the dataset's references and must be loaded first.

use crate::row::Row;
use crate::value::{ColumnValue, Reference};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Dataset configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Explicit storage object (table or entity kind) to save rows into
    pub storable: Option<String>,
    /// Name to look the storage object up by, when `storable` is not set
    pub storable_name: Option<String>,
    /// Columns forming the primary key of stored rows
    pub primary_key: Vec<String>,
    /// Marks a reusable DataType: one shared instance per load operation
    pub shared: bool,
    /// Datasets this one depends on without a column referencing them
    pub depends_on: Vec<String>,
    /// Transitive references, dependency-first, filled in by the catalog
    #[serde(skip)]
    pub references: Vec<String>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            storable: None,
            storable_name: None,
            primary_key: vec!["id".to_string()],
            shared: false,
            depends_on: Vec::new(),
            references: Vec::new(),
        }
    }
}

impl Meta {
    /// Defaults with `config` applied on top; unset options keep their default
    pub fn merged(config: MetaConfig) -> Self {
        let mut meta = Self::default();
        meta.apply(config);
        meta
    }

    /// Apply the options that are set in `config`
    pub fn apply(&mut self, config: MetaConfig) {
        if let Some(storable) = config.storable {
            self.storable = Some(storable);
        }
        if let Some(storable_name) = config.storable_name {
            self.storable_name = Some(storable_name);
        }
        if let Some(primary_key) = config.primary_key {
            self.primary_key = primary_key;
        }
        if let Some(shared) = config.shared {
            self.shared = shared;
        }
        if let Some(depends_on) = config.depends_on {
            self.depends_on = depends_on;
        }
    }
}

/// Partial dataset configuration; only the options given here override the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaConfig {
    pub storable: Option<String>,
    pub storable_name: Option<String>,
    pub primary_key: Option<Vec<String>>,
    pub shared: Option<bool>,
    pub depends_on: Option<Vec<String>>,
}

impl MetaConfig {
    pub fn storable(mut self, storable: impl Into<String>) -> Self {
        self.storable = Some(storable.into());
        self
    }

    pub fn storable_name(mut self, name: impl Into<String>) -> Self {
        self.storable_name = Some(name.into());
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn depends_on<I, S>(mut self, datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = Some(datasets.into_iter().map(Into::into).collect());
        self
    }
}

/// A named collection of row templates.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    name: String,
    meta: Meta,
    rows: Vec<Row>,
}

impl DataSet {
    /// Create an empty dataset with default meta
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: Meta::default(),
            rows: Vec::new(),
        }
    }

    /// Create a DataType: a dataset shared by every dataset referencing it
    pub fn data_type(name: impl Into<String>) -> Self {
        let mut dataset = Self::new(name);
        dataset.meta.shared = true;
        dataset
    }

    /// Build a dataset from `(row name, columns)` pairs
    pub fn from_rows<I, R, C, V>(name: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = (R, Vec<(C, V)>)>,
        R: Into<String>,
        C: Into<String>,
        V: Into<ColumnValue>,
    {
        let mut dataset = Self::new(name);
        for (row_name, columns) in rows {
            let mut row = Row::new(row_name);
            for (column, value) in columns {
                row.set(column, value);
            }
            dataset.push_row(row);
        }
        dataset
    }

    /// Apply meta overrides, builder style
    pub fn with_meta(mut self, config: MetaConfig) -> Self {
        self.meta.apply(config);
        self
    }

    /// Add a row, builder style
    pub fn row(mut self, row: Row) -> Self {
        self.push_row(row);
        self
    }

    /// Add a row; a row with the same name is replaced in place
    pub fn push_row(&mut self, mut row: Row) {
        row.attach(&self.name);
        match self.rows.iter_mut().find(|r| r.name == row.name) {
            Some(slot) => *slot = row,
            None => self.rows.push(row),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    pub fn is_shared(&self) -> bool {
        self.meta.shared
    }

    /// Rows in declaration order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.rows.iter().map(|row| (row.name.as_str(), row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.name == row)
    }

    /// Look up a row, failing with the dataset and row name
    pub fn row_named(&self, row: &str) -> Result<&Row> {
        self.get(row).ok_or_else(|| Error::UnknownRow {
            dataset: self.name.clone(),
            row: row.to_string(),
        })
    }

    /// A reference to `row.column` of this dataset
    pub fn reference(&self, row: &str, column: &str) -> Result<Reference> {
        Ok(self.row_named(row)?.ref_column(column))
    }

    /// Datasets named directly by this dataset's rows and `depends_on`,
    /// in discovery order, without duplicates and without itself
    pub fn direct_references(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let row_refs = self.rows.iter().flat_map(|row| row.references()).map(|r| &r.dataset);

        for name in row_refs.chain(self.meta.depends_on.iter()) {
            if *name != self.name && !found.contains(name) {
                found.push(name.clone());
            }
        }
        found
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
