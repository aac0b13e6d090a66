//! Loaded data views
//!
//! After a load, every dataset is handed back as a [`LoadedDataSet`] whose rows
//! carry resolved column values plus whatever the store generated. Several
//! loaded datasets can be viewed together:
//! - [`SuperSet`]: namespaced by dataset, `data["Books"]["lolita"]["title"]`
//! - [`MergedSuperSet`]: one flat namespace of rows, `data["lolita"]["title"]`

use std::collections::HashMap;
use std::ops::Index;

use tracing::warn;

use crate::config::CollisionPolicy;
use crate::dataset::DataSet;
use crate::value::{ColumnValue, Value};
use crate::{Error, Result};

/// A saved row: resolved column values and generated keys.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRowView {
    name: String,
    dataset: String,
    columns: Vec<(String, Value)>,
}

impl LoadedRowView {
    pub fn new(name: impl Into<String>, columns: Vec<(String, Value)>) -> Self {
        Self {
            name: name.into(),
            dataset: String::new(),
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn get(&self, column: &str) -> Result<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::UnknownColumn {
                dataset: self.dataset.clone(),
                row: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Index<&str> for LoadedRowView {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        match self.get(column) {
            Ok(value) => value,
            Err(err) => panic!("{}", err),
        }
    }
}

/// The loaded rows of one dataset, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataSet {
    name: String,
    rows: Vec<LoadedRowView>,
}

impl LoadedDataSet {
    pub fn new(name: impl Into<String>, rows: Vec<LoadedRowView>) -> Self {
        let name = name.into();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.dataset = name.clone();
                row
            })
            .collect();
        Self { name, rows }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, row: &str) -> Option<&LoadedRowView> {
        self.rows.iter().find(|r| r.name == row)
    }

    pub fn row(&self, row: &str) -> Result<&LoadedRowView> {
        self.get(row).ok_or_else(|| Error::UnknownRow {
            dataset: self.name.clone(),
            row: row.to_string(),
        })
    }

    pub fn rows(&self) -> &[LoadedRowView] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LoadedRowView> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Index<&str> for LoadedDataSet {
    type Output = LoadedRowView;

    fn index(&self, row: &str) -> &LoadedRowView {
        match self.row(row) {
            Ok(view) => view,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<'a> IntoIterator for &'a LoadedDataSet {
    type Item = &'a LoadedRowView;
    type IntoIter = std::slice::Iter<'a, LoadedRowView>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// View a dataset made only of literal columns as if it were loaded.
///
/// A reference column cannot be read before load and fails with
/// [`Error::NotLoaded`].
impl TryFrom<&DataSet> for LoadedDataSet {
    type Error = Error;

    fn try_from(dataset: &DataSet) -> Result<Self> {
        let rows = dataset
            .iter()
            .map(|(name, row)| {
                let columns = row
                    .iter()
                    .map(|(column, value)| match value {
                        ColumnValue::Literal(v) => Ok((column.to_string(), v.clone())),
                        ColumnValue::Ref(_) => Err(Error::NotLoaded {
                            dataset: dataset.name().to_string(),
                            row: name.to_string(),
                            column: column.to_string(),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(LoadedRowView::new(name, columns))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LoadedDataSet::new(dataset.name(), rows))
    }
}

/// Loaded datasets accessed by dataset name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuperSet {
    datasets: Vec<LoadedDataSet>,
}

impl SuperSet {
    /// Datasets in load order; a later dataset with the same name replaces an earlier one
    pub fn new(datasets: impl IntoIterator<Item = LoadedDataSet>) -> Self {
        let mut superset = Self::default();
        for dataset in datasets {
            match superset.datasets.iter_mut().find(|d| d.name == dataset.name) {
                Some(slot) => *slot = dataset,
                None => superset.datasets.push(dataset),
            }
        }
        superset
    }

    pub fn get(&self, name: &str) -> Option<&LoadedDataSet> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn dataset(&self, name: &str) -> Result<&LoadedDataSet> {
        self.get(name).ok_or_else(|| Error::UnknownDataset(name.to_string()))
    }

    /// Dataset names in load order
    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LoadedDataSet> {
        self.datasets.iter()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Flatten into a single row namespace
    pub fn merged(&self, policy: CollisionPolicy) -> Result<MergedSuperSet> {
        MergedSuperSet::new(self.datasets.iter().cloned(), policy)
    }
}

impl Index<&str> for SuperSet {
    type Output = LoadedDataSet;

    fn index(&self, name: &str) -> &LoadedDataSet {
        match self.dataset(name) {
            Ok(dataset) => dataset,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<'a> IntoIterator for &'a SuperSet {
    type Item = &'a LoadedDataSet;
    type IntoIter = std::slice::Iter<'a, LoadedDataSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.iter()
    }
}

/// Rows of several loaded datasets in one namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSuperSet {
    rows: Vec<LoadedRowView>,
    /// row name -> position in `rows`
    index: HashMap<String, usize>,
}

impl MergedSuperSet {
    pub fn new(datasets: impl IntoIterator<Item = LoadedDataSet>, policy: CollisionPolicy) -> Result<Self> {
        let mut merged = Self::default();
        for dataset in datasets {
            for row in dataset.rows {
                merged.insert(row, policy)?;
            }
        }
        Ok(merged)
    }

    fn insert(&mut self, row: LoadedRowView, policy: CollisionPolicy) -> Result<()> {
        let Some(&position) = self.index.get(&row.name) else {
            self.index.insert(row.name.clone(), self.rows.len());
            self.rows.push(row);
            return Ok(());
        };

        let existing = &self.rows[position];
        match policy {
            CollisionPolicy::Reject => Err(Error::RowNameCollision {
                row: row.name.clone(),
                first: existing.dataset.clone(),
                second: row.dataset.clone(),
            }),
            CollisionPolicy::LastWins => {
                warn!(
                    "Row {} of {} replaces the one from {}",
                    row.name, row.dataset, existing.dataset
                );
                self.rows[position] = row;
                Ok(())
            }
        }
    }

    pub fn get(&self, row: &str) -> Option<&LoadedRowView> {
        self.index.get(row).map(|&position| &self.rows[position])
    }

    pub fn row(&self, row: &str) -> Result<&LoadedRowView> {
        self.get(row).ok_or_else(|| Error::UnknownRow {
            dataset: "merged data".to_string(),
            row: row.to_string(),
        })
    }

    /// Rows in load order
    pub fn iter(&self) -> std::slice::Iter<'_, LoadedRowView> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Index<&str> for MergedSuperSet {
    type Output = LoadedRowView;

    fn index(&self, row: &str) -> &LoadedRowView {
        match self.row(row) {
            Ok(view) => view,
            Err(err) => panic!("{}", err),
        }
    }
}

impl<'a> IntoIterator for &'a MergedSuperSet {
    type Item = &'a LoadedRowView;
    type IntoIter = std::slice::Iter<'a, LoadedRowView>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
