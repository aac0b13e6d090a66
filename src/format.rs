//! Fixture files - datasets declared in TOML
//!
//! ```toml
//! [[datasets]]
//! name = "CategoryData"
//! meta = { storable = "categories", shared = true }
//! [datasets.rows.vehicles]
//! name = "cars"
//!
//! [[datasets]]
//! name = "ProductData"
//! [datasets.rows.truck]
//! name = "truck"
//! category_id = { ref = "CategoryData.vehicles.id" }
//! [datasets.rows.spaceship]
//! _extends = "truck"
//! name = "spaceship"
//! ```
//!
//! Rows keep file order. `_extends` names an earlier row of the same dataset
//! whose columns the row starts from.

use std::path::Path;

use serde::Deserialize;

use crate::catalog::Catalog;
use crate::dataset::{DataSet, MetaConfig};
use crate::row::Row;
use crate::value::{ColumnValue, Reference, Value};
use crate::{Error, Result};

const EXTENDS: &str = "_extends";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    #[serde(default)]
    datasets: Vec<DataSetEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DataSetEntry {
    name: String,
    #[serde(default)]
    meta: MetaConfig,
    #[serde(default)]
    rows: toml::Table,
}

/// Parse fixture file contents into a catalog
pub fn parse_catalog(text: &str) -> Result<Catalog> {
    let file: FixtureFile = toml::from_str(text).map_err(|e| Error::Parse(e.to_string()))?;

    let mut catalog = Catalog::new();
    for entry in file.datasets {
        catalog.register(build_dataset(entry)?)?;
    }
    Ok(catalog)
}

/// Read and parse a fixture file
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let text = std::fs::read_to_string(path)?;
    parse_catalog(&text)
}

fn build_dataset(entry: DataSetEntry) -> Result<DataSet> {
    let mut dataset = DataSet::new(&entry.name).with_meta(entry.meta);

    for (row_name, columns) in entry.rows {
        let toml::Value::Table(columns) = columns else {
            return Err(Error::Parse(format!(
                "{}.{} must be a table of columns",
                entry.name, row_name
            )));
        };

        let mut row = match columns.get(EXTENDS) {
            Some(toml::Value::String(parent)) => Row::inheriting(&row_name, dataset.row_named(parent)?),
            Some(other) => {
                return Err(Error::Parse(format!(
                    "{}.{}: {} must name a row, got {}",
                    entry.name,
                    row_name,
                    EXTENDS,
                    other.type_str()
                )));
            }
            None => Row::new(&row_name),
        };

        for (column, value) in columns {
            if column == EXTENDS {
                continue;
            }
            let value = column_value(&value)
                .map_err(|e| Error::Parse(format!("{}.{}.{}: {}", entry.name, row_name, column, e)))?;
            row.set(column, value);
        }
        dataset.push_row(row);
    }
    Ok(dataset)
}

fn column_value(value: &toml::Value) -> std::result::Result<ColumnValue, String> {
    Ok(match value {
        toml::Value::String(s) => Value::Text(s.clone()).into(),
        toml::Value::Integer(i) => Value::Int(*i).into(),
        toml::Value::Float(f) => Value::Float(*f).into(),
        toml::Value::Boolean(b) => Value::Bool(*b).into(),
        toml::Value::Datetime(dt) => Value::Text(dt.to_string()).into(),
        toml::Value::Table(table) => match (table.len(), table.get("ref")) {
            (1, Some(toml::Value::String(target))) => {
                Reference::parse(target).map_err(|e| e.to_string())?.into()
            }
            _ => return Err("inline tables must be of the form { ref = \"Dataset.row[.column]\" }".into()),
        },
        toml::Value::Array(_) => return Err("arrays are not column values".into()),
    })
}
