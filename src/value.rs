//! Column values - literals and cross-row references
//!
//! A column holds either a literal [`Value`] or a [`Reference`] to a column of
//! another row. References stay unresolved until the target row has been saved
//! and the storage medium has reported its keys.
//!
//! Reference format: `<dataset>.<row>[.<column>]`
//!
//! Examples:
//! - `CategoryData.vehicles.id`
//! - `CategoryData.vehicles` (whole row, resolves to its primary key)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A literal column value as handed to a storage medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Placeholder for a column of another row, resolved only after that row is saved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Name of the dataset owning the target row
    pub dataset: String,
    /// Name of the target row within its dataset
    pub row: String,
    /// Target column; `None` means the row's primary key
    pub column: Option<String>,
}

impl Reference {
    /// Reference a single column of a row
    pub fn new(dataset: impl Into<String>, row: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            row: row.into(),
            column: Some(column.into()),
        }
    }

    /// Reference a whole row (its primary key once saved)
    pub fn to_row(dataset: impl Into<String>, row: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            row: row.into(),
            column: None,
        }
    }

    /// Parse `dataset.row` or `dataset.row.column`
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let dataset = parts.next().filter(|p| !p.is_empty());
        let row = parts.next().filter(|p| !p.is_empty());
        let column = parts.next();

        if parts.next().is_some() {
            return Err(Error::Parse(format!("reference has too many segments: {}", s)));
        }

        match (dataset, row, column) {
            (Some(dataset), Some(row), None) => Ok(Self::to_row(dataset, row)),
            (Some(dataset), Some(row), Some(column)) if !column.is_empty() => {
                Ok(Self::new(dataset, row, column))
            }
            _ => Err(Error::Parse(format!(
                "reference must look like Dataset.row or Dataset.row.column: {}",
                s
            ))),
        }
    }

    /// `true` when this reference targets the row's primary key
    pub fn is_whole_row(&self) -> bool {
        self.column.is_none()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{}.{}.{}", self.dataset, self.row, column),
            None => write!(f, "{}.{}", self.dataset, self.row),
        }
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The declared value of a column: a literal, or a pending reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Literal(Value),
    Ref(Reference),
}

impl ColumnValue {
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ColumnValue::Literal(v) => Some(v),
            ColumnValue::Ref(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            ColumnValue::Ref(r) => Some(r),
            ColumnValue::Literal(_) => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ColumnValue::Ref(_))
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Literal(v) => write!(f, "{}", v),
            ColumnValue::Ref(r) => write!(f, "<ref {}>", r),
        }
    }
}

impl From<Reference> for ColumnValue {
    fn from(r: Reference) -> Self {
        ColumnValue::Ref(r)
    }
}

impl From<Value> for ColumnValue {
    fn from(v: Value) -> Self {
        ColumnValue::Literal(v)
    }
}

macro_rules! literal_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ColumnValue {
                fn from(v: $t) -> Self {
                    ColumnValue::Literal(Value::from(v))
                }
            }
        )*
    };
}

literal_from!(&str, String, i64, i32, f64, bool);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_parse() {
        let r = Reference::parse("CategoryData.vehicles.id").unwrap();
        assert_eq!(r.dataset, "CategoryData");
        assert_eq!(r.row, "vehicles");
        assert_eq!(r.column.as_deref(), Some("id"));
        assert_eq!(r.to_string(), "CategoryData.vehicles.id");

        let whole = Reference::parse("CategoryData.vehicles").unwrap();
        assert!(whole.is_whole_row());
    }

    #[test]
    fn test_invalid_reference() {
        assert!(Reference::parse("CategoryData").is_err());
        assert!(Reference::parse("CategoryData..id").is_err());
        assert!(Reference::parse("a.b.c.d").is_err());
        assert!(Reference::parse("a.b.").is_err());
    }

    #[test]
    fn test_value_from_json() {
        let v: Value = serde_json::from_str("42").unwrap();
        assert_eq!(v, Value::Int(42));
        let v: Value = serde_json::from_str("\"cars\"").unwrap();
        assert_eq!(v, Value::Text("cars".into()));
        let v: Value = serde_json::from_str("null").unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn test_column_value_conversions() {
        assert_eq!(ColumnValue::from("x"), ColumnValue::Literal(Value::Text("x".into())));
        let r = Reference::new("A", "a", "id");
        assert!(ColumnValue::from(r).is_reference());
    }
}
