//! JSON export of datasets and loaded data

use serde_json::{json, Map};

use crate::dataset::DataSet;
use crate::row::Row;
use crate::superset::{LoadedDataSet, SuperSet};
use crate::value::{ColumnValue, Value};

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Text(s) => json!(s),
    }
}

fn column_to_json(value: &ColumnValue) -> serde_json::Value {
    match value {
        ColumnValue::Literal(v) => value_to_json(v),
        ColumnValue::Ref(r) => json!({ "ref": r.to_string() }),
    }
}

/// One row template as a JSON object, columns in declaration order
pub fn row_to_object(row: &Row) -> serde_json::Value {
    let object: Map<String, serde_json::Value> = row
        .iter()
        .map(|(column, value)| (column.to_string(), column_to_json(value)))
        .collect();
    serde_json::Value::Object(object)
}

/// A dataset as a list of row objects, suitable for serializing to JSON.
///
/// Reference columns are rendered as `{"ref": "Dataset.row.column"}`.
pub fn dataset_to_objects(dataset: &DataSet) -> Vec<serde_json::Value> {
    dataset.rows().iter().map(row_to_object).collect()
}

/// A loaded dataset as `{row: {column: value}}`
pub fn loaded_to_json(dataset: &LoadedDataSet) -> serde_json::Value {
    let rows: Map<String, serde_json::Value> = dataset
        .iter()
        .map(|row| {
            let columns: Map<String, serde_json::Value> = row
                .columns()
                .map(|(column, value)| (column.to_string(), value_to_json(value)))
                .collect();
            (row.name().to_string(), serde_json::Value::Object(columns))
        })
        .collect();
    serde_json::Value::Object(rows)
}

/// Loaded data as `{dataset: {row: {column: value}}}`
pub fn superset_to_json(superset: &SuperSet) -> serde_json::Value {
    let datasets: Map<String, serde_json::Value> = superset
        .iter()
        .map(|dataset| (dataset.name().to_string(), loaded_to_json(dataset)))
        .collect();
    serde_json::Value::Object(datasets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Reference;

    #[test]
    fn test_dataset_to_objects() {
        let artists = DataSet::from_rows(
            "ArtistData",
            vec![
                ("joan_jett", vec![("name", "Joan Jett and the Black Hearts")]),
                ("ramones", vec![("name", "The Ramones")]),
            ],
        );
        assert_eq!(
            dataset_to_objects(&artists),
            vec![
                json!({"name": "Joan Jett and the Black Hearts"}),
                json!({"name": "The Ramones"}),
            ]
        );
    }

    #[test]
    fn test_references_are_tagged() {
        let albums = DataSet::new("AlbumData").row(
            Row::new("rocket_to_russia")
                .with("title", "Rocket to Russia")
                .with("year", 1977)
                .with("artist_id", Reference::new("ArtistData", "ramones", "id")),
        );
        let objects = dataset_to_objects(&albums);
        assert_eq!(
            objects[0],
            json!({"title": "Rocket to Russia", "year": 1977, "artist_id": {"ref": "ArtistData.ramones.id"}})
        );
        let text = serde_json::to_string(&objects[0]).unwrap();
        assert!(text.starts_with("{\"title\""));
    }

    #[test]
    fn test_superset_to_json() {
        let books = DataSet::from_rows("Books", vec![("lolita", vec![("title", "lolita")])]);
        let superset = SuperSet::new([LoadedDataSet::try_from(&books).unwrap()]);
        assert_eq!(
            superset_to_json(&superset),
            json!({"Books": {"lolita": {"title": "lolita"}}})
        );
    }
}
