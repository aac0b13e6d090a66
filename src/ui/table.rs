use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::superset::LoadedDataSet;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// Loaded rows of one dataset, one column per distinct column name
pub fn dataset_table(dataset: &LoadedDataSet) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for row in dataset {
        for (name, _) in row.columns() {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(std::iter::once("row").chain(columns.iter().copied()));
    for row in dataset {
        let cells = columns
            .iter()
            .map(|column| row.get(column).map(|v| v.to_string()).unwrap_or_default());
        builder.push_record(std::iter::once(row.name().to_string()).chain(cells));
    }
    builder.build().with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSet;

    #[test]
    fn test_stats_table() {
        let table = stats_table(&[("Datasets", "3"), ("Rows", "7")]);
        assert!(table.contains("Metric"));
        assert!(table.contains("Rows"));
        assert!(stats_table(&[]).is_empty());
    }

    #[test]
    fn test_dataset_table_fills_missing_cells() {
        let ds = DataSet::from_rows(
            "Books",
            vec![
                ("lolita", vec![("title", "lolita")]),
                ("pi", vec![("author", "Yann Martel")]),
            ],
        );
        let table = dataset_table(&LoadedDataSet::try_from(&ds).unwrap());
        assert!(table.contains("title"));
        assert!(table.contains("author"));
        assert!(table.contains("Yann Martel"));
    }
}
