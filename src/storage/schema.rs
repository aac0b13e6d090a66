//! Table introspection

use rusqlite::Connection;

use crate::Result;

/// One column as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    /// 1-based position in the primary key, 0 when not part of it
    pub pk: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// False for `WITHOUT ROWID` tables
    pub has_rowid: bool,
}

impl TableInfo {
    /// Primary key columns in key order
    pub fn primary_key(&self) -> Vec<String> {
        let mut keyed: Vec<&ColumnInfo> = self.columns.iter().filter(|c| c.pk > 0).collect();
        keyed.sort_by_key(|c| c.pk);
        keyed.into_iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// An `INTEGER PRIMARY KEY` column aliases the rowid, so inserts generate it
    pub fn rowid_alias(&self) -> Option<&str> {
        match self.primary_key().as_slice() {
            [only] => self
                .columns
                .iter()
                .find(|c| &c.name == only && c.declared_type.eq_ignore_ascii_case("INTEGER"))
                .map(|c| c.name.as_str()),
            _ => None,
        }
    }
}

/// Read a table's columns; `None` when no such table exists
pub fn table_info(conn: &Connection, table: &str) -> Result<Option<TableInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns: Vec<ColumnInfo> = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                pk: row.get::<_, i64>(5)? as usize,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;

    if columns.is_empty() {
        return Ok(None);
    }
    let has_rowid = conn
        .prepare(&format!("SELECT rowid FROM {} LIMIT 0", quote_ident(table)))
        .is_ok();
    Ok(Some(TableInfo {
        name: table.to_string(),
        columns,
        has_rowid,
    }))
}

/// Quote an identifier for use in SQL text
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_info() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE product (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE product_keyword (keyword_id INTEGER, product_id INTEGER,
                 PRIMARY KEY (product_id, keyword_id));
             CREATE TABLE setting (name TEXT PRIMARY KEY, value TEXT) WITHOUT ROWID;",
        )
        .unwrap();

        let product = table_info(&conn, "product").unwrap().unwrap();
        assert_eq!(product.primary_key(), vec!["id"]);
        assert_eq!(product.rowid_alias(), Some("id"));
        assert!(product.columns[1].not_null);

        let swing = table_info(&conn, "product_keyword").unwrap().unwrap();
        assert_eq!(swing.primary_key(), vec!["product_id", "keyword_id"]);
        assert_eq!(swing.rowid_alias(), None);
        assert!(swing.has_rowid);

        let setting = table_info(&conn, "setting").unwrap().unwrap();
        assert_eq!(setting.primary_key(), vec!["name"]);
        assert!(!setting.has_rowid);

        assert!(table_info(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
