//! SQLite backend
//!
//! Rows are inserted into the table named by the dataset's storable. Generated
//! keys come back through `last_insert_rowid`; rows are deleted by primary key.
//! A rowid table with no usable primary key is keyed by its `rowid`.

use std::path::Path;
use std::rc::Rc;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use super::schema::{self, quote_ident, TableInfo};
use crate::dataset::DataSet;
use crate::loadable::{Backend, StorageMedium, StoredRow};
use crate::row::Row;
use crate::value::Value;
use crate::{Error, Result};

const ROWID: &str = "rowid";

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Int(i)),
            ValueRef::Real(f) => Ok(Value::Float(f)),
            ValueRef::Text(t) => Ok(Value::Text(String::from_utf8_lossy(t).into_owned())),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// SQLite-backed storage for fixture rows
pub struct SqliteBackend {
    conn: Option<Rc<Connection>>,
    in_transaction: bool,
}

impl SqliteBackend {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Some(Rc::new(conn)),
            in_transaction: false,
        }
    }

    /// A backend with no connection bound yet
    pub fn unbound() -> Self {
        Self {
            conn: None,
            in_transaction: false,
        }
    }

    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Connection::open(path)?))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    pub fn bind(&mut self, conn: Connection) {
        self.conn = Some(Rc::new(conn));
    }

    pub fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_deref()
            .ok_or_else(|| Error::Uninitialized("SqliteBackend has no connection bound".to_string()))
    }

    /// Run schema or seed SQL
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connection()?.execute_batch(sql)?;
        Ok(())
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self.connection()?.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every row of a table as `(column, value)` pairs, in rowid order
    pub fn select_all(&self, table: &str) -> Result<Vec<Vec<(String, Value)>>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map([], |row| {
                names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Ok((name.clone(), row.get::<_, Value>(i)?)))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Backend for SqliteBackend {
    type Medium = TableMedium;

    fn begin(&mut self, _unloading: bool) -> Result<()> {
        self.connection()?.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn medium(&self, dataset: &DataSet, storable: &str) -> Result<TableMedium> {
        let table = schema::table_info(self.connection()?, storable)?.ok_or_else(|| {
            Error::UnsupportedMedium(format!(
                "{} is stored in {}, which is not a table",
                dataset.name(),
                storable
            ))
        })?;

        let mut primary_key = table.primary_key();
        if primary_key.is_empty() {
            primary_key = dataset.meta().primary_key.clone();
        }
        Ok(TableMedium {
            table,
            primary_key,
            conn: None,
        })
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.connection()?.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.connection()?.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn clear_object(&mut self, storable: &str) -> Result<()> {
        let deleted = self
            .connection()?
            .execute(&format!("DELETE FROM {}", quote_ident(storable)), [])?;
        debug!("Deleted {} rows from {}", deleted, storable);
        Ok(())
    }

    fn dispose(&mut self) -> Result<()> {
        if self.in_transaction {
            self.rollback()?;
        }
        self.conn = None;
        Ok(())
    }
}

/// Inserts into and deletes from one table
pub struct TableMedium {
    table: TableInfo,
    primary_key: Vec<String>,
    conn: Option<Rc<Connection>>,
}

impl TableMedium {
    pub fn table(&self) -> &str {
        &self.table.name
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_deref().ok_or_else(|| {
            Error::Uninitialized(format!("medium for {} was not visited by a loader", self.table.name))
        })
    }
}

impl StorageMedium<SqliteBackend> for TableMedium {
    fn visit_loader(&mut self, loader: &SqliteBackend) -> Result<()> {
        let conn = loader.conn.as_ref().ok_or_else(|| {
            Error::Uninitialized(format!(
                "cannot store into {} without a bound connection",
                self.table.name
            ))
        })?;
        self.conn = Some(Rc::clone(conn));
        Ok(())
    }

    fn save(&mut self, row: &Row, values: &[(String, Value)]) -> Result<StoredRow> {
        let conn = self.conn()?;
        if let Some((column, _)) = values.iter().find(|(c, _)| !self.table.has_column(c)) {
            return Err(Error::Adapter(format!(
                "{}.{}: table {} has no column {}",
                row.dataset(),
                row.name,
                self.table.name,
                column
            )));
        }

        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&self.table.name))
        } else {
            let columns: Vec<String> = values.iter().map(|(c, _)| quote_ident(c)).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&self.table.name),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        conn.execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))?;

        let rowid = conn.last_insert_rowid();
        let generated = self.table.rowid_alias();
        let mut keys = Vec::with_capacity(self.primary_key.len());
        for column in &self.primary_key {
            match values.iter().find(|(c, _)| c == column) {
                Some((_, value)) => keys.push((column.clone(), value.clone())),
                None if generated == Some(column.as_str()) => keys.push((column.clone(), Value::Int(rowid))),
                None if self.table.has_rowid => {
                    debug!("{} has no {} key, keying {} by rowid", self.table.name, column, row.name);
                    keys = vec![(ROWID.to_string(), Value::Int(rowid))];
                    break;
                }
                // WITHOUT ROWID tables have nothing else to delete by
                None => return Ok(StoredRow::new(&self.table.name, Vec::new(), values.to_vec())),
            }
        }
        if keys.is_empty() && self.table.has_rowid {
            keys.push((ROWID.to_string(), Value::Int(rowid)));
        }

        Ok(StoredRow::new(&self.table.name, keys, values.to_vec()))
    }

    fn clear(&mut self, stored: &StoredRow) -> Result<()> {
        if stored.keys.is_empty() {
            return Err(Error::MissingKey(format!("row of {} has no key to delete by", self.table.name)));
        }

        let conditions: Vec<String> = stored
            .keys
            .iter()
            .enumerate()
            .map(|(i, (column, _))| {
                let column = if column == ROWID { ROWID.to_string() } else { quote_ident(column) };
                format!("{} = ?{}", column, i + 1)
            })
            .collect();
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(&self.table.name),
            conditions.join(" AND ")
        );

        let deleted = self
            .conn()?
            .execute(&sql, params_from_iter(stored.keys.iter().map(|(_, v)| v)))?;
        if deleted == 0 {
            let keys: Vec<String> = stored.keys.iter().map(|(c, v)| format!("{}={}", c, v)).collect();
            return Err(Error::AlreadyAbsent(format!("{} [{}]", self.table.name, keys.join(", "))));
        }
        Ok(())
    }
}
