//! Loadable storage - the seam between the engine and a backing store
//!
//! A [`Backend`] owns the transactional resource (a connection, a session)
//! and negotiates one [`StorageMedium`] per dataset. A medium knows how to
//! persist one row and delete it again; it pulls whatever context it needs
//! from the backend in [`StorageMedium::visit_loader`].
//!
//! The [`Loader`] drives both through a load/unload cycle.

pub mod loader;

use crate::dataset::DataSet;
use crate::row::Row;
use crate::value::Value;
use crate::Result;

pub use loader::Loader;

/// A row as persisted by a storage medium.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Storage object the row lives in
    pub storable: String,
    /// Primary key columns and their values, generated ones included
    pub keys: Vec<(String, Value)>,
    /// Every column value known after the save
    pub values: Vec<(String, Value)>,
}

impl StoredRow {
    pub fn new(storable: impl Into<String>, keys: Vec<(String, Value)>, values: Vec<(String, Value)>) -> Self {
        Self {
            storable: storable.into(),
            keys,
            values,
        }
    }

    /// Value of a column, looking at keys first
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.keys
            .iter()
            .chain(self.values.iter())
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// The primary key value when the key is a single column
    pub fn primary_key(&self) -> Option<&Value> {
        match self.keys.as_slice() {
            [(_, value)] => Some(value),
            _ => None,
        }
    }

    /// Keys followed by the remaining values, without duplicates
    pub fn columns(&self) -> Vec<(String, Value)> {
        let mut columns = self.keys.clone();
        for (name, value) in &self.values {
            if !columns.iter().any(|(n, _)| n == name) {
                columns.push((name.clone(), value.clone()));
            }
        }
        columns
    }
}

/// One successfully saved row, kept for teardown.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRow {
    pub dataset: String,
    pub row: String,
    pub stored: StoredRow,
}

/// Lifecycle of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    New,
    Loading,
    Loaded,
    Unloading,
    Unloaded,
    Failed,
}

impl LoaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderState::New => "new",
            LoaderState::Loading => "loading",
            LoaderState::Loaded => "loaded",
            LoaderState::Unloading => "unloading",
            LoaderState::Unloaded => "unloaded",
            LoaderState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LoaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persists and deletes rows of one storage object.
pub trait StorageMedium<B: ?Sized> {
    /// Pull connection/session context from the backend before use
    fn visit_loader(&mut self, loader: &B) -> Result<()>;

    /// Persist one row given its resolved column values
    fn save(&mut self, row: &Row, values: &[(String, Value)]) -> Result<StoredRow>;

    /// Delete a previously saved row.
    ///
    /// A row that is already gone must be reported as
    /// [`Error::AlreadyAbsent`](crate::Error::AlreadyAbsent).
    fn clear(&mut self, stored: &StoredRow) -> Result<()>;
}

/// A backing store the loader can run transactions against.
pub trait Backend {
    type Medium: StorageMedium<Self>;

    /// Acquire the transactional resource; `unloading` is set for teardown
    fn begin(&mut self, unloading: bool) -> Result<()>;

    /// Pick the medium that stores `dataset` into `storable`
    fn medium(&self, dataset: &DataSet, storable: &str) -> Result<Self::Medium>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Delete every row of a storage object, e.g. a many-to-many swing table
    fn clear_object(&mut self, storable: &str) -> Result<()>;

    /// Whether `rollback` discards rows saved since `begin`.
    ///
    /// When it does not, the loader deletes those rows itself.
    fn is_transactional(&self) -> bool {
        true
    }

    /// Release connections and sessions
    fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}
