//! # Dataload - typed test datasets for real backing stores
//!
//! Declare datasets of named rows, with columns that may reference rows of
//! other datasets, and load them into a store before a test runs:
//! - Row/dataset model with row inheritance and cross-dataset references
//! - Reference graph that orders a load so referenced rows are saved first
//! - Transactional loader with all-or-nothing rollback and reverse-order teardown
//! - SQLite and in-memory entity backends behind a small storage trait
//! - Loaded data views, namespaced by dataset or merged into one namespace

pub mod value;
pub mod row;
pub mod dataset;
pub mod catalog;
pub mod graph;
pub mod style;
pub mod loadable;
pub mod storage;
pub mod superset;
pub mod fixture;
pub mod config;
pub mod format;
pub mod convert;
pub mod ui;

// Re-exports for convenient access
pub use catalog::{Catalog, Module, Source};
pub use dataset::{DataSet, Meta, MetaConfig};
pub use fixture::{Data, DataGuard, Fixture, FixtureOptions};
pub use graph::{LoadPlan, ReferenceGraph};
pub use loadable::{Backend, Loader, LoaderState, StorageMedium};
pub use row::Row;
pub use storage::{MemoryBackend, SqliteBackend};
pub use style::Style;
pub use superset::{LoadedDataSet, LoadedRowView, MergedSuperSet, SuperSet};
pub use value::{ColumnValue, Reference, Value};

/// Result type alias for Dataload operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Dataload operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    UnsupportedSource(String),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("{dataset} has no row named {row}")]
    UnknownRow { dataset: String, row: String },

    #[error("Reference cycle: {}", .0.join(" -> "))]
    ReferenceCycle(Vec<String>),

    #[error("Dataset {0} is already registered with a different definition")]
    ConflictingDefinition(String),

    #[error("Not initialized: {0}")]
    Uninitialized(String),

    #[error("Unsupported storage medium: {0}")]
    UnsupportedMedium(String),

    #[error("{0} refers to a row with a composite primary key; reference a column instead")]
    CompositeReference(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(
        "{dataset}.{row}.{column} is only available after the DataSet is loaded.  \
         Then, you will need to access it from a loaded data object instead, \
         like: data.{dataset}.{row}.{column}, or the equivalent."
    )]
    NotLoaded {
        dataset: String,
        row: String,
        column: String,
    },

    #[error("{dataset}.{row} has no column {column}")]
    UnknownColumn {
        dataset: String,
        row: String,
        column: String,
    },

    #[error("{dataset}.{row} is referenced before it was saved")]
    UnresolvedReference { dataset: String, row: String },

    #[error("Could not determine the primary key of {0} after saving it")]
    MissingKey(String),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A cleared row was no longer in the store; never fatal during teardown
    #[error("Already absent: {0}")]
    AlreadyAbsent(String),

    #[error("Teardown failed for {} rows; first failure: {first}", .others.len() + 1)]
    Teardown {
        #[source]
        first: Box<Error>,
        others: Vec<Error>,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("Row {row} of {second} collides with the row of the same name in {first}")]
    RowNameCollision {
        row: String,
        first: String,
        second: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Aggregate teardown failures, the first one becoming the source
    pub(crate) fn teardown(failures: Vec<Error>) -> Error {
        let mut failures = failures.into_iter();
        match failures.next() {
            Some(first) => Error::Teardown {
                first: Box::new(first),
                others: failures.collect(),
            },
            None => Error::InvalidState("teardown reported no failures".to_string()),
        }
    }
}
