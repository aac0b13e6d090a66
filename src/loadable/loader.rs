//! Load/unload engine
//!
//! Saves every row of a [`LoadPlan`] through the backend's storage media as one
//! transaction, records what was saved, and clears it again in reverse order.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use super::{Backend, LoadedRow, LoaderState, StorageMedium, StoredRow};
use crate::config::TeardownMode;
use crate::dataset::DataSet;
use crate::graph::LoadPlan;
use crate::row::Row;
use crate::style::Style;
use crate::superset::{LoadedDataSet, LoadedRowView};
use crate::value::{ColumnValue, Reference, Value};
use crate::{Error, Result};

/// Drives a backend through one load/unload cycle.
pub struct Loader<'b, B: Backend> {
    backend: &'b mut B,
    style: Style,
    teardown: TeardownMode,
    state: LoaderState,
    /// Saved rows, in save order
    loaded: Vec<LoadedRow>,
    /// `(dataset, row)` -> position in `loaded`
    index: HashMap<(String, String), usize>,
    /// Negotiated media by dataset name
    mediums: HashMap<String, B::Medium>,
}

impl<'b, B: Backend> Loader<'b, B> {
    pub fn new(backend: &'b mut B) -> Self {
        Self {
            backend,
            style: Style::default(),
            teardown: TeardownMode::default(),
            state: LoaderState::New,
            loaded: Vec::new(),
            index: HashMap::new(),
            mediums: HashMap::new(),
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_teardown(mut self, teardown: TeardownMode) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Rows saved so far, in save order
    pub fn records(&self) -> &[LoadedRow] {
        &self.loaded
    }

    pub fn backend(&self) -> &B {
        self.backend
    }

    /// Save every row of `plan`, in plan order, as one transaction.
    ///
    /// On the first failure everything saved by this call is rolled back and
    /// the failure is returned as is; commit is not attempted.
    pub fn load(&mut self, plan: &LoadPlan) -> Result<Vec<LoadedDataSet>> {
        match self.state {
            LoaderState::New | LoaderState::Unloaded => {}
            state => {
                return Err(Error::InvalidState(format!(
                    "cannot load while the loader is {}",
                    state
                )));
            }
        }

        info!("Loading {} datasets ({} rows)", plan.len(), plan.row_count());
        self.state = LoaderState::Loading;

        match self.save_all(plan) {
            Ok(views) => {
                self.state = LoaderState::Loaded;
                info!("Loaded {} rows", self.loaded.len());
                Ok(views)
            }
            Err(err) => {
                warn!("Load failed, rolling back {} saved rows: {}", self.loaded.len(), err);
                self.abort();
                self.state = LoaderState::Failed;
                Err(err)
            }
        }
    }

    fn save_all(&mut self, plan: &LoadPlan) -> Result<Vec<LoadedDataSet>> {
        self.backend.begin(false)?;

        let mut views = Vec::with_capacity(plan.len());
        for dataset in &plan.datasets {
            let storable = self.style.storable_for(dataset.name(), dataset.meta());
            let mut medium = self.backend.medium(dataset, &storable)?;
            medium.visit_loader(&*self.backend)?;

            let saved = self.save_dataset(dataset, &mut medium);
            self.mediums.insert(dataset.name().to_string(), medium);
            views.push(saved?);
        }

        self.backend.commit()?;
        Ok(views)
    }

    fn save_dataset(&mut self, dataset: &DataSet, medium: &mut B::Medium) -> Result<LoadedDataSet> {
        let mut rows = Vec::with_capacity(dataset.len());
        for row in dataset {
            let values = self.resolve(row)?;
            let stored = medium.save(row, &values)?;
            debug!("Saved {}.{} into {}", dataset.name(), row.name, stored.storable);

            let columns = merge_columns(values, &stored);
            let has_keys = !stored.keys.is_empty();
            self.record(dataset.name(), &row.name, stored);
            if !has_keys {
                return Err(Error::MissingKey(format!("{}.{}", dataset.name(), row.name)));
            }
            rows.push(LoadedRowView::new(&row.name, columns));
        }
        Ok(LoadedDataSet::new(dataset.name(), rows))
    }

    fn record(&mut self, dataset: &str, row: &str, stored: StoredRow) {
        self.index
            .insert((dataset.to_string(), row.to_string()), self.loaded.len());
        self.loaded.push(LoadedRow {
            dataset: dataset.to_string(),
            row: row.to_string(),
            stored,
        });
    }

    /// Column values of `row` with every reference replaced by the saved value
    fn resolve(&self, row: &Row) -> Result<Vec<(String, Value)>> {
        row.iter()
            .map(|(column, value)| {
                let value = match value {
                    ColumnValue::Literal(v) => v.clone(),
                    ColumnValue::Ref(r) => self.resolve_reference(r)?,
                };
                Ok((column.to_string(), value))
            })
            .collect()
    }

    fn resolve_reference(&self, reference: &Reference) -> Result<Value> {
        let position = self
            .index
            .get(&(reference.dataset.clone(), reference.row.clone()))
            .ok_or_else(|| Error::UnresolvedReference {
                dataset: reference.dataset.clone(),
                row: reference.row.clone(),
            })?;
        let stored = &self.loaded[*position].stored;

        match &reference.column {
            None => stored
                .primary_key()
                .cloned()
                .ok_or_else(|| Error::CompositeReference(reference.to_string())),
            Some(column) => stored.get(column).cloned().ok_or_else(|| Error::UnknownColumn {
                dataset: reference.dataset.clone(),
                row: reference.row.clone(),
                column: column.clone(),
            }),
        }
    }

    /// Discard everything saved by a failed load
    fn abort(&mut self) {
        if !self.backend.is_transactional() {
            for record in self.loaded.iter().rev() {
                let Some(medium) = self.mediums.get_mut(&record.dataset) else {
                    continue;
                };
                if let Err(err) = medium.clear(&record.stored) {
                    warn!("Could not discard {}.{}: {}", record.dataset, record.row, err);
                }
            }
        }
        if let Err(err) = self.backend.rollback() {
            error!("Rollback failed: {}", err);
        }
        self.forget();
    }

    fn forget(&mut self) {
        self.loaded.clear();
        self.index.clear();
        self.mediums.clear();
    }

    /// Clear every saved row in reverse save order.
    ///
    /// Every row is attempted. A row that is already gone is skipped with a
    /// warning; any other failure is collected and, in report mode, returned
    /// as one [`Error::Teardown`] once all rows have been attempted.
    pub fn unload(&mut self) -> Result<()> {
        if self.loaded.is_empty() {
            if self.state != LoaderState::Loading {
                self.state = LoaderState::Unloaded;
            }
            return Ok(());
        }

        info!("Unloading {} rows", self.loaded.len());
        self.state = LoaderState::Unloading;
        if let Err(err) = self.backend.begin(true) {
            self.state = LoaderState::Failed;
            return Err(err);
        }

        let mut failures = Vec::new();
        for medium in self.mediums.values_mut() {
            if let Err(err) = medium.visit_loader(&*self.backend) {
                failures.push(err);
            }
        }

        for record in self.loaded.iter().rev() {
            let Some(medium) = self.mediums.get_mut(&record.dataset) else {
                failures.push(Error::UnsupportedMedium(format!(
                    "no storage medium for {}",
                    record.dataset
                )));
                continue;
            };
            match medium.clear(&record.stored) {
                Ok(()) => debug!("Cleared {}.{}", record.dataset, record.row),
                Err(Error::AlreadyAbsent(what)) => {
                    warn!("{}.{} was already gone: {}", record.dataset, record.row, what)
                }
                Err(err) => {
                    error!("Could not clear {}.{}: {}", record.dataset, record.row, err);
                    failures.push(err);
                }
            }
        }

        if let Err(err) = self.backend.commit() {
            error!("Teardown commit failed: {}", err);
            failures.push(err);
        }
        self.forget();

        if failures.is_empty() {
            self.state = LoaderState::Unloaded;
            return Ok(());
        }
        match self.teardown {
            TeardownMode::Report => {
                self.state = LoaderState::Failed;
                Err(Error::teardown(failures))
            }
            TeardownMode::Ignore => {
                warn!("Ignoring {} teardown failures", failures.len());
                self.state = LoaderState::Unloaded;
                Ok(())
            }
        }
    }

    /// Delete every row of a storage object not owned by any dataset,
    /// such as a many-to-many swing table
    pub fn clear_object(&mut self, storable: &str) -> Result<()> {
        self.backend.begin(true)?;
        match self.backend.clear_object(storable) {
            Ok(()) => {
                debug!("Cleared storage object {}", storable);
                self.backend.commit()
            }
            Err(err) => {
                if let Err(rollback) = self.backend.rollback() {
                    error!("Rollback failed: {}", rollback);
                }
                Err(err)
            }
        }
    }
}

/// Declared values followed by whatever the medium reported, store values winning
fn merge_columns(mut values: Vec<(String, Value)>, stored: &StoredRow) -> Vec<(String, Value)> {
    for (name, value) in stored.columns() {
        match values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => values.push((name, value)),
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Script {
        events: Vec<String>,
        saves: usize,
        fail_save_at: Option<usize>,
        unkeyed_at: Option<usize>,
        fail_clear: Vec<i64>,
        absent: Vec<i64>,
        next_id: i64,
    }

    #[derive(Default)]
    struct ScriptedBackend {
        script: Rc<RefCell<Script>>,
        transactional: bool,
    }

    struct ScriptedMedium {
        storable: String,
        script: Rc<RefCell<Script>>,
    }

    impl StorageMedium<ScriptedBackend> for ScriptedMedium {
        fn visit_loader(&mut self, _loader: &ScriptedBackend) -> Result<()> {
            Ok(())
        }

        fn save(&mut self, row: &Row, values: &[(String, Value)]) -> Result<StoredRow> {
            let mut script = self.script.borrow_mut();
            script.saves += 1;
            if script.fail_save_at == Some(script.saves) {
                return Err(Error::Adapter(format!("cannot save {}", row.name)));
            }
            script.next_id += 1;
            let id = script.next_id;
            script.events.push(format!("save {}#{}", self.storable, id));
            let keys = if script.unkeyed_at == Some(script.saves) {
                Vec::new()
            } else {
                vec![("id".into(), Value::Int(id))]
            };
            Ok(StoredRow::new(&self.storable, keys, values.to_vec()))
        }

        fn clear(&mut self, stored: &StoredRow) -> Result<()> {
            let mut script = self.script.borrow_mut();
            let id = stored.primary_key().and_then(Value::as_int).unwrap_or_default();
            script.events.push(format!("clear {}#{}", self.storable, id));
            if script.absent.contains(&id) {
                return Err(Error::AlreadyAbsent(format!("{}#{}", self.storable, id)));
            }
            if script.fail_clear.contains(&id) {
                return Err(Error::Adapter(format!("locked {}#{}", self.storable, id)));
            }
            Ok(())
        }
    }

    impl Backend for ScriptedBackend {
        type Medium = ScriptedMedium;

        fn begin(&mut self, unloading: bool) -> Result<()> {
            let event = if unloading { "begin unload" } else { "begin" };
            self.script.borrow_mut().events.push(event.into());
            Ok(())
        }

        fn medium(&self, _dataset: &DataSet, storable: &str) -> Result<ScriptedMedium> {
            Ok(ScriptedMedium {
                storable: storable.to_string(),
                script: Rc::clone(&self.script),
            })
        }

        fn commit(&mut self) -> Result<()> {
            self.script.borrow_mut().events.push("commit".into());
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.script.borrow_mut().events.push("rollback".into());
            Ok(())
        }

        fn clear_object(&mut self, storable: &str) -> Result<()> {
            self.script.borrow_mut().events.push(format!("clear_object {}", storable));
            Ok(())
        }

        fn is_transactional(&self) -> bool {
            self.transactional
        }
    }

    fn shop() -> Catalog {
        let category = DataSet::data_type("CategoryData")
            .row(Row::new("vehicles").with("name", "vehicles"))
            .row(Row::new("free_stuff").with("name", "free_stuff"));
        let product = DataSet::new("ProductData")
            .row(Row::new("truck").with("name", "truck").with("category_id", Reference::new("CategoryData", "vehicles", "id")));
        let offer = DataSet::new("OfferData").row(
            Row::new("free_truck")
                .with("product_id", Reference::to_row("ProductData", "truck"))
                .with("category_id", Reference::new("CategoryData", "free_stuff", "id")),
        );
        Catalog::new().with([category, product, offer]).unwrap()
    }

    fn plan(catalog: &Catalog, names: &[&str]) -> LoadPlan {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        LoadPlan::build(catalog, &names).unwrap()
    }

    fn events(backend: &ScriptedBackend) -> Vec<String> {
        backend.script.borrow().events.clone()
    }

    #[test]
    fn test_load_resolves_references() {
        let catalog = shop();
        let mut backend = ScriptedBackend {
            transactional: true,
            ..Default::default()
        };
        let mut loader = Loader::new(&mut backend);

        let views = loader.load(&plan(&catalog, &["OfferData"])).unwrap();
        assert_eq!(loader.state(), LoaderState::Loaded);
        assert_eq!(loader.records().len(), 4);

        let offer = &views[2];
        assert_eq!(offer.name(), "OfferData");
        let free_truck = offer.row("free_truck").unwrap();
        assert_eq!(free_truck.get("product_id").unwrap(), &Value::Int(3));
        assert_eq!(free_truck.get("category_id").unwrap(), &Value::Int(2));
        assert_eq!(free_truck.get("id").unwrap(), &Value::Int(4));
    }

    #[test]
    fn test_shared_type_is_saved_once() {
        let catalog = shop();
        let mut backend = ScriptedBackend::default();
        let mut loader = Loader::new(&mut backend);
        loader.load(&plan(&catalog, &["ProductData", "OfferData"])).unwrap();

        let category_saves = loader
            .records()
            .iter()
            .filter(|r| r.dataset == "CategoryData")
            .count();
        assert_eq!(category_saves, 2);
        drop(loader);

        let saves: Vec<String> = events(&backend)
            .into_iter()
            .filter(|e| e.starts_with("save category"))
            .collect();
        assert_eq!(saves, vec!["save category#1", "save category#2"]);
    }

    #[test]
    fn test_failed_save_rolls_back_and_keeps_error() {
        let catalog = shop();
        let mut backend = ScriptedBackend::default();
        backend.script.borrow_mut().fail_save_at = Some(3);
        let mut loader = Loader::new(&mut backend);

        let err = loader.load(&plan(&catalog, &["OfferData"])).unwrap_err();
        assert!(matches!(&err, Error::Adapter(msg) if msg == "cannot save truck"));
        assert_eq!(loader.state(), LoaderState::Failed);
        assert!(loader.records().is_empty());
        drop(loader);

        let log = events(&backend);
        assert_eq!(log.last().map(String::as_str), Some("rollback"));
        assert!(!log.contains(&"commit".to_string()));
    }

    #[test]
    fn test_row_saved_without_key_fails_the_load() {
        let catalog = shop();
        let mut backend = ScriptedBackend {
            transactional: true,
            ..Default::default()
        };
        backend.script.borrow_mut().unkeyed_at = Some(3);
        let mut loader = Loader::new(&mut backend);

        let err = loader.load(&plan(&catalog, &["ProductData"])).unwrap_err();
        assert!(matches!(&err, Error::MissingKey(what) if what == "ProductData.truck"));
        assert!(loader.records().is_empty());
        drop(loader);

        assert_eq!(
            events(&backend),
            vec!["begin", "save category#1", "save category#2", "save product#3", "rollback"]
        );
    }

    #[test]
    fn test_non_transactional_rollback_clears_saved_rows() {
        let catalog = shop();
        let mut backend = ScriptedBackend::default();
        backend.transactional = false;
        backend.script.borrow_mut().fail_save_at = Some(3);
        let mut loader = Loader::new(&mut backend);
        loader.load(&plan(&catalog, &["OfferData"])).unwrap_err();
        drop(loader);

        assert_eq!(
            events(&backend),
            vec![
                "begin",
                "save category#1",
                "save category#2",
                "clear category#2",
                "clear category#1",
                "rollback",
            ]
        );
    }

    #[test]
    fn test_unload_in_reverse_attempting_every_row() {
        let catalog = shop();
        let mut backend = ScriptedBackend::default();
        {
            let mut script = backend.script.borrow_mut();
            script.fail_clear = vec![3, 1];
            script.absent = vec![2];
        }
        let mut loader = Loader::new(&mut backend);
        loader.load(&plan(&catalog, &["OfferData"])).unwrap();

        let err = loader.unload().unwrap_err();
        match &err {
            Error::Teardown { first, others } => {
                assert!(matches!(first.as_ref(), Error::Adapter(msg) if msg == "locked product#3"));
                assert_eq!(others.len(), 1);
            }
            other => panic!("expected a teardown error, got {:?}", other),
        }
        assert_eq!(loader.state(), LoaderState::Failed);
        assert!(loader.records().is_empty());
        drop(loader);

        let clears: Vec<String> = events(&backend)
            .into_iter()
            .skip_while(|e| e != "begin unload")
            .collect();
        assert_eq!(
            clears,
            vec![
                "begin unload",
                "clear offer#4",
                "clear product#3",
                "clear category#2",
                "clear category#1",
                "commit",
            ]
        );
    }

    #[test]
    fn test_already_absent_is_not_a_failure() {
        let catalog = shop();
        let mut backend = ScriptedBackend::default();
        backend.script.borrow_mut().absent = vec![1, 2];
        let mut loader = Loader::new(&mut backend);
        loader.load(&plan(&catalog, &["CategoryData"])).unwrap();
        loader.unload().unwrap();
        assert_eq!(loader.state(), LoaderState::Unloaded);
    }

    #[test]
    fn test_ignore_mode_swallows_failures() {
        let catalog = shop();
        let mut backend = ScriptedBackend::default();
        backend.script.borrow_mut().fail_clear = vec![1];
        let mut loader = Loader::new(&mut backend).with_teardown(TeardownMode::Ignore);
        loader.load(&plan(&catalog, &["CategoryData"])).unwrap();
        loader.unload().unwrap();
        assert_eq!(loader.state(), LoaderState::Unloaded);
    }

    #[test]
    fn test_load_twice_is_rejected() {
        let catalog = shop();
        let mut backend = ScriptedBackend::default();
        let mut loader = Loader::new(&mut backend);
        let p = plan(&catalog, &["CategoryData"]);
        loader.load(&p).unwrap();
        assert!(matches!(loader.load(&p), Err(Error::InvalidState(_))));

        loader.unload().unwrap();
        loader.load(&p).unwrap();
    }

    #[test]
    fn test_clear_object() {
        let mut backend = ScriptedBackend::default();
        Loader::new(&mut backend).clear_object("product_keyword").unwrap();
        assert_eq!(events(&backend), vec!["begin unload", "clear_object product_keyword", "commit"]);
    }

    #[test]
    fn test_unload_without_load_is_noop() {
        let mut backend = ScriptedBackend::default();
        let mut loader = Loader::new(&mut backend);
        loader.unload().unwrap();
        assert_eq!(loader.state(), LoaderState::Unloaded);
        drop(loader);
        assert!(events(&backend).is_empty());
    }
}
