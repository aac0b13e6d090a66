//! Fixtures - per-test load/unload sessions
//!
//! A [`Fixture`] owns a backend, the dataset catalog and the options. Each test
//! asks it for a [`Data`] session, sets it up, runs, and tears it down:
//!
//! ```ignore
//! let mut fixture = Fixture::new(SqliteBackend::open_in_memory()?);
//! fixture.with_data(&[Source::from("OfferData")], |data| {
//!     assert_eq!(data["OfferData"]["free_truck"]["product_id"], Value::Int(1));
//!     Ok(())
//! })?;
//! ```

use std::ops::{Deref, DerefMut};

use tracing::{debug, error, info};

use crate::catalog::{Catalog, Source};
use crate::config::{CollisionPolicy, DataloadConfig, TeardownMode};
use crate::graph::LoadPlan;
use crate::loadable::{Backend, LoadedRow, Loader, LoaderState};
use crate::style::Style;
use crate::superset::{MergedSuperSet, SuperSet};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureOptions {
    pub style: Style,
    pub teardown: TeardownMode,
    pub collisions: CollisionPolicy,
}

impl FixtureOptions {
    pub fn from_config(config: &DataloadConfig) -> Result<Self> {
        Ok(Self {
            style: config.style.to_style()?,
            teardown: config.teardown,
            collisions: config.collisions,
        })
    }
}

pub struct Fixture<B: Backend> {
    backend: B,
    catalog: Catalog,
    options: FixtureOptions,
}

impl<B: Backend> Fixture<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            catalog: Catalog::new(),
            options: FixtureOptions::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_options(mut self, options: FixtureOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn options(&self) -> &FixtureOptions {
        &self.options
    }

    /// A session over `sources`; nothing is loaded until [`Data::setup`]
    pub fn data(&mut self, sources: &[Source]) -> Data<'_, B> {
        let loader = Loader::new(&mut self.backend)
            .with_style(self.options.style.clone())
            .with_teardown(self.options.teardown);
        Data {
            loader,
            catalog: &mut self.catalog,
            sources: sources.to_vec(),
            collisions: self.options.collisions,
            loaded: None,
        }
    }

    /// Load `sources`, run `body` against the loaded data, then unload.
    ///
    /// When `body` fails its error is returned and teardown failures are only
    /// logged. [`Error::Interrupted`] is returned at once, without teardown.
    pub fn with_data<T, F>(&mut self, sources: &[Source], body: F) -> Result<T>
    where
        F: FnOnce(&SuperSet) -> Result<T>,
    {
        let mut data = self.data(sources).guard();
        data.setup()?;

        let outcome = body(data.superset()?);
        match outcome {
            Ok(value) => {
                data.finish()?;
                Ok(value)
            }
            Err(Error::Interrupted) => {
                data.disarm();
                Err(Error::Interrupted)
            }
            Err(err) => {
                if let Err(teardown) = data.finish() {
                    error!("Teardown after a failed run also failed: {}", teardown);
                }
                Err(err)
            }
        }
    }

    /// One load/run/unload cycle per item, produced lazily
    pub fn cases<I, T, F>(&mut self, sources: &[Source], items: I, body: F) -> Cases<'_, B, I::IntoIter, F>
    where
        I: IntoIterator,
        F: FnMut(&SuperSet, I::Item) -> Result<T>,
    {
        Cases {
            fixture: self,
            sources: sources.to_vec(),
            items: items.into_iter(),
            body,
        }
    }

    /// Forget every registered definition and release the backend
    pub fn dispose(&mut self) -> Result<()> {
        self.catalog.clear();
        self.backend.dispose()
    }
}

/// One load/unload session.
pub struct Data<'f, B: Backend> {
    loader: Loader<'f, B>,
    catalog: &'f mut Catalog,
    sources: Vec<Source>,
    collisions: CollisionPolicy,
    loaded: Option<SuperSet>,
}

impl<'f, B: Backend> Data<'f, B> {
    /// Expand the sources, plan the load and run it
    pub fn setup(&mut self) -> Result<&SuperSet> {
        let names = self.catalog.expand(&self.sources)?;
        let plan = LoadPlan::build(self.catalog, &names)?;
        info!("Load order: {}", plan.order().join(", "));
        if plan.shared_reuses > 0 {
            debug!("{} extra uses of shared datasets served by one instance", plan.shared_reuses);
        }

        let views = self.loader.load(&plan)?;
        Ok(self.loaded.insert(SuperSet::new(views)))
    }

    /// Unload everything this session saved
    pub fn teardown(&mut self) -> Result<()> {
        self.loaded = None;
        self.loader.unload()
    }

    /// Delete every row of a storage object before the regular teardown
    pub fn clear_object(&mut self, storable: &str) -> Result<()> {
        self.loader.clear_object(storable)
    }

    pub fn superset(&self) -> Result<&SuperSet> {
        self.loaded.as_ref().ok_or_else(|| {
            Error::InvalidState(format!("data is {}, call setup() first", self.loader.state()))
        })
    }

    /// The loaded rows in one namespace
    pub fn merged(&self) -> Result<MergedSuperSet> {
        self.superset()?.merged(self.collisions)
    }

    pub fn state(&self) -> LoaderState {
        self.loader.state()
    }

    pub fn records(&self) -> &[LoadedRow] {
        self.loader.records()
    }

    pub fn backend(&self) -> &B {
        self.loader.backend()
    }

    /// Tie teardown to the guard's scope
    pub fn guard(self) -> DataGuard<'f, B> {
        DataGuard {
            data: self,
            armed: true,
        }
    }
}

/// Tears its session down when dropped, unwinding included.
pub struct DataGuard<'f, B: Backend> {
    data: Data<'f, B>,
    armed: bool,
}

impl<'f, B: Backend> DataGuard<'f, B> {
    /// Tear down now and report the outcome
    pub fn finish(&mut self) -> Result<()> {
        self.armed = false;
        self.data.teardown()
    }

    /// Leave the data in place when the guard goes away
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<'f, B: Backend> Deref for DataGuard<'f, B> {
    type Target = Data<'f, B>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<'f, B: Backend> DerefMut for DataGuard<'f, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl<'f, B: Backend> Drop for DataGuard<'f, B> {
    fn drop(&mut self) {
        if !self.armed || self.data.records().is_empty() {
            return;
        }
        if let Err(err) = self.data.teardown() {
            error!("Teardown on scope exit failed: {}", err);
        }
    }
}

/// Lazy sequence of load/run/unload cycles, see [`Fixture::cases`]
pub struct Cases<'f, B: Backend, I, F> {
    fixture: &'f mut Fixture<B>,
    sources: Vec<Source>,
    items: I,
    body: F,
}

impl<'f, B, I, F, T> Iterator for Cases<'f, B, I, F>
where
    B: Backend,
    I: Iterator,
    F: FnMut(&SuperSet, I::Item) -> Result<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        let item = self.items.next()?;
        let body = &mut self.body;
        Some(self.fixture.with_data(&self.sources, |data| body(data, item)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Module;
    use crate::dataset::DataSet;
    use crate::row::Row;
    use crate::storage::{MemoryBackend, SqliteBackend};
    use crate::value::{Reference, Value};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn shop() -> Catalog {
        let category = DataSet::data_type("CategoryData")
            .row(Row::new("vehicles").with("name", "vehicles"));
        let product = DataSet::new("ProductData").row(
            Row::new("truck")
                .with("name", "truck")
                .with("category_id", Reference::to_row("CategoryData", "vehicles")),
        );
        Catalog::new().with([category, product]).unwrap()
    }

    fn sqlite() -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .execute_batch(
                "CREATE TABLE category (id INTEGER PRIMARY KEY, name TEXT);
                 CREATE TABLE product (id INTEGER PRIMARY KEY, name TEXT, category_id INTEGER);",
            )
            .unwrap();
        backend
    }

    #[test]
    fn test_with_data_loads_and_unloads() {
        let mut fixture = Fixture::new(sqlite()).with_catalog(shop());
        let id = fixture
            .with_data(&[Source::from("ProductData")], |data| {
                assert_eq!(data["CategoryData"]["vehicles"]["name"], Value::from("vehicles"));
                Ok(data["ProductData"]["truck"]["category_id"].clone())
            })
            .unwrap();

        assert_eq!(id, Value::Int(1));
        assert_eq!(fixture.backend().count_rows("product").unwrap(), 0);
        assert_eq!(fixture.backend().count_rows("category").unwrap(), 0);
    }

    #[test]
    fn test_body_error_wins_over_teardown_error() {
        let backend = sqlite();
        backend
            .execute_batch(
                "CREATE TRIGGER keep_products BEFORE DELETE ON product
                 BEGIN SELECT RAISE(ABORT, 'products are forever'); END;",
            )
            .unwrap();
        let mut fixture = Fixture::new(backend).with_catalog(shop());

        let err = fixture
            .with_data(&[Source::from("ProductData")], |_| -> Result<()> {
                Err(Error::Adapter("assertion failed".into()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Adapter(ref msg) if msg == "assertion failed"));

        // the same teardown failure is reported when it is the only one
        let err = fixture
            .with_data(&[Source::from("CategoryData"), Source::from("ProductData")], |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::Teardown { .. }));
        assert!(err.to_string().contains("products are forever"), "{}", err);
    }

    #[test]
    fn test_teardown_error_surfaces_when_body_succeeds() {
        let mut fixture = Fixture::new(sqlite()).with_catalog(shop());
        let mut data = fixture.data(&[Source::from("ProductData")]);
        data.setup().unwrap();
        data.backend().execute_batch("DROP TABLE product").unwrap();

        let err = data.teardown().unwrap_err();
        match err {
            Error::Teardown { first, others } => {
                assert!(matches!(*first, Error::Storage(_)));
                assert!(others.is_empty());
            }
            other => panic!("expected a teardown error, got {:?}", other),
        }
        assert_eq!(data.backend().count_rows("category").unwrap(), 0);
    }

    #[test]
    fn test_interrupt_skips_teardown() {
        let mut fixture = Fixture::new(MemoryBackend::new()).with_catalog(shop());
        let err = fixture
            .with_data(&[Source::from("ProductData")], |_| -> Result<()> { Err(Error::Interrupted) })
            .unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert_eq!(fixture.backend().count("product"), 1);
    }

    #[test]
    fn test_guard_tears_down_on_panic() {
        let mut fixture = Fixture::new(MemoryBackend::new()).with_catalog(shop());
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut data = fixture.data(&[Source::from("ProductData")]).guard();
            data.setup().unwrap();
            panic!("test body blew up");
        }));
        assert!(outcome.is_err());
        assert_eq!(fixture.backend().count("product"), 0);
        assert_eq!(fixture.backend().count("category"), 0);
    }

    fn load_and_report(fixture: &mut Fixture<MemoryBackend>, keep: bool) -> Result<usize> {
        let mut data = fixture.data(&[Source::from("ProductData")]).guard();
        let loaded = data.setup()?.len();
        if keep {
            data.disarm();
            return Ok(loaded);
        }
        Err(Error::Adapter(format!("cannot print {} datasets", loaded)))
    }

    #[test]
    fn test_guard_tears_down_on_early_return() {
        let mut fixture = Fixture::new(MemoryBackend::new()).with_catalog(shop());
        assert!(matches!(load_and_report(&mut fixture, false), Err(Error::Adapter(_))));
        assert_eq!(fixture.backend().count("product"), 0);

        assert_eq!(load_and_report(&mut fixture, true).unwrap(), 2);
        assert_eq!(fixture.backend().count("product"), 1);
        assert_eq!(fixture.backend().count("category"), 1);
    }

    #[test]
    fn test_cases_run_one_cycle_each() {
        let mut fixture = Fixture::new(MemoryBackend::new()).with_catalog(shop());
        let results: Vec<Result<usize>> = fixture
            .cases(&[Source::from("ProductData")], ["a", "bb", "ccc"], |data, item| {
                assert_eq!(data.len(), 2);
                Ok(item.len())
            })
            .collect();

        let lengths: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(lengths, vec![1, 2, 3]);
        assert_eq!(fixture.backend().count("product"), 0);
    }

    #[test]
    fn test_cases_are_lazy() {
        let mut fixture = Fixture::new(MemoryBackend::new()).with_catalog(shop());
        let mut runs = 0;
        {
            let mut cases = fixture.cases(&[Source::from("CategoryData")], 0..10, |_, _| {
                runs += 1;
                Ok(())
            });
            cases.next().unwrap().unwrap();
        }
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_superset_before_setup() {
        let mut fixture = Fixture::new(MemoryBackend::new()).with_catalog(shop());
        let data = fixture.data(&[Source::from("ProductData")]);
        assert!(matches!(data.superset(), Err(Error::InvalidState(_))));
        assert_eq!(data.state(), LoaderState::New);
    }

    #[test]
    fn test_module_source_and_merged_view() {
        let books = DataSet::from_rows("Books", vec![("lolita", vec![("title", "lolita")])]);
        let movies = DataSet::from_rows("Movies", vec![("peewee", vec![("director", "Tim Burton")])]);
        let module = Module::new("media").dataset(books).dataset(movies);

        let options = FixtureOptions {
            style: Style::Verbatim,
            ..Default::default()
        };
        let mut fixture = Fixture::new(MemoryBackend::new()).with_options(options);
        let mut data = fixture.data(&[Source::from(module)]);
        data.setup().unwrap();

        let merged = data.merged().unwrap();
        assert_eq!(merged["lolita"]["title"], Value::from("lolita"));
        assert_eq!(merged["peewee"]["director"], Value::from("Tim Burton"));
        assert_eq!(data.backend().count("Books"), 1);
        data.teardown().unwrap();
        assert_eq!(data.state(), LoaderState::Unloaded);
    }

    #[test]
    fn test_clear_object_before_teardown() {
        let mut fixture = Fixture::new(sqlite()).with_catalog(shop());
        fixture
            .backend()
            .execute_batch("CREATE TABLE product_keyword (product_id INTEGER, keyword TEXT);")
            .unwrap();

        let mut data = fixture.data(&[Source::from("ProductData")]);
        data.setup().unwrap();
        data.backend()
            .execute_batch("INSERT INTO product_keyword VALUES (1, 'big');")
            .unwrap();
        data.clear_object("product_keyword").unwrap();
        data.teardown().unwrap();
        assert_eq!(fixture.backend().count_rows("product_keyword").unwrap(), 0);
    }

    #[test]
    fn test_unsupported_source() {
        let mut fixture = Fixture::new(MemoryBackend::new()).with_catalog(shop());
        let mut data = fixture.data(&[Source::Other("42".into())]);
        let err = data.setup().unwrap_err();
        assert!(err.to_string().contains("Got: 42"));
    }

    #[test]
    fn test_dispose_clears_catalog() {
        let mut fixture = Fixture::new(sqlite()).with_catalog(shop());
        fixture.dispose().unwrap();
        assert!(fixture.catalog().is_empty());
        assert!(matches!(fixture.backend().count_rows("product"), Err(Error::Uninitialized(_))));
    }
}
