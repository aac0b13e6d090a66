//! In-memory entity store
//!
//! A schemaless backend: entities are grouped by kind and keyed by an `id`
//! that is assigned on save unless the row provides one. Transactions are
//! snapshots of the whole store.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::dataset::DataSet;
use crate::loadable::{Backend, StorageMedium, StoredRow};
use crate::row::Row;
use crate::value::Value;
use crate::{Error, Result};

pub type Entity = Vec<(String, Value)>;

#[derive(Debug, Clone, Default)]
struct EntityStore {
    kinds: BTreeMap<String, BTreeMap<i64, Entity>>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: Rc<RefCell<EntityStore>>,
    snapshot: Option<EntityStore>,
    /// Kinds that may be stored; `None` accepts any kind
    kinds: Option<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept the given kinds
    pub fn with_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: Some(kinds.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Stored entities of a kind, by id
    pub fn entities(&self, kind: &str) -> Vec<(i64, Entity)> {
        self.store
            .borrow()
            .kinds
            .get(kind)
            .map(|entities| entities.iter().map(|(id, e)| (*id, e.clone())).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.store.borrow().kinds.get(kind).map_or(0, BTreeMap::len)
    }

    /// Delete an entity outside of any loader
    pub fn delete(&self, kind: &str, id: i64) -> bool {
        self.store
            .borrow_mut()
            .kinds
            .get_mut(kind)
            .is_some_and(|entities| entities.remove(&id).is_some())
    }
}

impl Backend for MemoryBackend {
    type Medium = EntityMedium;

    fn begin(&mut self, _unloading: bool) -> Result<()> {
        self.snapshot = Some(self.store.borrow().clone());
        Ok(())
    }

    fn medium(&self, dataset: &DataSet, storable: &str) -> Result<EntityMedium> {
        if let Some(kinds) = &self.kinds {
            if !kinds.iter().any(|k| k == storable) {
                return Err(Error::UnsupportedMedium(format!(
                    "{} is stored as {}, which is not a known entity kind",
                    dataset.name(),
                    storable
                )));
            }
        }
        if dataset.meta().primary_key.len() != 1 {
            return Err(Error::UnsupportedMedium(format!(
                "{}: entities are keyed by a single id",
                dataset.name()
            )));
        }
        Ok(EntityMedium {
            kind: storable.to_string(),
            key: dataset.meta().primary_key[0].clone(),
            store: None,
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            *self.store.borrow_mut() = snapshot;
        }
        Ok(())
    }

    fn clear_object(&mut self, storable: &str) -> Result<()> {
        self.store.borrow_mut().kinds.remove(storable);
        Ok(())
    }
}

/// Saves entities of one kind
pub struct EntityMedium {
    kind: String,
    key: String,
    store: Option<Rc<RefCell<EntityStore>>>,
}

impl EntityMedium {
    fn store(&self) -> Result<&Rc<RefCell<EntityStore>>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::Uninitialized(format!("medium for {} was not visited by a loader", self.kind)))
    }
}

impl StorageMedium<MemoryBackend> for EntityMedium {
    fn visit_loader(&mut self, loader: &MemoryBackend) -> Result<()> {
        self.store = Some(Rc::clone(&loader.store));
        Ok(())
    }

    fn save(&mut self, row: &Row, values: &[(String, Value)]) -> Result<StoredRow> {
        let mut store = self.store()?.borrow_mut();
        let id = match values.iter().find(|(c, _)| *c == self.key) {
            Some((_, Value::Int(id))) => *id,
            Some((_, other)) => {
                return Err(Error::Adapter(format!(
                    "{}.{}: entity key must be an integer, got {}",
                    row.dataset(),
                    row.name,
                    other.kind()
                )));
            }
            None => store.next_id + 1,
        };
        store.next_id = store.next_id.max(id);

        let entities = store.kinds.entry(self.kind.clone()).or_default();
        if entities.contains_key(&id) {
            return Err(Error::Adapter(format!("{} {} already exists", self.kind, id)));
        }
        entities.insert(id, values.to_vec());

        Ok(StoredRow::new(&self.kind, vec![(self.key.clone(), Value::Int(id))], values.to_vec()))
    }

    fn clear(&mut self, stored: &StoredRow) -> Result<()> {
        let id = stored
            .primary_key()
            .and_then(Value::as_int)
            .ok_or_else(|| Error::MissingKey(format!("{} entity without an id", self.kind)))?;

        let removed = self
            .store()?
            .borrow_mut()
            .kinds
            .get_mut(&self.kind)
            .and_then(|entities| entities.remove(&id));
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::AlreadyAbsent(format!("{} {}", self.kind, id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::graph::LoadPlan;
    use crate::loadable::Loader;
    use crate::style::Style;
    use crate::value::Reference;

    fn plan() -> LoadPlan {
        let authors = DataSet::new("Authors").row(Row::new("nabokov").with("name", "Vladimir Nabokov"));
        let books = DataSet::new("Books")
            .row(
                Row::new("lolita")
                    .with("title", "lolita")
                    .with("author_id", Reference::to_row("Authors", "nabokov")),
            )
            .row(Row::new("pale_fire").with("id", 40).with("title", "pale fire"));
        let catalog = Catalog::new().with([authors, books]).unwrap();
        LoadPlan::build(&catalog, &["Books".to_string()]).unwrap()
    }

    #[test]
    fn test_load_assigns_ids() {
        let mut backend = MemoryBackend::new();
        let mut loader = Loader::new(&mut backend).with_style(Style::Verbatim);
        let views = loader.load(&plan()).unwrap();

        assert_eq!(views[1]["lolita"]["author_id"], Value::Int(1));
        assert_eq!(views[1]["lolita"]["id"], Value::Int(2));
        assert_eq!(views[1]["pale_fire"]["id"], Value::Int(40));

        loader.unload().unwrap();
        assert_eq!(backend.count("Books"), 0);
        assert_eq!(backend.count("Authors"), 0);
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let mut backend = MemoryBackend::new();
        backend.store.borrow_mut().kinds.entry("Books".into()).or_default().insert(40, Vec::new());

        let mut loader = Loader::new(&mut backend).with_style(Style::Verbatim);
        let err = loader.load(&plan()).unwrap_err();
        assert!(matches!(err, Error::Adapter(ref msg) if msg == "Books 40 already exists"));

        assert_eq!(backend.count("Authors"), 0);
        assert_eq!(backend.entities("Books").len(), 1);
    }

    #[test]
    fn test_deleted_entity_is_already_absent() {
        let mut backend = MemoryBackend::new();
        let mut loader = Loader::new(&mut backend).with_style(Style::Verbatim);
        loader.load(&plan()).unwrap();
        assert!(loader.backend().delete("Books", 40));
        loader.unload().unwrap();
    }

    #[test]
    fn test_unknown_kind() {
        let mut backend = MemoryBackend::with_kinds(["Authors"]);
        let err = Loader::new(&mut backend)
            .with_style(Style::Verbatim)
            .load(&plan())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMedium(_)));
        assert_eq!(backend.count("Authors"), 0);
    }
}
