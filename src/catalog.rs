//! Catalog - explicit registry of dataset definitions
//!
//! Datasets reference each other by name, so every dataset that can be
//! reached from a load request must be registered in a catalog. A catalog is
//! created per test run and cleared between independent runs.
//!
//! Load requests are expressed as [`Source`]s: a dataset, a module grouping
//! datasets, or a name to look up in the catalog.

use std::collections::HashMap;

use crate::dataset::DataSet;
use crate::graph::ReferenceGraph;
use crate::{Error, Result};

/// A member of a [`Module`].
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    DataSet(DataSet),
    /// Anything that is not a dataset; described by its type name
    Other(String),
}

/// A named group of datasets, with an optional explicit export list.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    members: Vec<(String, Member)>,
    exports: Option<Vec<String>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            exports: None,
        }
    }

    /// Add a dataset member under its own name
    pub fn dataset(mut self, dataset: DataSet) -> Self {
        let name = dataset.name().to_string();
        self.members.push((name, Member::DataSet(dataset)));
        self
    }

    /// Add any member under an explicit name
    pub fn member(mut self, name: impl Into<String>, member: Member) -> Self {
        self.members.push((name.into(), member));
        self
    }

    /// Restrict what the module contributes to these names, in this order
    pub fn exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Datasets this module contributes to a load request.
    ///
    /// Without an export list: every public dataset member, sorted by member
    /// name. With one: the listed names that are datasets, in listed order.
    pub fn datasets(&self) -> Vec<&DataSet> {
        let lookup = |name: &str| {
            self.members.iter().find(|(n, _)| n == name).and_then(|(_, m)| match m {
                Member::DataSet(ds) => Some(ds),
                Member::Other(_) => None,
            })
        };

        match &self.exports {
            Some(exports) => exports.iter().filter_map(|name| lookup(name)).collect(),
            None => {
                let mut public: Vec<(&str, &DataSet)> = self
                    .members
                    .iter()
                    .filter(|(name, _)| !name.starts_with('_'))
                    .filter_map(|(name, m)| match m {
                        Member::DataSet(ds) => Some((name.as_str(), ds)),
                        Member::Other(_) => None,
                    })
                    .collect();
                public.sort_by(|a, b| a.0.cmp(b.0));
                public.into_iter().map(|(_, ds)| ds).collect()
            }
        }
    }
}

/// One entry of a load request.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    DataSet(DataSet),
    Module(Module),
    /// A dataset or module registered in the catalog
    Named(String),
    /// Anything else; always rejected
    Other(String),
}

impl From<DataSet> for Source {
    fn from(dataset: DataSet) -> Self {
        Source::DataSet(dataset)
    }
}

impl From<&DataSet> for Source {
    fn from(dataset: &DataSet) -> Self {
        Source::DataSet(dataset.clone())
    }
}

impl From<Module> for Source {
    fn from(module: Module) -> Self {
        Source::Module(module)
    }
}

impl From<&str> for Source {
    fn from(name: &str) -> Self {
        Source::Named(name.to_string())
    }
}

/// Registry of dataset definitions and modules, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    /// Definitions in registration order
    datasets: Vec<DataSet>,
    /// Dataset name -> index into `datasets`
    index: HashMap<String, usize>,
    modules: HashMap<String, Module>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset definition.
    ///
    /// Registering the same definition twice is a no-op; registering a
    /// different definition under a taken name is a configuration error.
    pub fn register(&mut self, dataset: DataSet) -> Result<()> {
        if let Some(&idx) = self.index.get(dataset.name()) {
            if self.datasets[idx] == dataset {
                return Ok(());
            }
            return Err(Error::ConflictingDefinition(dataset.name().to_string()));
        }
        self.index.insert(dataset.name().to_string(), self.datasets.len());
        self.datasets.push(dataset);
        Ok(())
    }

    /// Register several datasets, builder style
    pub fn with<I: IntoIterator<Item = DataSet>>(mut self, datasets: I) -> Result<Self> {
        for dataset in datasets {
            self.register(dataset)?;
        }
        Ok(self)
    }

    /// Register a module and every dataset it holds
    pub fn register_module(&mut self, module: Module) -> Result<()> {
        for (_, member) in &module.members {
            if let Member::DataSet(ds) = member {
                self.register(ds.clone())?;
            }
        }
        self.modules.insert(module.name.clone(), module);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DataSet> {
        self.index.get(name).map(|&idx| &self.datasets[idx])
    }

    /// Look up a dataset, failing with its name
    pub fn dataset(&self, name: &str) -> Result<&DataSet> {
        self.get(name).ok_or_else(|| Error::UnknownDataset(name.to_string()))
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Registered datasets in registration order
    pub fn datasets(&self) -> impl Iterator<Item = &DataSet> {
        self.datasets.iter()
    }

    /// Forget every definition and module
    pub fn clear(&mut self) {
        self.datasets.clear();
        self.index.clear();
        self.modules.clear();
    }

    /// Flatten a load request into dataset names, in request order.
    ///
    /// Inline datasets and modules are registered on the way so that later
    /// reference lookups find them.
    pub fn expand(&mut self, sources: &[Source]) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for source in sources {
            match source {
                Source::DataSet(ds) => {
                    self.register(ds.clone())?;
                    names.push(ds.name().to_string());
                }
                Source::Module(module) => {
                    names.extend(module.datasets().into_iter().map(|ds| ds.name().to_string()));
                    self.register_module(module.clone())?;
                }
                Source::Named(name) => {
                    if self.contains(name) {
                        names.push(name.clone());
                    } else if let Some(module) = self.modules.get(name) {
                        names.extend(module.datasets().into_iter().map(|ds| ds.name().to_string()));
                    } else {
                        return Err(unsupported(name, "unregistered name"));
                    }
                }
                Source::Other(kind) => return Err(unsupported(kind, kind)),
            }
        }
        Ok(names)
    }

    /// Transitive references of a dataset, dependency-first, without itself
    pub fn references(&self, name: &str) -> Result<Vec<String>> {
        let graph = ReferenceGraph::build(self, &[name.to_string()])?;
        let mut order = graph.load_order(&[name.to_string()])?;
        order.retain(|n| n != name);
        Ok(order)
    }

    /// A copy of the definition with `meta.references` filled in
    pub fn instantiate(&self, name: &str) -> Result<DataSet> {
        let references = self.references(name)?;
        let mut instance = self.dataset(name)?.clone();
        instance.meta_mut().references = references;
        Ok(instance)
    }
}

fn unsupported(obj: &str, kind: &str) -> Error {
    Error::UnsupportedSource(format!(
        "Data object can only be loaded with DataSet classes or modules containing \
         DataSet classes.  Got: {}, type: {}",
        obj, kind
    ))
}
