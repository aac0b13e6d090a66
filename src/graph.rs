//! Reference Graph - dataset dependency graph and load ordering
//!
//! Nodes are dataset names; an edge `A -> B` means a row of `A` references a
//! row of `B` (or `A` declares `B` in `depends_on`), so `B` must be loaded
//! first. The graph is built from the requested datasets by walking the
//! catalog transitively.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::catalog::Catalog;
use crate::dataset::DataSet;
use crate::{Error, Result};

/// In-memory dependency graph over dataset names.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    /// Dataset definitions indexed by name
    datasets: HashMap<String, DataSet>,
    /// Datasets a dataset references (outgoing edges)
    edges_from: HashMap<String, Vec<String>>,
    /// Datasets referencing a dataset (incoming edges)
    edges_to: HashMap<String, Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl ReferenceGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph reachable from `requested`, looking definitions up in `catalog`
    pub fn build(catalog: &Catalog, requested: &[String]) -> Result<Self> {
        let mut graph = Self::new();
        let mut queue: VecDeque<String> = requested.iter().cloned().collect();
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let dataset = catalog.dataset(&name)?;
            for row in dataset {
                for reference in row.references() {
                    catalog.dataset(&reference.dataset)?.row_named(&reference.row)?;
                }
            }
            for target in dataset.direct_references() {
                queue.push_back(target);
            }
            graph.add_dataset(dataset.clone());
        }

        Ok(graph)
    }

    /// Add a dataset and its outgoing edges
    pub fn add_dataset(&mut self, dataset: DataSet) {
        let name = dataset.name().to_string();
        for target in dataset.direct_references() {
            self.add_edge(&name, &target);
        }
        self.edges_from.entry(name.clone()).or_default();
        self.datasets.insert(name, dataset);
    }

    /// Add an edge `from -> to` (from references to)
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let outgoing = self.edges_from.entry(from.to_string()).or_default();
        if !outgoing.iter().any(|t| t == to) {
            outgoing.push(to.to_string());
            self.edges_to.entry(to.to_string()).or_default().push(from.to_string());
        }
    }

    pub fn get_dataset(&self, name: &str) -> Option<&DataSet> {
        self.datasets.get(name)
    }

    /// Datasets referenced by `name`
    pub fn get_edges_from(&self, name: &str) -> &[String] {
        self.edges_from.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Datasets referencing `name`
    pub fn get_edges_to(&self, name: &str) -> &[String] {
        self.edges_to.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Every dataset that transitively references `name`
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let mut visited = HashSet::new();
        let mut queue: Vec<&str> = self.get_edges_to(name).iter().map(String::as_str).collect();
        let mut found = Vec::new();

        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            found.push(current);
            queue.extend(self.get_edges_to(current).iter().map(String::as_str));
        }
        found
    }

    /// Load order for `requested`: every dataset after everything it references.
    ///
    /// References are emitted before the dataset that holds them, in
    /// discovery order; anything already emitted is skipped. A reference
    /// cycle is reported with the path that closes it.
    pub fn load_order(&self, requested: &[String]) -> Result<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut order = Vec::new();

        for name in requested {
            self.visit(name, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(Error::ReferenceCycle(cycle));
            }
            None => {}
        }

        if !self.datasets.contains_key(name) {
            return Err(Error::UnknownDataset(name.to_string()));
        }

        marks.insert(name, Mark::Visiting);
        stack.push(name);
        for target in self.get_edges_from(name) {
            self.visit(target, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            datasets: self.datasets.len(),
            references: self.edges_from.values().map(|v| v.len()).sum(),
            rows: self.datasets.values().map(|ds| ds.len()).sum(),
            shared: self.datasets.values().filter(|ds| ds.is_shared()).count(),
        }
    }
}

/// The result of planning one load operation.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    /// Dataset instances in load order, each with `meta.references` filled in
    pub datasets: Vec<DataSet>,
    /// Requested dataset names, in request order
    pub requested: Vec<String>,
    /// Uses of a shared DataType beyond its first, each served by the one instance
    pub shared_reuses: usize,
}

impl LoadPlan {
    /// Plan the load of `requested` against `catalog`.
    ///
    /// Each dataset is instantiated once per plan: a DataType requested by
    /// several referencing datasets resolves to the same instance.
    pub fn build(catalog: &Catalog, requested: &[String]) -> Result<Self> {
        let graph = ReferenceGraph::build(catalog, requested)?;
        let order = graph.load_order(requested)?;

        let mut datasets = Vec::with_capacity(order.len());
        let mut shared_reuses = 0;
        for name in &order {
            let mut instance = graph
                .get_dataset(name)
                .cloned()
                .ok_or_else(|| Error::UnknownDataset(name.clone()))?;

            if instance.is_shared() {
                let users: Vec<&String> = graph
                    .get_edges_to(name)
                    .iter()
                    .filter(|r| order.contains(*r))
                    .collect();
                let uses = users.len() + usize::from(requested.contains(name));
                if uses > 1 {
                    tracing::debug!("{} uses share one instance of {}", uses, name);
                }
                shared_reuses += uses.saturating_sub(1);
            }

            let mut references = graph.load_order(std::slice::from_ref(name))?;
            references.pop();
            instance.meta_mut().references = references;
            datasets.push(instance);
        }

        Ok(Self {
            datasets,
            requested: requested.to_vec(),
            shared_reuses,
        })
    }

    /// Dataset names in load order
    pub fn order(&self) -> Vec<&str> {
        self.datasets.iter().map(DataSet::name).collect()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Total rows to be saved
    pub fn row_count(&self) -> usize {
        self.datasets.iter().map(DataSet::len).sum()
    }
}

/// Statistics about a reference graph
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub datasets: usize,
    pub references: usize,
    pub rows: usize,
    pub shared: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Reference Graph Statistics:")?;
        writeln!(f, "  Datasets: {} (shared: {})", self.datasets, self.shared)?;
        writeln!(f, "  Rows: {}", self.rows)?;
        writeln!(f, "  References: {}", self.references)
    }
}
