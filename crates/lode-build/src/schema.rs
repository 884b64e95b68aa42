//! Schema registry.
//!
//! A caller-assembled, insertion-ordered map of table name to [`Table`].
//! Registration is where extraction callables are injected, which makes the
//! registry the seam between the engine and all external collaborators.

use std::collections::{HashMap, HashSet};

use lode_core::TableName;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::{BuildError, BuildResult};
use crate::table::Table;

/// The set of tables a refresh run can operate on.
#[derive(Debug, Default)]
pub struct Schema {
    tables: HashMap<TableName, Table>,
    order: Vec<TableName>,
}

impl Schema {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect tables into a registry, rejecting duplicates.
    pub fn from_tables<I>(tables: I) -> BuildResult<Self>
    where
        I: IntoIterator<Item = Table>,
    {
        let mut schema = Self::new();
        for table in tables {
            schema.register(table)?;
        }
        Ok(schema)
    }

    /// Add a table under its own name.
    pub fn register(&mut self, table: impl Into<Table>) -> BuildResult<()> {
        let table = table.into();
        let name = table.name().clone();
        if self.tables.contains_key(&name) {
            return Err(BuildError::DuplicateTable(name));
        }
        self.order.push(name.clone());
        self.tables.insert(name, table);
        Ok(())
    }

    /// Look a table up by name.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &TableName> {
        self.order.iter()
    }

    /// Registered tables, in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.order.iter().filter_map(|name| self.tables.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Check that the dependency graph is refreshable in some order.
    ///
    /// The updater itself recurses without a cycle guard, so a cyclic
    /// registry must be caught here, at registration time, not mid-refresh.
    pub fn validate(&self) -> BuildResult<()> {
        let mut graph = DiGraph::<TableName, ()>::new();
        let mut nodes: HashMap<TableName, NodeIndex> = HashMap::new();
        for name in &self.order {
            nodes.insert(name.clone(), graph.add_node(name.clone()));
        }
        for table in self.tables() {
            for dependency in table.depends_on(self) {
                if let (Some(&from), Some(&to)) =
                    (nodes.get(&dependency), nodes.get(table.name()))
                {
                    // dependency -> dependent, so a sort yields sources first
                    graph.add_edge(from, to, ());
                }
            }
        }
        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(BuildError::CircularDependency {
                cycle: cycle_path(&graph, cycle.node_id()),
            }),
        }
    }
}

/// Walk outgoing edges from the offending node to render a readable cycle.
fn cycle_path(graph: &DiGraph<TableName, ()>, start: NodeIndex) -> String {
    let mut path = vec![graph[start].to_string()];
    let mut visited = HashSet::from([start]);
    let mut current = start;

    while let Some(edge) = graph.edges(current).next() {
        let target = edge.target();
        path.push(graph[target].to_string());
        if target == start || visited.contains(&target) {
            break;
        }
        visited.insert(target);
        current = target;
    }

    path.join(" -> ")
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
