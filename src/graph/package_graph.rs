//! Package-level view of a modules graph.
//!
//! Once created, a PackageGraph is read-only.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::identity::PackageIdentity;
use crate::graph::topo::GraphError;

/// Packages and their loaded dependency edges.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    /// Package graph; an edge `a -> b` means `a` depends on `b`
    graph: DiGraph<PackageIdentity, ()>,

    /// Map from identity to node index
    pkg_to_node: HashMap<PackageIdentity, NodeIndex>,
}

impl PackageGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package to the graph.
    pub fn add_package(&mut self, identity: PackageIdentity) {
        if self.pkg_to_node.contains_key(&identity) {
            return;
        }
        let node = self.graph.add_node(identity);
        self.pkg_to_node.insert(identity, node);
    }

    /// Add a dependency edge between packages.
    pub fn add_edge(&mut self, from: PackageIdentity, to: PackageIdentity) {
        if let (Some(&from_node), Some(&to_node)) =
            (self.pkg_to_node.get(&from), self.pkg_to_node.get(&to))
        {
            if !self.graph.contains_edge(from_node, to_node) {
                self.graph.add_edge(from_node, to_node, ());
            }
        }
    }

    /// Check if a package is in the graph.
    pub fn contains(&self, identity: PackageIdentity) -> bool {
        self.pkg_to_node.contains_key(&identity)
    }

    /// Get the number of packages.
    pub fn len(&self) -> usize {
        self.pkg_to_node.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.pkg_to_node.is_empty()
    }

    /// Get direct dependencies of a package, sorted.
    pub fn dependencies(&self, identity: PackageIdentity) -> Vec<PackageIdentity> {
        self.neighbors(identity, Direction::Outgoing)
    }

    /// Get packages that depend on the given package, sorted.
    pub fn dependents(&self, identity: PackageIdentity) -> Vec<PackageIdentity> {
        self.neighbors(identity, Direction::Incoming)
    }

    fn neighbors(&self, identity: PackageIdentity, direction: Direction) -> Vec<PackageIdentity> {
        let Some(&node) = self.pkg_to_node.get(&identity) else {
            return Vec::new();
        };
        let mut out: Vec<PackageIdentity> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort();
        out
    }

    /// Packages with dependencies before dependents.
    ///
    /// Fails on package cycles, which a graph may legitimately contain when
    /// every package on the cycle allows them.
    pub fn topological_order(&self) -> Result<Vec<PackageIdentity>, GraphError> {
        let order = petgraph::algo::toposort(&self.graph, None)
            .map_err(|_| GraphError::UnexpectedCycle)?;

        // toposort puts `a` before `b` for an edge a -> b ("a depends on b");
        // reverse to get dependencies first.
        Ok(order.into_iter().rev().map(|n| self.graph[n]).collect())
    }

    /// Get all transitive dependencies of a package.
    pub fn transitive_dependencies(&self, identity: PackageIdentity) -> HashSet<PackageIdentity> {
        let mut visited = HashSet::new();
        let mut stack = vec![identity];

        while let Some(current) = stack.pop() {
            for dep in self.dependencies(current) {
                if visited.insert(dep) {
                    stack.push(dep);
                }
            }
        }

        visited.remove(&identity);
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> PackageIdentity {
        PackageIdentity::plain(name)
    }

    fn sample() -> PackageGraph {
        let mut graph = PackageGraph::new();
        for name in ["app", "kit", "log"] {
            graph.add_package(id(name));
        }
        graph.add_edge(id("app"), id("kit"));
        graph.add_edge(id("app"), id("log"));
        graph.add_edge(id("kit"), id("log"));
        graph
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let graph = sample();
        assert_eq!(graph.dependencies(id("app")), vec![id("kit"), id("log")]);
        assert_eq!(graph.dependents(id("log")), vec![id("app"), id("kit")]);
        assert!(graph.dependencies(id("missing")).is_empty());
    }

    #[test]
    fn test_topological_order_puts_dependencies_first() {
        let order = sample().topological_order().unwrap();
        let pos = |name: &str| order.iter().position(|p| *p == id(name)).unwrap();
        assert!(pos("log") < pos("kit"));
        assert!(pos("kit") < pos("app"));
    }

    #[test]
    fn test_topological_order_fails_on_cycle() {
        let mut graph = sample();
        graph.add_edge(id("log"), id("app"));
        assert_eq!(graph.topological_order(), Err(GraphError::UnexpectedCycle));
    }

    #[test]
    fn test_transitive_dependencies() {
        let deps = sample().transitive_dependencies(id("app"));
        assert_eq!(deps.len(), 2);
        assert!(sample().transitive_dependencies(id("log")).is_empty());
    }
}
