//! The modules graph and the engine that builds it.
//!
//! [`GraphLoader`] turns a set of manifests into a validated, immutable
//! [`ModulesGraph`]:
//! - traits are resolved per package ([`traits`])
//! - dependencies are discovered from the roots ([`load`])
//! - modules and products are assembled ([`assemble`]) and checked ([`validate`])
//! - reachability and derived views are computed ([`reachability`])

pub mod assemble;
pub mod errors;
pub mod identifiable;
pub mod load;
pub mod package_graph;
pub mod reachability;
pub mod topo;
pub mod traits;
pub mod validate;

pub use errors::{ModulesGraphError, PackageGraphError, ProductSuggestion};
pub use identifiable::{Identifiable, IdentifiableSet};
pub use load::{GraphLoader, GraphOptions};
pub use package_graph::PackageGraph;
pub use reachability::{GraphNode, NodeId};
pub use topo::{find_cycle, topological_sort, Cycle, GraphError};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::artifact::BinaryArtifactsMap;
use crate::core::condition::BuildEnvironment;
use crate::core::identity::{PackageIdentity, PackageReference};
use crate::core::module::{ModuleId, ResolvedModule};
use crate::core::package::ResolvedPackage;
use crate::core::product::{ProductId, ResolvedProduct};
use crate::core::traits::EnabledTraitsMap;
use reachability::NodeIndex;

/// The validated package graph.
///
/// Once created, a ModulesGraph is read-only. Any manifest change means
/// loading a new one.
#[derive(Debug, Clone)]
pub struct ModulesGraph {
    pub(crate) root_packages: IdentifiableSet<Arc<ResolvedPackage>>,
    pub(crate) packages: IdentifiableSet<Arc<ResolvedPackage>>,

    /// Every module of every package, minus the tests of non-root packages
    pub(crate) all_modules: IdentifiableSet<Arc<ResolvedModule>>,
    pub(crate) all_products: IdentifiableSet<Arc<ResolvedProduct>>,

    /// Closure of the input packages over every declared edge
    pub(crate) reachable_modules: IdentifiableSet<Arc<ResolvedModule>>,
    pub(crate) reachable_products: IdentifiableSet<Arc<ResolvedProduct>>,

    pub(crate) required_dependencies: Vec<PackageReference>,
    pub(crate) binary_artifacts: BinaryArtifactsMap,
    pub(crate) enabled_traits: EnabledTraitsMap,

    /// Roots followed by explicitly requested root dependencies
    pub(crate) input_packages: Vec<PackageIdentity>,
}

impl ModulesGraph {
    pub fn root_packages(&self) -> &IdentifiableSet<Arc<ResolvedPackage>> {
        &self.root_packages
    }

    pub fn packages(&self) -> &IdentifiableSet<Arc<ResolvedPackage>> {
        &self.packages
    }

    pub fn package(&self, identity: PackageIdentity) -> Option<&Arc<ResolvedPackage>> {
        self.packages.get(&identity)
    }

    /// The package owning `module`, if the module is part of the graph.
    pub fn package_for_module(&self, module: &ModuleId) -> Option<&Arc<ResolvedPackage>> {
        if !self.all_modules.contains(module) {
            return None;
        }
        self.packages.get(&module.package)
    }

    /// The package owning `product`, if the product is part of the graph.
    pub fn package_for_product(&self, product: &ProductId) -> Option<&Arc<ResolvedPackage>> {
        if !self.all_products.contains(product) {
            return None;
        }
        self.packages.get(&product.package)
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Arc<ResolvedModule>> {
        self.all_modules.get(id)
    }

    pub fn product(&self, id: &ProductId) -> Option<&Arc<ResolvedProduct>> {
        self.all_products.get(id)
    }

    /// Look a product up by name, root packages first.
    pub fn find_product(&self, name: &str) -> Option<&Arc<ResolvedProduct>> {
        let mut matches = self.all_products.iter().filter(|p| p.name() == name);
        let first = matches.next()?;
        if self.is_root_package(first.package()) {
            return Some(first);
        }
        matches
            .find(|p| self.is_root_package(p.package()))
            .or(Some(first))
    }

    /// Look a module up by name, root packages first.
    pub fn find_module(&self, name: &str) -> Option<&Arc<ResolvedModule>> {
        let mut matches = self.all_modules.iter().filter(|m| m.name() == name);
        let first = matches.next()?;
        if self.is_root_package(first.package()) {
            return Some(first);
        }
        matches
            .find(|m| self.is_root_package(m.package()))
            .or(Some(first))
    }

    pub fn all_modules(&self) -> &IdentifiableSet<Arc<ResolvedModule>> {
        &self.all_modules
    }

    pub fn all_products(&self) -> &IdentifiableSet<Arc<ResolvedProduct>> {
        &self.all_products
    }

    pub fn reachable_modules(&self) -> &IdentifiableSet<Arc<ResolvedModule>> {
        &self.reachable_modules
    }

    pub fn reachable_products(&self) -> &IdentifiableSet<Arc<ResolvedProduct>> {
        &self.reachable_products
    }

    /// Every package reference needed to realize the graph, roots excluded.
    pub fn required_dependencies(&self) -> &[PackageReference] {
        &self.required_dependencies
    }

    pub fn binary_artifacts(&self) -> &BinaryArtifactsMap {
        &self.binary_artifacts
    }

    pub fn enabled_traits(&self) -> &EnabledTraitsMap {
        &self.enabled_traits
    }

    pub fn input_packages(&self) -> &[PackageIdentity] {
        &self.input_packages
    }

    pub fn is_root_package(&self, identity: PackageIdentity) -> bool {
        self.root_packages.contains(&identity)
    }

    fn index(&self) -> NodeIndex<'_> {
        NodeIndex {
            modules: &self.all_modules,
            products: &self.all_products,
        }
    }

    /// Whether `module` is reachable from the root packages through edges
    /// active in `env`.
    pub fn is_in_root_packages(
        &self,
        module: &ModuleId,
        env: &BuildEnvironment,
    ) -> Result<bool, GraphError> {
        let start: Vec<GraphNode> = self
            .root_packages
            .iter()
            .flat_map(|p| {
                p.modules()
                    .iter()
                    .cloned()
                    .map(GraphNode::Module)
                    .chain(p.products().iter().cloned().map(GraphNode::Product))
            })
            .collect();
        let closure = self.index().closure(start, Some(env))?;
        Ok(closure
            .iter()
            .any(|node| matches!(node, GraphNode::Module(m) if &m.id == module)))
    }

    /// Modules and products `module` depends on directly, whatever the
    /// build environment.
    pub fn direct_dependencies(&self, module: &ModuleId) -> Vec<GraphNode> {
        match self.all_modules.get(module) {
            Some(m) => self.index().successors(&GraphNode::Module(m.clone()), None),
            None => Vec::new(),
        }
    }

    /// Everything `module` depends on through edges active in `env`, in
    /// dependency order. The module itself is not included.
    pub fn recursive_dependencies(
        &self,
        module: &ModuleId,
        env: &BuildEnvironment,
    ) -> Result<Vec<GraphNode>, GraphError> {
        let Some(m) = self.all_modules.get(module) else {
            return Ok(Vec::new());
        };
        let index = self.index();
        let start = index.successors(&GraphNode::Module(m.clone()), Some(env));
        index.closure(start, Some(env))
    }

    /// For each executable module of the root packages, the root test
    /// modules associated with it.
    pub fn compute_test_modules_for_executable_modules(
        &self,
    ) -> Result<BTreeMap<ModuleId, Vec<Arc<ResolvedModule>>>, GraphError> {
        let root_modules: Vec<Arc<ResolvedModule>> = self
            .root_packages
            .iter()
            .flat_map(|p| p.modules().iter().cloned())
            .collect();
        reachability::test_modules_for_executables(&root_modules, &self.index())
    }

    /// Package-level dependency view.
    pub fn package_graph(&self) -> PackageGraph {
        let mut graph = PackageGraph::new();
        for package in self.packages.iter() {
            graph.add_package(package.identity());
        }
        for package in self.packages.iter() {
            for dep in package.dependencies() {
                graph.add_edge(package.identity(), *dep);
            }
        }
        graph
    }
}
