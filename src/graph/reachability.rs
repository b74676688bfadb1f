//! Reachable closure of the input packages and the executable -> test
//! module mapping.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::core::artifact::BinaryArtifactsMap;
use crate::core::condition::BuildEnvironment;
use crate::core::identity::{PackageIdentity, PackageReference};
use crate::core::module::{DependencyTarget, ModuleId, ModuleKind, ResolvedModule};
use crate::core::product::{ProductId, ResolvedProduct};
use crate::core::traits::EnabledTraitsMap;
use crate::graph::assemble::Assembled;
use crate::graph::identifiable::{Identifiable, IdentifiableSet};
use crate::graph::topo::{topological_sort, GraphError};
use crate::graph::ModulesGraph;

/// A module or a product, as visited by graph walks.
#[derive(Debug, Clone)]
pub enum GraphNode {
    Module(Arc<ResolvedModule>),
    Product(Arc<ResolvedProduct>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Module(ModuleId),
    Product(ProductId),
}

impl Identifiable for GraphNode {
    type Id = NodeId;

    fn id(&self) -> NodeId {
        match self {
            GraphNode::Module(m) => NodeId::Module(m.id.clone()),
            GraphNode::Product(p) => NodeId::Product(p.id.clone()),
        }
    }
}

impl GraphNode {
    pub fn as_module(&self) -> Option<&Arc<ResolvedModule>> {
        match self {
            GraphNode::Module(m) => Some(m),
            GraphNode::Product(_) => None,
        }
    }

    pub fn as_product(&self) -> Option<&Arc<ResolvedProduct>> {
        match self {
            GraphNode::Product(p) => Some(p),
            GraphNode::Module(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GraphNode::Module(m) => m.name(),
            GraphNode::Product(p) => p.name(),
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Module(m) => write!(f, "{}", m),
            GraphNode::Product(p) => write!(f, "{}", p),
        }
    }
}

/// Module and product lookup by identity.
pub(crate) struct NodeIndex<'a> {
    pub modules: &'a IdentifiableSet<Arc<ResolvedModule>>,
    pub products: &'a IdentifiableSet<Arc<ResolvedProduct>>,
}

impl NodeIndex<'_> {
    /// Nodes `node` leads to, limited to edges active in `env` when given.
    pub fn successors(&self, node: &GraphNode, env: Option<&BuildEnvironment>) -> Vec<GraphNode> {
        match node {
            GraphNode::Module(module) => module
                .dependencies()
                .iter()
                .filter(|d| env.map_or(true, |env| d.satisfies(env)))
                .filter_map(|d| match &d.target {
                    DependencyTarget::Module(id) => self.modules.get(id).cloned().map(GraphNode::Module),
                    DependencyTarget::Product(id) => self.products.get(id).cloned().map(GraphNode::Product),
                })
                .collect(),
            GraphNode::Product(product) => product
                .modules()
                .iter()
                .filter_map(|id| self.modules.get(id).cloned().map(GraphNode::Module))
                .collect(),
        }
    }

    /// Everything reachable from `start`, `start` included, in dependency
    /// order.
    pub fn closure(
        &self,
        start: Vec<GraphNode>,
        env: Option<&BuildEnvironment>,
    ) -> Result<Vec<GraphNode>, GraphError> {
        topological_sort(start, |node| self.successors(node, env))
    }
}

/// Compute the reachable sets and wrap everything up.
pub(crate) fn build_graph(
    assembled: Assembled,
    roots: &[PackageIdentity],
    inputs: &[PackageIdentity],
    required: Vec<PackageReference>,
    binary_artifacts: BinaryArtifactsMap,
    enabled_traits: EnabledTraitsMap,
) -> Result<ModulesGraph, GraphError> {
    let packages: IdentifiableSet<_> = assembled.packages.into_iter().map(Arc::new).collect();

    let all_modules: IdentifiableSet<Arc<ResolvedModule>> = packages
        .iter()
        .flat_map(|p| p.modules().iter().cloned())
        .collect();
    let all_products: IdentifiableSet<Arc<ResolvedProduct>> = packages
        .iter()
        .flat_map(|p| p.products().iter().cloned())
        .collect();

    let start: Vec<GraphNode> = inputs
        .iter()
        .filter_map(|id| packages.get(id))
        .flat_map(|p| {
            p.modules()
                .iter()
                .cloned()
                .map(GraphNode::Module)
                .chain(p.products().iter().cloned().map(GraphNode::Product))
        })
        .collect();

    let index = NodeIndex {
        modules: &all_modules,
        products: &all_products,
    };
    let mut reachable_modules = IdentifiableSet::new();
    let mut reachable_products = IdentifiableSet::new();
    for node in index.closure(start, None)? {
        match node {
            GraphNode::Module(m) => {
                reachable_modules.insert(m);
            }
            GraphNode::Product(p) => {
                reachable_products.insert(p);
            }
        }
    }

    let root_packages = roots.iter().filter_map(|id| packages.get(id).cloned()).collect();

    Ok(ModulesGraph {
        root_packages,
        packages,
        all_modules,
        all_products,
        reachable_modules,
        reachable_products,
        required_dependencies: required,
        binary_artifacts,
        enabled_traits,
        input_packages: inputs.to_vec(),
    })
}

/// For every executable among `root_modules`, the test modules among them
/// that depend directly on the executable or on something in its closure.
pub(crate) fn test_modules_for_executables(
    root_modules: &[Arc<ResolvedModule>],
    index: &NodeIndex<'_>,
) -> Result<BTreeMap<ModuleId, Vec<Arc<ResolvedModule>>>, GraphError> {
    let module_deps = |module: &ResolvedModule, include_plugins: bool| -> Vec<Arc<ResolvedModule>> {
        module
            .dependencies()
            .iter()
            .filter_map(|d| d.as_module())
            .filter_map(|id| index.modules.get(id).cloned())
            .filter(|m| include_plugins || m.kind() != ModuleKind::Plugin)
            .collect()
    };

    let tests: HashMap<ModuleId, BTreeSet<ModuleId>> = root_modules
        .iter()
        .filter(|m| m.kind() == ModuleKind::Test)
        .map(|m| {
            let deps = module_deps(m.as_ref(), false).iter().map(|d| d.id.clone()).collect();
            (m.id.clone(), deps)
        })
        .collect();

    let mut mapping = BTreeMap::new();
    for executable in root_modules.iter().filter(|m| m.kind() == ModuleKind::Executable) {
        let closure = topological_sort(module_deps(executable.as_ref(), true), |m| {
            module_deps(m.as_ref(), false)
        })?;
        let mut covered: BTreeSet<ModuleId> = closure.iter().map(|m| m.id.clone()).collect();
        covered.insert(executable.id.clone());

        let mut associated: Vec<Arc<ResolvedModule>> = root_modules
            .iter()
            .filter(|m| {
                tests
                    .get(&m.id)
                    .is_some_and(|deps| !deps.is_disjoint(&covered))
            })
            .cloned()
            .collect();
        associated.sort_by(|a, b| a.id.cmp(&b.id));
        mapping.insert(executable.id.clone(), associated);
    }

    Ok(mapping)
}
