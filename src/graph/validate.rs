//! Structural checks over the assembled packages.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::core::identity::PackageReference;
use crate::core::module::{DependencyTarget, ModuleId, ModuleKind, ResolvedModule};
use crate::core::product::{ProductId, ProductKind, ResolvedProduct};
use crate::graph::assemble::Assembled;
use crate::graph::errors::{ModulesGraphError, PackageGraphError};
use crate::graph::topo::{find_cycle, topological_sort, GraphError};
use crate::util::diagnostic::{Diagnostic, ObservabilitySink};

/// Run every check; the first failure wins.
pub(crate) fn validate(assembled: &Assembled, sink: &dyn ObservabilitySink) -> Result<(), ModulesGraphError> {
    check_root_modules(assembled)?;
    check_module_cycles(assembled)?;
    check_duplicate_products(assembled)?;
    check_plugin_dependencies(assembled)?;
    warn_unused_dependencies(assembled, sink);
    Ok(())
}

fn check_root_modules(assembled: &Assembled) -> Result<(), PackageGraphError> {
    for package in assembled.packages.iter().filter(|p| p.is_root()) {
        if package.modules().is_empty() && package.products().is_empty() {
            return Err(PackageGraphError::NoModules {
                package: package.identity().to_string(),
            });
        }
    }
    Ok(())
}

struct Lookup {
    modules: HashMap<ModuleId, Arc<ResolvedModule>>,
    products: HashMap<ProductId, Arc<ResolvedProduct>>,
}

impl Lookup {
    fn new(assembled: &Assembled) -> Self {
        let mut modules = HashMap::new();
        let mut products = HashMap::new();
        for package in &assembled.packages {
            for module in package.modules() {
                modules.insert(module.id().clone(), Arc::clone(module));
            }
            for product in package.products() {
                products.insert(product.id().clone(), Arc::clone(product));
            }
        }
        Lookup { modules, products }
    }

    /// Modules a module depends on, looking through products.
    fn module_successors(&self, module: &ResolvedModule) -> Vec<Arc<ResolvedModule>> {
        let mut successors = Vec::new();
        for dependency in module.dependencies() {
            match &dependency.target {
                DependencyTarget::Module(id) => successors.extend(self.modules.get(id).cloned()),
                DependencyTarget::Product(id) => {
                    if let Some(product) = self.products.get(id) {
                        successors.extend(product.modules().iter().filter_map(|m| self.modules.get(m).cloned()));
                    }
                }
            }
        }
        successors
    }
}

fn check_module_cycles(assembled: &Assembled) -> Result<(), ModulesGraphError> {
    let lookup = Lookup::new(assembled);
    let mut modules: Vec<Arc<ResolvedModule>> = lookup.modules.values().cloned().collect();
    modules.sort_by(|a, b| a.id().cmp(b.id()));

    let successors = |m: &Arc<ResolvedModule>| lookup.module_successors(m);
    if topological_sort(modules.iter().cloned(), successors).is_ok() {
        return Ok(());
    }

    match find_cycle(modules.iter().cloned(), successors) {
        Some(found) => Err(PackageGraphError::CycleDetected {
            path: found.path.iter().map(|m| m.name().to_string()).collect(),
            cycle: found.cycle.iter().map(|m| m.name().to_string()).collect(),
        }
        .into()),
        None => Err(GraphError::UnexpectedCycle.into()),
    }
}

fn check_duplicate_products(assembled: &Assembled) -> Result<(), PackageGraphError> {
    let mut declarations: BTreeMap<&str, Vec<PackageReference>> = BTreeMap::new();
    for package in &assembled.packages {
        for product in package.products().iter().filter(|p| p.kind() != ProductKind::Test) {
            if assembled.aliased_products.contains(product.id()) {
                tracing::debug!("`{}` is consumed with module aliases, not checking its name", product.id());
                continue;
            }
            let declared = declarations.entry(product.name()).or_default();
            if !declared.iter().any(|r| r.identity == package.identity()) {
                declared.push(PackageReference {
                    identity: package.identity(),
                    kind: package.kind().clone(),
                });
            }
        }
    }

    for (product, packages) in declarations {
        if packages.len() > 1 {
            return Err(PackageGraphError::DuplicateProduct {
                product: product.to_string(),
                packages,
            });
        }
    }
    Ok(())
}

fn module_allowed_in_plugin(kind: ModuleKind) -> bool {
    matches!(
        kind,
        ModuleKind::Library | ModuleKind::Executable | ModuleKind::Binary | ModuleKind::SystemLibrary
    )
}

fn product_allowed_in_plugin(kind: ProductKind) -> bool {
    kind.is_library() || matches!(kind, ProductKind::Executable | ProductKind::Plugin)
}

fn check_plugin_dependencies(assembled: &Assembled) -> Result<(), PackageGraphError> {
    let lookup = Lookup::new(assembled);

    for package in &assembled.packages {
        for plugin in package.modules().iter().filter(|m| m.kind() == ModuleKind::Plugin) {
            for dependency in plugin.dependencies() {
                let unsupported = match &dependency.target {
                    DependencyTarget::Module(id) => lookup
                        .modules
                        .get(id)
                        .filter(|m| !module_allowed_in_plugin(m.kind()))
                        .map(|m| (m.name().to_string(), m.kind().to_string(), None)),
                    DependencyTarget::Product(id) => lookup
                        .products
                        .get(id)
                        .filter(|p| !product_allowed_in_plugin(p.kind()))
                        .map(|p| (p.name().to_string(), p.kind().to_string(), Some(p.package().to_string()))),
                };

                if let Some((name, kind, from)) = unsupported {
                    return Err(PackageGraphError::UnsupportedPluginDependency {
                        plugin: plugin.name().to_string(),
                        dependency: name,
                        dependency_kind: kind,
                        package: from,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Warn about dependencies of a root package that none of its modules use.
fn warn_unused_dependencies(assembled: &Assembled, sink: &dyn ObservabilitySink) {
    let packages: HashMap<_, _> = assembled
        .packages
        .iter()
        .map(|p| (p.identity(), p))
        .collect();

    for root in assembled.packages.iter().filter(|p| p.is_root()) {
        for dependency in root.dependencies() {
            let Some(package) = packages.get(dependency) else {
                continue;
            };
            let vends_tools = package
                .products()
                .iter()
                .any(|p| matches!(p.kind(), ProductKind::Executable | ProductKind::Plugin));
            if vends_tools {
                continue;
            }

            let used = root.modules().iter().any(|m| {
                m.dependencies()
                    .iter()
                    .filter_map(|d| d.as_product())
                    .any(|p| p.package == *dependency)
                    || m.prebuilt_libraries().iter().any(|l| l.identity == *dependency)
            });
            if !used {
                sink.emit(
                    Diagnostic::warning(format!(
                        "dependency '{}' is not used by any target",
                        dependency
                    ))
                    .with_package(root.identity().to_string()),
                );
            }
        }
    }
}
