//! Turns manifests into resolved packages, modules and products.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::core::artifact::{BinaryArtifactsMap, PrebuiltsMap};
use crate::core::condition::PlatformRequirement;
use crate::core::identity::{IdentityResolver, PackageIdentity};
use crate::core::manifest::{Manifest, ModuleDependencyDecl, ModuleDescription, ProductFilter};
use crate::core::module::{DependencyTarget, ModuleDependency, ModuleId, ModuleKind, ResolvedModule};
use crate::core::package::ResolvedPackage;
use crate::core::product::{ProductId, ProductKind, ResolvedProduct};
use crate::core::resources::ModuleSources;
use crate::core::traits::EnabledTraitsMap;
use crate::graph::errors::{PackageGraphError, ProductSuggestion};
use crate::graph::load::{Discovered, GraphOptions};
use crate::util::diagnostic::{Diagnostic, ObservabilitySink};
use crate::util::fs::FileSystem;
use crate::util::suggest::SimilarityMatcher;

/// Alias requests per product: module name -> requested aliases.
type AliasRequests = BTreeMap<ProductId, BTreeMap<String, BTreeSet<String>>>;

/// Packages produced by assembly, in discovery order.
#[derive(Debug)]
pub(crate) struct Assembled {
    pub packages: Vec<ResolvedPackage>,
    /// Products consumed with renamed modules.
    pub aliased_products: BTreeSet<ProductId>,
}

pub(crate) struct Assembler<'a> {
    pub manifests: &'a HashMap<PackageIdentity, Arc<Manifest>>,
    pub discovered: &'a Discovered,
    pub roots: &'a HashSet<PackageIdentity>,
    pub traits: &'a EnabledTraitsMap,
    pub options: &'a GraphOptions,
    pub binary_artifacts: &'a BinaryArtifactsMap,
    pub prebuilts: &'a PrebuiltsMap,
    pub resolver: &'a dyn IdentityResolver,
    pub fs: &'a dyn FileSystem,
    pub sink: &'a dyn ObservabilitySink,
    pub matcher: &'a dyn SimilarityMatcher,
}

struct Staged {
    identity: PackageIdentity,
    manifest: Arc<Manifest>,
    is_root: bool,
    traits: BTreeSet<String>,
    modules: Vec<ResolvedModule>,
}

impl Assembler<'_> {
    pub(crate) fn assemble(&self) -> Result<Assembled, PackageGraphError> {
        let mut aliases = AliasRequests::new();
        let mut staged = Vec::new();

        for &identity in &self.discovered.order {
            let Some(manifest) = self.manifests.get(&identity) else {
                continue;
            };
            let is_root = self.roots.contains(&identity);
            let traits = self.traits.get(identity);

            let mut modules = Vec::new();
            for description in &manifest.modules {
                if description.kind == ModuleKind::Test && !is_root {
                    continue;
                }
                modules.push(self.module(identity, manifest, description, &traits, &mut aliases)?);
            }

            staged.push(Staged {
                identity,
                manifest: Arc::clone(manifest),
                is_root,
                traits,
                modules,
            });
        }

        let mut packages = Vec::with_capacity(staged.len());
        for stage in staged {
            let modules: Vec<Arc<ResolvedModule>> = stage.modules.into_iter().map(Arc::new).collect();
            let products = self
                .products(stage.identity, &stage.manifest, stage.is_root, &modules, &aliases)?
                .into_iter()
                .map(Arc::new)
                .collect();
            tracing::debug!(
                "assembled `{}`: {} module(s), traits {:?}",
                stage.identity,
                modules.len(),
                stage.traits
            );

            packages.push(ResolvedPackage {
                identity: stage.identity,
                manifest: stage.manifest,
                is_root: stage.is_root,
                modules,
                products,
                dependencies: self
                    .discovered
                    .edges
                    .get(&stage.identity)
                    .cloned()
                    .unwrap_or_default(),
                enabled_traits: stage.traits,
                product_filter: self
                    .discovered
                    .filters
                    .get(&stage.identity)
                    .cloned()
                    .unwrap_or(ProductFilter::Everything),
            });
        }

        Ok(Assembled {
            packages,
            aliased_products: aliases.into_keys().collect(),
        })
    }

    fn module(
        &self,
        identity: PackageIdentity,
        manifest: &Manifest,
        description: &ModuleDescription,
        traits: &BTreeSet<String>,
        aliases: &mut AliasRequests,
    ) -> Result<ResolvedModule, PackageGraphError> {
        let path = match manifest.root_dir() {
            Some(root) => root.join(description.relative_path()),
            None => description.relative_path(),
        };

        let mut dependencies = Vec::new();
        let mut prebuilt_libraries = Vec::new();

        for decl in &description.dependencies {
            if !decl.is_enabled_by(traits) {
                tracing::debug!(
                    "`{}` in `{}`: dependency `{}` disabled by traits",
                    description.name,
                    identity,
                    decl.name()
                );
                continue;
            }
            let conditions = decl
                .condition()
                .map(|c| c.to_package_conditions())
                .unwrap_or_default();

            let target = match decl {
                ModuleDependencyDecl::Module { name, .. } => {
                    if manifest.module(name).is_none() {
                        let mut valid: Vec<String> = manifest
                            .modules
                            .iter()
                            .filter(|m| m.name != description.name)
                            .map(|m| m.name.clone())
                            .collect();
                        valid.sort();
                        return Err(PackageGraphError::UnknownModuleDependency {
                            module: description.name.clone(),
                            dependency: name.clone(),
                            valid,
                        });
                    }
                    Some(DependencyTarget::Module(ModuleId::new(identity, name)))
                }
                ModuleDependencyDecl::ByName { name, .. } if manifest.module(name).is_some() => {
                    Some(DependencyTarget::Module(ModuleId::new(identity, name)))
                }
                ModuleDependencyDecl::ByName { name, .. } => self
                    .resolve_product(identity, manifest, description, name, None)?
                    .map(DependencyTarget::Product),
                ModuleDependencyDecl::Product {
                    name,
                    package,
                    module_aliases,
                    ..
                } => {
                    let resolved =
                        self.resolve_product(identity, manifest, description, name, package.as_deref())?;
                    if let Some(product) = &resolved {
                        for (module, alias) in module_aliases {
                            aliases
                                .entry(product.clone())
                                .or_default()
                                .entry(module.clone())
                                .or_default()
                                .insert(alias.clone());
                        }
                    }
                    resolved.map(DependencyTarget::Product)
                }
            };

            let Some(target) = target else {
                continue;
            };

            if let DependencyTarget::Product(product) = &target {
                if matches!(description.kind, ModuleKind::Macro | ModuleKind::Test) {
                    let prebuilt = self
                        .prebuilts
                        .get(&product.package)
                        .and_then(|products| products.get(&product.name));
                    if let Some(library) = prebuilt {
                        tracing::debug!(
                            "`{}` uses prebuilt `{}` for product `{}`",
                            description.name,
                            library.library_name,
                            product
                        );
                        if !prebuilt_libraries.contains(library) {
                            prebuilt_libraries.push(library.clone());
                        }
                        continue;
                    }
                }
            }

            dependencies.push(ModuleDependency { target, conditions });
        }

        let binary_artifact = if description.kind == ModuleKind::Binary {
            let artifact = self
                .binary_artifacts
                .get(&identity)
                .and_then(|artifacts| artifacts.get(&description.name))
                .cloned();
            if artifact.is_none() {
                self.sink.emit(
                    Diagnostic::warning(format!(
                        "binary target '{}' has no artifact",
                        description.name
                    ))
                    .with_package(identity.to_string()),
                );
            }
            artifact
        } else {
            None
        };

        Ok(ResolvedModule {
            id: ModuleId::new(identity, &description.name),
            kind: description.kind,
            sources: self.sources(identity, &path),
            path,
            dependencies,
            platforms: self.platforms(manifest, description.kind == ModuleKind::Test),
            binary_artifact,
            prebuilt_libraries,
        })
    }

    /// Walk and classify the files of a module directory, if it exists.
    fn sources(&self, identity: PackageIdentity, path: &Path) -> ModuleSources {
        if !self.fs.is_dir(path) {
            return ModuleSources::default();
        }

        let files = match self.fs.walk_files(path) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("failed to list {}: {:#}", path.display(), e);
                return ModuleSources::default();
            }
        };

        let (sources, unhandled) = ModuleSources::classify(files, self.options.file_rules);
        if !unhandled.is_empty() {
            let diag = unhandled.iter().fold(
                Diagnostic::warning(format!(
                    "found {} file(s) which are unhandled; explicitly declare them as resources or exclude from the target",
                    unhandled.len()
                ))
                .with_package(identity.to_string()),
                |d, file| d.with_context(file.display().to_string()),
            );
            self.sink.emit(diag);
        }
        sources
    }

    /// Declared platforms, raised by the overrides for test entities.
    fn platforms(&self, manifest: &Manifest, is_test: bool) -> Vec<PlatformRequirement> {
        let mut platforms = manifest.platforms.clone();
        if !is_test {
            return platforms;
        }

        for (name, version) in &self.options.platform_overrides {
            match platforms
                .iter_mut()
                .find(|p| p.platform.eq_ignore_ascii_case(name))
            {
                Some(existing) => {
                    if *version > existing.version {
                        existing.version = version.clone();
                    }
                }
                None => platforms.push(PlatformRequirement::new(name.clone(), version.clone())),
            }
        }
        platforms
    }

    /// `name` as a product of `package`, if it exists there and is visible.
    fn product_in(&self, package: PackageIdentity, name: &str) -> Option<ProductId> {
        let manifest = self.manifests.get(&package)?;
        let product = manifest.product(name)?;
        if product.kind == ProductKind::Test && !self.roots.contains(&package) {
            return None;
        }
        Some(ProductId::new(package, name))
    }

    fn resolve_product(
        &self,
        identity: PackageIdentity,
        manifest: &Manifest,
        description: &ModuleDescription,
        name: &str,
        package: Option<&str>,
    ) -> Result<Option<ProductId>, PackageGraphError> {
        let loaded: &[PackageIdentity] = self
            .discovered
            .edges
            .get(&identity)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let same_package = || PackageGraphError::ProductDependencyNotFound {
            package: identity.to_string(),
            module: description.name.clone(),
            product: name.to_string(),
            dependency_package: None,
            in_same_package: true,
            suggestion: None,
        };
        let not_found = |dependency_package: Option<&str>, searched: Option<PackageIdentity>| {
            PackageGraphError::ProductDependencyNotFound {
                package: identity.to_string(),
                module: description.name.clone(),
                product: name.to_string(),
                dependency_package: dependency_package.map(str::to_string),
                in_same_package: false,
                suggestion: self.suggestion(name, identity, searched),
            }
        };

        if let Some(package) = package {
            let declared = manifest
                .dependencies
                .iter()
                .map(|d| d.identity(self.resolver))
                .zip(manifest.dependencies.iter())
                .find(|(id, d)| d.matches_package_name(package, *id));

            return match declared {
                None => {
                    let is_self = package.eq_ignore_ascii_case(&manifest.display_name)
                        || package.eq_ignore_ascii_case(identity.as_str());
                    if is_self && manifest.product(name).is_some() {
                        Err(same_package())
                    } else {
                        Err(not_found(Some(package), None))
                    }
                }
                Some((dependency, _)) if !loaded.contains(&dependency) => {
                    if !self.may_vend(identity, manifest, description, dependency, name) {
                        return Err(not_found(Some(package), Some(dependency)));
                    }
                    tracing::debug!(
                        "`{}` in `{}`: `{}` comes from `{}` which did not load",
                        description.name,
                        identity,
                        name,
                        dependency
                    );
                    Ok(None)
                }
                Some((dependency, _)) => match self.product_in(dependency, name) {
                    Some(product) => Ok(Some(product)),
                    None => Err(not_found(Some(package), Some(dependency))),
                },
            };
        }

        let candidates: Vec<ProductId> = loaded
            .iter()
            .filter_map(|dependency| self.product_in(*dependency, name))
            .collect();

        match candidates.as_slice() {
            [single] => Ok(Some(single.clone())),
            [] => {
                if manifest.product(name).is_some() {
                    return Err(same_package());
                }
                let unloaded = manifest
                    .dependencies
                    .iter()
                    .map(|d| d.identity(self.resolver))
                    .filter(|dependency| !loaded.contains(dependency))
                    .any(|dependency| self.may_vend(identity, manifest, description, dependency, name));
                if unloaded {
                    tracing::debug!(
                        "`{}` in `{}`: `{}` not found among loaded dependencies",
                        description.name,
                        identity,
                        name
                    );
                    return Ok(None);
                }
                Err(not_found(None, None))
            }
            many => {
                let mut candidates: Vec<String> = many.iter().map(|p| p.package.to_string()).collect();
                candidates.sort();
                Err(PackageGraphError::ProductDependencyMissingPackage {
                    product: name.to_string(),
                    module: description.name.clone(),
                    candidates,
                })
            }
        }
    }

    /// Whether `dependency`, which is not part of the graph, could provide
    /// `name` to `description`.
    ///
    /// A manifest that is present but was left out by filters or traits must
    /// declare the product. Without a manifest the reference is only excused
    /// when the dependency was required and failed to load, or when the
    /// requesting module is outside the package's product filter.
    fn may_vend(
        &self,
        identity: PackageIdentity,
        manifest: &Manifest,
        description: &ModuleDescription,
        dependency: PackageIdentity,
        name: &str,
    ) -> bool {
        if let Some(other) = self.manifests.get(&dependency) {
            return other.product(name).is_some();
        }
        let failed = self
            .discovered
            .unloaded
            .get(&identity)
            .is_some_and(|unloaded| unloaded.contains(&dependency));
        if failed {
            return true;
        }

        let filter = self
            .discovered
            .filters
            .get(&identity)
            .cloned()
            .unwrap_or(ProductFilter::Everything);
        !manifest
            .required_modules(&filter, &self.traits.get(identity))
            .iter()
            .any(|m| m.name == description.name)
    }

    /// "Did you mean" help for a product that was not found.
    fn suggestion(
        &self,
        name: &str,
        requester: PackageIdentity,
        searched: Option<PackageIdentity>,
    ) -> Option<ProductSuggestion> {
        let others = self
            .discovered
            .order
            .iter()
            .copied()
            .filter(|p| *p != requester && Some(*p) != searched);

        for other in others {
            if self.product_in(other, name).is_some() {
                return Some(ProductSuggestion::Qualified {
                    product: name.to_string(),
                    package: other.to_string(),
                });
            }
        }

        let mut names: Vec<&str> = Vec::new();
        for package in self.discovered.order.iter().copied() {
            let Some(manifest) = self.manifests.get(&package) else {
                continue;
            };
            for product in &manifest.products {
                if self.product_in(package, &product.name).is_some() && !names.contains(&product.name.as_str()) {
                    names.push(&product.name);
                }
            }
        }

        self.matcher
            .best_match(name, &names)
            .map(|similar| ProductSuggestion::SimilarName(similar.to_string()))
    }

    fn products(
        &self,
        identity: PackageIdentity,
        manifest: &Manifest,
        is_root: bool,
        modules: &[Arc<ResolvedModule>],
        aliases: &AliasRequests,
    ) -> Result<Vec<ResolvedProduct>, PackageGraphError> {
        let mut products = Vec::new();

        for description in &manifest.products {
            if description.kind == ProductKind::Test && !is_root {
                continue;
            }
            let id = ProductId::new(identity, &description.name);
            let members = description
                .modules
                .iter()
                .filter_map(|name| match modules.iter().find(|m| m.name() == name) {
                    Some(module) => Some(module.id().clone()),
                    None => {
                        tracing::warn!(
                            "product `{}` of `{}` names unknown module `{}`",
                            description.name,
                            identity,
                            name
                        );
                        None
                    }
                })
                .collect();
            let module_aliases = Self::aliases_for(&id, aliases)?;

            products.push(ResolvedProduct {
                id,
                kind: description.kind,
                modules: members,
                module_aliases,
                platforms: self.platforms(manifest, description.kind == ProductKind::Test),
                synthesized: false,
            });
        }

        if is_root {
            products.extend(self.synthesized_products(identity, manifest, modules));
        }

        Ok(products)
    }

    fn aliases_for(product: &ProductId, aliases: &AliasRequests) -> Result<BTreeMap<String, String>, PackageGraphError> {
        let mut resolved = BTreeMap::new();
        let Some(requests) = aliases.get(product) else {
            return Ok(resolved);
        };

        for (module, requested) in requests {
            let mut iter = requested.iter();
            match (iter.next(), iter.next()) {
                (Some(alias), None) => {
                    resolved.insert(module.clone(), alias.clone());
                }
                (Some(_), Some(_)) => {
                    return Err(PackageGraphError::MultipleModuleAliases {
                        module: module.clone(),
                        product: product.name.clone(),
                        package: product.package.to_string(),
                        aliases: requested.iter().cloned().collect(),
                    });
                }
                (None, _) => {}
            }
        }
        Ok(resolved)
    }

    /// Test and REPL products a root package gets without declaring them.
    fn synthesized_products(
        &self,
        identity: PackageIdentity,
        manifest: &Manifest,
        modules: &[Arc<ResolvedModule>],
    ) -> Vec<ResolvedProduct> {
        let mut products = Vec::new();
        let synthesize = |name: String, kind: ProductKind, members: Vec<ModuleId>| ResolvedProduct {
            id: ProductId::new(identity, name),
            kind,
            modules: members,
            module_aliases: BTreeMap::new(),
            platforms: self.platforms(manifest, kind == ProductKind::Test),
            synthesized: true,
        };

        let tests: Vec<&Arc<ResolvedModule>> = modules.iter().filter(|m| m.is_test()).collect();
        if self.options.create_multiple_test_products {
            for test in tests {
                if manifest.product(test.name()).is_none() {
                    products.push(synthesize(
                        test.name().to_string(),
                        ProductKind::Test,
                        vec![test.id().clone()],
                    ));
                }
            }
        } else if !tests.is_empty() {
            let name = format!("{}PackageTests", manifest.display_name);
            if manifest.product(&name).is_none() {
                let members = tests.iter().map(|m| m.id().clone()).collect();
                products.push(synthesize(name, ProductKind::Test, members));
            }
        }

        if self.options.create_repl_product {
            let libraries: Vec<ModuleId> = modules
                .iter()
                .filter(|m| m.kind() == ModuleKind::Library)
                .map(|m| m.id().clone())
                .collect();
            if !libraries.is_empty() {
                products.push(synthesize(
                    format!("{}__REPL", manifest.display_name),
                    ProductKind::DynamicLibrary,
                    libraries,
                ));
            }
        }

        products
    }
}
