//! Graph loading entry point and package discovery.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::core::artifact::{BinaryArtifactsMap, PrebuiltsMap};
use crate::core::condition::PlatformVersion;
use crate::core::identity::{CanonicalPackageLocation, IdentityResolver, PackageIdentity, PackageReference};
use crate::core::manifest::{Manifest, PackageDependency, ProductFilter, CYCLE_TOLERANT_TOOLS_VERSION};
use crate::core::resources::FileRuleSet;
use crate::core::traits::{EnabledTraitsMap, TraitConfiguration};
use crate::graph::assemble::Assembler;
use crate::graph::errors::{ModulesGraphError, PackageGraphError};
use crate::graph::topo::{find_cycle, topological_sort, GraphError};
use crate::graph::traits::TraitResolver;
use crate::graph::{reachability, validate, ModulesGraph};
use crate::util::diagnostic::ObservabilitySink;
use crate::util::fs::FileSystem;
use crate::util::suggest::{LevenshteinMatcher, SimilarityMatcher};

/// Knobs for graph construction.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Products of the root packages to build.
    pub product_filter: ProductFilter,
    /// One test product per test module instead of `<Name>PackageTests`.
    pub create_multiple_test_products: bool,
    /// Synthesize `<Name>__REPL` from the root's library modules.
    pub create_repl_product: bool,
    pub file_rules: FileRuleSet,
    /// Minimum deployment targets for test modules and products.
    pub platform_overrides: BTreeMap<String, PlatformVersion>,
    pub traits: TraitConfiguration,
}

impl Default for GraphOptions {
    fn default() -> Self {
        GraphOptions {
            product_filter: ProductFilter::Everything,
            create_multiple_test_products: false,
            create_repl_product: false,
            file_rules: FileRuleSet::Standard,
            platform_overrides: BTreeMap::new(),
            traits: TraitConfiguration::Default,
        }
    }
}

impl GraphOptions {
    pub fn with_product_filter(mut self, filter: ProductFilter) -> Self {
        self.product_filter = filter;
        self
    }

    pub fn with_traits(mut self, traits: TraitConfiguration) -> Self {
        self.traits = traits;
        self
    }

    pub fn with_multiple_test_products(mut self, enabled: bool) -> Self {
        self.create_multiple_test_products = enabled;
        self
    }

    pub fn with_repl_product(mut self, enabled: bool) -> Self {
        self.create_repl_product = enabled;
        self
    }

    pub fn with_file_rules(mut self, rules: FileRuleSet) -> Self {
        self.file_rules = rules;
        self
    }

    pub fn with_platform_override(mut self, platform: impl Into<String>, version: PlatformVersion) -> Self {
        self.platform_overrides.insert(platform.into(), version);
        self
    }
}

/// Builds a [`ModulesGraph`] from loaded manifests.
///
/// # Example
///
/// ```no_run
/// use harbour_graph::core::DefaultIdentityResolver;
/// use harbour_graph::graph::GraphLoader;
/// use harbour_graph::util::{LocalFileSystem, TracingSink};
///
/// let resolver = DefaultIdentityResolver::new();
/// let graph = GraphLoader::new(&resolver, &LocalFileSystem, &TracingSink)
///     .load(&[])
///     .unwrap();
/// assert!(graph.packages().is_empty());
/// ```
pub struct GraphLoader<'a> {
    resolver: &'a dyn IdentityResolver,
    fs: &'a dyn FileSystem,
    sink: &'a dyn ObservabilitySink,
    options: GraphOptions,
    binary_artifacts: BinaryArtifactsMap,
    prebuilts: PrebuiltsMap,
    root_dependencies: Vec<PackageDependency>,
    matcher: Box<dyn SimilarityMatcher + 'a>,
}

impl<'a> GraphLoader<'a> {
    pub fn new(
        resolver: &'a dyn IdentityResolver,
        fs: &'a dyn FileSystem,
        sink: &'a dyn ObservabilitySink,
    ) -> Self {
        GraphLoader {
            resolver,
            fs,
            sink,
            options: GraphOptions::default(),
            binary_artifacts: BinaryArtifactsMap::new(),
            prebuilts: PrebuiltsMap::new(),
            root_dependencies: Vec::new(),
            matcher: Box::new(LevenshteinMatcher),
        }
    }

    pub fn with_options(mut self, options: GraphOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_binary_artifacts(mut self, artifacts: BinaryArtifactsMap) -> Self {
        self.binary_artifacts = artifacts;
        self
    }

    pub fn with_prebuilts(mut self, prebuilts: PrebuiltsMap) -> Self {
        self.prebuilts = prebuilts;
        self
    }

    /// Packages to treat as inputs alongside the roots.
    pub fn with_root_dependencies(mut self, dependencies: Vec<PackageDependency>) -> Self {
        self.root_dependencies = dependencies;
        self
    }

    pub fn with_similarity_matcher(mut self, matcher: impl SimilarityMatcher + 'a) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Build, validate and return the graph.
    ///
    /// Manifests whose kind is root are the root packages; the rest are
    /// the dependency manifests that loaded successfully.
    pub fn load(&self, manifests: &[Manifest]) -> Result<ModulesGraph, ModulesGraphError> {
        let mut index: HashMap<PackageIdentity, Arc<Manifest>> = HashMap::new();
        let mut roots: Vec<PackageIdentity> = Vec::new();
        for manifest in manifests {
            let identity = self.resolver.resolve_identity(&manifest.kind);
            if index.contains_key(&identity) {
                tracing::debug!("ignoring second manifest for `{}`", identity);
                continue;
            }
            if manifest.is_root() {
                roots.push(identity);
            }
            index.insert(identity, Arc::new(manifest.clone()));
        }
        tracing::info!("loading package graph for {} root package(s)", roots.len());

        let traits = TraitResolver::new(&index, self.resolver).resolve(
            &roots,
            &self.root_dependencies,
            &self.options.traits,
            &self.options.product_filter,
        )?;

        let discovered = Discovery::new(&index, &roots, &traits, self.resolver)
            .run(&self.root_dependencies, &self.options.product_filter)?;
        tracing::debug!("discovered {} package(s)", discovered.order.len());

        check_package_cycles(&index, &roots, &discovered)?;

        let assembled = Assembler {
            manifests: &index,
            discovered: &discovered,
            roots: &roots.iter().copied().collect(),
            traits: &traits,
            options: &self.options,
            binary_artifacts: &self.binary_artifacts,
            prebuilts: &self.prebuilts,
            resolver: self.resolver,
            fs: self.fs,
            sink: self.sink,
            matcher: self.matcher.as_ref(),
        }
        .assemble()?;

        validate::validate(&assembled, self.sink)?;

        let mut inputs: Vec<PackageIdentity> = roots.clone();
        for id in &discovered.root_dependencies {
            if !inputs.contains(id) {
                inputs.push(*id);
            }
        }

        let graph = reachability::build_graph(
            assembled,
            &roots,
            &inputs,
            discovered.required,
            self.binary_artifacts.clone(),
            traits,
        )?;
        tracing::info!(
            "package graph loaded: {} package(s), {} module(s), {} reachable",
            graph.packages().len(),
            graph.all_modules().len(),
            graph.reachable_modules().len()
        );
        Ok(graph)
    }
}

/// Result of walking declared dependencies from the roots.
#[derive(Debug, Default)]
pub(crate) struct Discovered {
    /// Packages with a manifest, in discovery order, roots first.
    pub order: Vec<PackageIdentity>,
    pub filters: HashMap<PackageIdentity, ProductFilter>,
    /// Loaded package dependencies per package.
    pub edges: HashMap<PackageIdentity, Vec<PackageIdentity>>,
    /// Required dependencies whose manifest failed to load, per package.
    pub unloaded: HashMap<PackageIdentity, Vec<PackageIdentity>>,
    /// Every non-root package reference, loaded or not.
    pub required: Vec<PackageReference>,
    pub root_dependencies: Vec<PackageIdentity>,
}

struct Declaration {
    canonical: CanonicalPackageLocation,
    location: String,
    declared_by: Option<PackageIdentity>,
}

struct Discovery<'a> {
    manifests: &'a HashMap<PackageIdentity, Arc<Manifest>>,
    roots: &'a [PackageIdentity],
    traits: &'a EnabledTraitsMap,
    resolver: &'a dyn IdentityResolver,
    declarations: HashMap<PackageIdentity, Declaration>,
    names: HashMap<String, (CanonicalPackageLocation, String)>,
    parents: HashMap<PackageIdentity, PackageIdentity>,
    queue: VecDeque<PackageIdentity>,
    out: Discovered,
}

impl<'a> Discovery<'a> {
    fn new(
        manifests: &'a HashMap<PackageIdentity, Arc<Manifest>>,
        roots: &'a [PackageIdentity],
        traits: &'a EnabledTraitsMap,
        resolver: &'a dyn IdentityResolver,
    ) -> Self {
        Discovery {
            manifests,
            roots,
            traits,
            resolver,
            declarations: HashMap::new(),
            names: HashMap::new(),
            parents: HashMap::new(),
            queue: VecDeque::new(),
            out: Discovered::default(),
        }
    }

    fn run(
        mut self,
        root_dependencies: &[PackageDependency],
        root_filter: &ProductFilter,
    ) -> Result<Discovered, PackageGraphError> {
        for &root in self.roots {
            if let Some(manifest) = self.manifests.get(&root) {
                self.declarations.insert(
                    root,
                    Declaration {
                        canonical: manifest.kind.canonical_location(),
                        location: manifest.kind.location(),
                        declared_by: None,
                    },
                );
            }
            self.out.filters.insert(root, root_filter.clone());
            self.out.order.push(root);
            self.queue.push_back(root);
        }

        for dep in root_dependencies {
            let id = self.declare(None, dep, ProductFilter::Everything)?;
            if !self.out.root_dependencies.contains(&id) {
                self.out.root_dependencies.push(id);
            }
        }

        while let Some(id) = self.queue.pop_front() {
            let Some(manifest) = self.manifests.get(&id).cloned() else {
                continue;
            };
            let filter = self.out.filters.get(&id).cloned().unwrap_or(ProductFilter::Everything);
            let traits = self.traits.get(id);
            tracing::debug!("visiting `{}` for products {}", id, filter);

            for (dep, dep_filter) in manifest.dependencies_required(&filter, &traits, self.resolver) {
                self.declare(Some(id), dep, dep_filter)?;
            }
        }

        Ok(self.out)
    }

    fn is_root(&self, id: PackageIdentity) -> bool {
        self.roots.contains(&id)
    }

    /// Chain of identities from an input package down to `id`.
    fn chain_to(&self, id: PackageIdentity) -> Vec<String> {
        let mut chain = vec![id.to_string()];
        let mut current = id;
        let mut seen = HashSet::from([id]);
        while let Some(&parent) = self.parents.get(&current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.to_string());
            current = parent;
        }
        chain.reverse();
        chain
    }

    fn declare(
        &mut self,
        parent: Option<PackageIdentity>,
        dep: &PackageDependency,
        filter: ProductFilter,
    ) -> Result<PackageIdentity, PackageGraphError> {
        let id = dep.identity(self.resolver);
        let canonical = dep.kind.canonical_location();
        let parent_label = parent.map_or_else(|| "root".to_string(), |p| p.to_string());

        if let Some(existing) = self.declarations.get(&id) {
            if existing.canonical != canonical && !self.is_root(id) {
                let chains = match (existing.declared_by, parent) {
                    (Some(first), Some(second)) => {
                        let mut a = self.chain_to(first);
                        a.push(id.to_string());
                        let mut b = self.chain_to(second);
                        b.push(id.to_string());
                        Some((a, b))
                    }
                    _ => None,
                };
                return Err(PackageGraphError::IdentityConflict {
                    package: parent_label,
                    location: dep.location(),
                    other_location: existing.location.clone(),
                    identity: id,
                    chains,
                });
            }
        }

        if let Some(name) = &dep.name {
            let key = name.to_lowercase();
            match self.names.get(&key) {
                Some((other, other_location)) if *other != canonical => {
                    return Err(PackageGraphError::NameConflict {
                        package: parent_label,
                        location: dep.location(),
                        other_location: other_location.clone(),
                        name: name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.names.insert(key, (canonical.clone(), dep.location()));
                }
            }
        }

        if self.is_root(id) {
            tracing::debug!("`{}` is overridden by a root package", id);
        } else {
            self.declarations.entry(id).or_insert_with(|| Declaration {
                canonical,
                location: dep.location(),
                declared_by: parent,
            });
            if !self.out.required.iter().any(|r| r.identity == id) {
                self.out.required.push(PackageReference {
                    identity: id,
                    kind: dep.kind.clone(),
                });
            }
        }

        let loaded = self.manifests.contains_key(&id);
        if let Some(parent) = parent {
            let edges = if loaded {
                self.out.edges.entry(parent).or_default()
            } else {
                self.out.unloaded.entry(parent).or_default()
            };
            if !edges.contains(&id) {
                edges.push(id);
            }
        }

        if !loaded {
            tracing::debug!("`{}` has no loaded manifest", id);
            return Ok(id);
        }

        match self.out.filters.get_mut(&id) {
            Some(existing) => {
                if existing.merge(&filter) {
                    self.queue.push_back(id);
                }
            }
            None => {
                self.out.filters.insert(id, filter);
                self.out.order.push(id);
                if let Some(parent) = parent {
                    self.parents.insert(id, parent);
                }
                self.queue.push_back(id);
            }
        }

        Ok(id)
    }
}

/// Reject package cycles unless every package on the cycle allows them.
fn check_package_cycles(
    manifests: &HashMap<PackageIdentity, Arc<Manifest>>,
    roots: &[PackageIdentity],
    discovered: &Discovered,
) -> Result<(), ModulesGraphError> {
    let inputs: Vec<PackageIdentity> = roots
        .iter()
        .chain(discovered.root_dependencies.iter())
        .copied()
        .collect();
    let successors = |id: &PackageIdentity| discovered.edges.get(id).cloned().unwrap_or_default();

    if topological_sort(inputs.iter().copied(), successors).is_ok() {
        return Ok(());
    }

    let Some(found) = find_cycle(inputs.iter().copied(), successors) else {
        return Err(GraphError::UnexpectedCycle.into());
    };

    let tolerant = found.cycle.iter().all(|id| {
        manifests
            .get(id)
            .is_some_and(|m| m.tools_version >= CYCLE_TOLERANT_TOOLS_VERSION)
    });
    if tolerant {
        tracing::debug!("allowing package cycle {:?}", found.cycle);
        return Ok(());
    }

    let name = |id: &PackageIdentity| {
        manifests
            .get(id)
            .map_or_else(|| id.to_string(), |m| m.display_name.clone())
    };
    Err(PackageGraphError::DependencyCycleDetected {
        path: found.path.iter().map(name).collect(),
        cycle: found.cycle.iter().map(name).collect(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    use semver::Version;

    use crate::core::identity::{DefaultIdentityResolver, PackageKind};
    use crate::core::manifest::{ModuleDependencyDecl, ProductDescription};
    use crate::core::module::ModuleKind;
    use crate::core::product::ProductKind;
    use crate::test_support::{self, depends_on, library_package, module, package, root};
    use crate::util::diagnostic::CollectingSink;
    use crate::util::fs::InMemoryFileSystem;

    fn id(name: &str) -> PackageIdentity {
        PackageIdentity::plain(name)
    }

    fn uses(name: &str, products: &[&str]) -> Manifest {
        let mut main = module(name, ModuleKind::Executable);
        for product in products {
            main = main.with_dependency(ModuleDependencyDecl::product(*product, Some(*product)));
        }
        let mut manifest = root(name)
            .with_module(main)
            .with_product(ProductDescription::new(name, ProductKind::Executable, [name]));
        for product in products {
            manifest = manifest.with_dependency(depends_on(product));
        }
        manifest
    }

    fn remote(url: &str) -> PackageDependency {
        PackageDependency::new(PackageKind::RemoteSourceControl(url.parse().unwrap()))
    }

    #[test]
    fn test_identity_conflict_reports_chains() {
        let manifests = vec![
            uses("App", &["Left", "Right"]),
            library_package("Left").with_dependency(remote("https://example.com/a/log.git")),
            library_package("Right").with_dependency(remote("https://example.com/b/log.git")),
        ];
        let err = test_support::package_error(test_support::load(&manifests));

        assert_eq!(
            err.to_string(),
            "'right' dependency on 'https://example.com/b/log.git' conflicts with dependency on \
             'https://example.com/a/log.git' which has the same identity 'log'. The dependencies are \
             introduced through the following chains: (A) app -> left -> log (B) app -> right -> log"
        );
    }

    #[test]
    fn test_same_location_in_different_spelling_is_not_a_conflict() {
        let manifests = vec![
            uses("App", &["Left", "Right"]),
            library_package("Left").with_dependency(remote("https://example.com/a/log.git")),
            library_package("Right").with_dependency(remote("https://Example.com/a/log")),
        ];
        assert!(test_support::load(&manifests).is_ok());
    }

    #[test]
    fn test_root_overrides_dependency_identity() {
        // A local root may stand in for a remote package of the same identity.
        let manifests = vec![
            uses("App", &["Kit"]),
            root("Kit")
                .with_module(module("Kit", ModuleKind::Library))
                .with_product(ProductDescription::new("Kit", ProductKind::Library, ["Kit"])),
        ];
        let graph = test_support::load(&manifests).unwrap();

        assert_eq!(graph.root_packages().len(), 2);
        assert!(graph.required_dependencies().is_empty());
    }

    #[test]
    fn test_name_conflict() {
        let manifests = vec![
            uses("App", &["Left", "Right"]),
            library_package("Left").with_dependency(remote("https://example.com/a/log.git").with_name("Logging")),
            library_package("Right").with_dependency(remote("https://example.com/b/logging.git").with_name("logging")),
        ];
        let err = test_support::package_error(test_support::load(&manifests));

        assert!(matches!(err, PackageGraphError::NameConflict { ref name, .. } if name == "logging"));
    }

    #[test]
    fn test_package_cycle_requires_tools_version() {
        let cyclic = |version: Version| {
            vec![
                uses("App", &["Ping"]),
                library_package("Ping")
                    .with_dependency(depends_on("Pong"))
                    .with_tools_version(version.clone()),
                library_package("Pong")
                    .with_dependency(depends_on("Ping"))
                    .with_tools_version(version),
            ]
        };

        let err = test_support::package_error(test_support::load(&cyclic(Version::new(5, 9, 0))));
        assert_eq!(
            err.to_string(),
            "cyclic dependency between packages App -> Ping -> Pong -> Ping requires tools-version 6.0 or later"
        );

        assert!(test_support::load(&cyclic(Version::new(6, 0, 0))).is_ok());
    }

    #[test]
    fn test_specific_filter_loads_only_needed_packages() {
        let manifests = vec![
            root("App")
                .with_dependency(depends_on("Kit"))
                .with_dependency(depends_on("Extra"))
                .with_module(
                    module("App", ModuleKind::Executable)
                        .with_dependency(ModuleDependencyDecl::product("Kit", Some("Kit"))),
                )
                .with_module(
                    module("Tool", ModuleKind::Executable)
                        .with_dependency(ModuleDependencyDecl::product("Extra", Some("Extra"))),
                )
                .with_product(ProductDescription::new("App", ProductKind::Executable, ["App"]))
                .with_product(ProductDescription::new("Tool", ProductKind::Executable, ["Tool"])),
            library_package("Kit"),
            library_package("Extra"),
        ];
        let options = GraphOptions::default().with_product_filter(ProductFilter::specific(["App"]));
        let (graph, _) = test_support::load_with(&manifests, options);
        let graph = graph.unwrap();

        assert!(graph.package(id("kit")).is_some());
        assert!(graph.package(id("extra")).is_none());
        assert_eq!(
            graph.package(id("kit")).unwrap().product_filter(),
            &ProductFilter::specific(["Kit"])
        );
    }

    #[test]
    fn test_root_dependencies_are_inputs() {
        let manifests = vec![uses("App", &[]), library_package("Tools")];
        let resolver = DefaultIdentityResolver::new();
        let fs = InMemoryFileSystem::new();
        let sink = CollectingSink::new();
        let graph = GraphLoader::new(&resolver, &fs, &sink)
            .with_root_dependencies(vec![depends_on("Tools")])
            .load(&manifests)
            .unwrap();

        assert_eq!(graph.input_packages(), &[id("app"), id("tools")]);
        assert!(graph.reachable_modules().contains(&crate::core::module::ModuleId::new(id("tools"), "Tools")));
        assert!(!graph.is_root_package(id("tools")));
    }

    #[test]
    fn test_trait_errors_abort_loading() {
        let options = GraphOptions::default()
            .with_traits(crate::core::traits::TraitConfiguration::explicit(["Fast"]));
        let (result, _) = test_support::load_with(&[uses("App", &[])], options);

        assert_eq!(
            test_support::package_error(result).to_string(),
            "Package 'App' does not have any available traits defined."
        );
    }

    #[test]
    fn test_duplicate_manifest_is_ignored() {
        let manifests = vec![uses("App", &["Kit"]), library_package("Kit"), package("Kit")];
        let graph = test_support::load(&manifests).unwrap();

        assert_eq!(graph.package(id("kit")).unwrap().products().len(), 1);
    }
}
