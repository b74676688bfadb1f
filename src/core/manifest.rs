//! Package manifests as handed over by the loading subsystem.
//!
//! A [`Manifest`] is read-only input to graph construction. Besides the
//! declared data it knows how to answer two questions the loader asks while
//! walking the graph: which traits a request enables, and which of its
//! dependencies are required for a product filter.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::condition::{ModuleDependencyCondition, PlatformRequirement};
use crate::core::identity::{IdentityResolver, PackageIdentity, PackageKind};
use crate::core::module::ModuleKind;
use crate::core::product::ProductKind;
use crate::core::traits::{TraitConfiguration, TraitDescription, TraitError, DEFAULT_TRAIT};

/// Tools version from which package dependency cycles are tolerated.
pub const CYCLE_TOLERANT_TOOLS_VERSION: Version = Version::new(6, 0, 0);

fn default_tools_version() -> Version {
    CYCLE_TOLERANT_TOOLS_VERSION
}

/// A loaded package description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    pub display_name: String,
    pub kind: PackageKind,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default = "default_tools_version")]
    pub tools_version: Version,
    /// On-disk checkout, when it differs from the location in `kind`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub platforms: Vec<PlatformRequirement>,
    #[serde(default)]
    pub modules: Vec<ModuleDescription>,
    #[serde(default)]
    pub products: Vec<ProductDescription>,
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
    #[serde(default)]
    pub traits: Vec<TraitDescription>,
}

/// A module as declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescription {
    pub name: String,
    pub kind: ModuleKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub dependencies: Vec<ModuleDependencyDecl>,
}

impl ModuleDescription {
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        ModuleDescription {
            name: name.into(),
            kind,
            path: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dep: ModuleDependencyDecl) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Declared path, or the conventional `<Sources|Tests|Plugins>/<name>`.
    pub fn relative_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| Path::new(self.kind.default_directory()).join(&self.name))
    }
}

/// A module dependency as declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModuleDependencyDecl {
    /// A module of the same package.
    Module {
        name: String,
        #[serde(default)]
        condition: Option<ModuleDependencyCondition>,
    },
    /// A product, optionally qualified with the package providing it.
    Product {
        name: String,
        #[serde(default)]
        package: Option<String>,
        #[serde(default, rename = "module-aliases")]
        module_aliases: BTreeMap<String, String>,
        #[serde(default)]
        condition: Option<ModuleDependencyCondition>,
    },
    /// A module of the same package if one has this name, else a product.
    ByName {
        name: String,
        #[serde(default)]
        condition: Option<ModuleDependencyCondition>,
    },
}

impl ModuleDependencyDecl {
    pub fn module(name: impl Into<String>) -> Self {
        ModuleDependencyDecl::Module {
            name: name.into(),
            condition: None,
        }
    }

    pub fn product(name: impl Into<String>, package: Option<&str>) -> Self {
        ModuleDependencyDecl::Product {
            name: name.into(),
            package: package.map(str::to_string),
            module_aliases: BTreeMap::new(),
            condition: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        ModuleDependencyDecl::ByName {
            name: name.into(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, new: ModuleDependencyCondition) -> Self {
        match &mut self {
            ModuleDependencyDecl::Module { condition, .. }
            | ModuleDependencyDecl::Product { condition, .. }
            | ModuleDependencyDecl::ByName { condition, .. } => *condition = Some(new),
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            ModuleDependencyDecl::Module { name, .. }
            | ModuleDependencyDecl::Product { name, .. }
            | ModuleDependencyDecl::ByName { name, .. } => name,
        }
    }

    pub fn condition(&self) -> Option<&ModuleDependencyCondition> {
        match self {
            ModuleDependencyDecl::Module { condition, .. }
            | ModuleDependencyDecl::Product { condition, .. }
            | ModuleDependencyDecl::ByName { condition, .. } => condition.as_ref(),
        }
    }

    /// Whether the edge is active given the declaring package's traits.
    pub fn is_enabled_by(&self, traits: &BTreeSet<String>) -> bool {
        self.condition().map_or(true, |c| c.is_enabled_by(traits))
    }

    fn is_trait_guarded(&self) -> bool {
        self.condition().is_some_and(|c| c.is_trait_guarded())
    }
}

/// A product as declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescription {
    pub name: String,
    pub kind: ProductKind,
    pub modules: Vec<String>,
}

impl ProductDescription {
    pub fn new(
        name: impl Into<String>,
        kind: ProductKind,
        modules: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ProductDescription {
            name: name.into(),
            kind,
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }
}

/// A trait a dependency declaration enables on the dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTrait {
    pub name: String,
    /// Parent traits of which at least one must be enabled.
    #[serde(default)]
    pub condition: Option<BTreeSet<String>>,
}

impl DependencyTrait {
    pub fn new(name: impl Into<String>) -> Self {
        DependencyTrait {
            name: name.into(),
            condition: None,
        }
    }

    pub fn when(mut self, traits: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.condition = Some(traits.into_iter().map(Into::into).collect());
        self
    }
}

/// A package dependency as declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub kind: PackageKind,
    /// Explicit short name used by `.product(name:package:)` references.
    #[serde(default)]
    pub name: Option<String>,
    /// Traits to enable. `None` requests the dependency's defaults.
    #[serde(default)]
    pub traits: Option<Vec<DependencyTrait>>,
}

impl PackageDependency {
    pub fn new(kind: PackageKind) -> Self {
        PackageDependency {
            kind,
            name: None,
            traits: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_traits(mut self, traits: Vec<DependencyTrait>) -> Self {
        self.traits = Some(traits);
        self
    }

    pub fn identity(&self, resolver: &dyn IdentityResolver) -> PackageIdentity {
        resolver.resolve_identity(&self.kind)
    }

    pub fn location(&self) -> String {
        self.kind.location()
    }

    /// The name product references use to qualify this dependency.
    pub fn name_for_module_resolution(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let location = self.location();
        let trimmed = location.trim_end_matches(|c| c == '/' || c == '\\');
        let last = trimmed
            .rsplit(|c| c == '/' || c == '\\' || c == ':')
            .next()
            .unwrap_or(trimmed);
        last.strip_suffix(".git").unwrap_or(last).to_string()
    }

    /// Whether `package` (from `.product(package:)`) refers to this
    /// dependency.
    pub fn matches_package_name(&self, package: &str, identity: PackageIdentity) -> bool {
        self.name_for_module_resolution().eq_ignore_ascii_case(package)
            || identity.as_str().eq_ignore_ascii_case(package)
    }

    /// Traits this declaration enables given the parent's enabled traits.
    ///
    /// `None` means no traits were declared, i.e. the defaults apply.
    pub fn explicitly_enabled_traits(
        &self,
        parent_traits: &BTreeSet<String>,
    ) -> Option<BTreeSet<String>> {
        self.traits.as_ref().map(|traits| {
            traits
                .iter()
                .filter(|t| {
                    t.condition
                        .as_ref()
                        .map_or(true, |c| c.iter().any(|p| parent_traits.contains(p)))
                })
                .map(|t| t.name.clone())
                .collect()
        })
    }
}

/// Which products of a package are needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductFilter {
    Everything,
    Specific(BTreeSet<String>),
}

impl Default for ProductFilter {
    fn default() -> Self {
        ProductFilter::Specific(BTreeSet::new())
    }
}

impl ProductFilter {
    pub fn specific(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ProductFilter::Specific(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, product: &str) -> bool {
        match self {
            ProductFilter::Everything => true,
            ProductFilter::Specific(names) => names.contains(product),
        }
    }

    /// Union `other` into `self`; returns whether `self` grew.
    pub fn merge(&mut self, other: &ProductFilter) -> bool {
        match (&mut *self, other) {
            (ProductFilter::Everything, _) => false,
            (this, ProductFilter::Everything) => {
                *this = ProductFilter::Everything;
                true
            }
            (ProductFilter::Specific(mine), ProductFilter::Specific(theirs)) => {
                let before = mine.len();
                mine.extend(theirs.iter().cloned());
                mine.len() != before
            }
        }
    }
}

impl fmt::Display for ProductFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductFilter::Everything => write!(f, "everything"),
            ProductFilter::Specific(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}

impl Manifest {
    pub fn new(display_name: impl Into<String>, kind: PackageKind) -> Self {
        Manifest {
            display_name: display_name.into(),
            kind,
            version: None,
            tools_version: default_tools_version(),
            path: None,
            platforms: Vec::new(),
            modules: Vec::new(),
            products: Vec::new(),
            dependencies: Vec::new(),
            traits: Vec::new(),
        }
    }

    pub fn with_module(mut self, module: ModuleDescription) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_product(mut self, product: ProductDescription) -> Self {
        self.products.push(product);
        self
    }

    pub fn with_dependency(mut self, dep: PackageDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_trait(mut self, description: TraitDescription) -> Self {
        self.traits.push(description);
        self
    }

    pub fn with_platform(mut self, platform: PlatformRequirement) -> Self {
        self.platforms.push(platform);
        self
    }

    pub fn with_tools_version(mut self, version: Version) -> Self {
        self.tools_version = version;
        self
    }

    pub fn is_root(&self) -> bool {
        self.kind.is_root()
    }

    /// Directory the module paths are relative to, if on disk.
    pub fn root_dir(&self) -> Option<&Path> {
        self.path.as_deref().or_else(|| self.kind.local_path())
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDescription> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn product(&self, name: &str) -> Option<&ProductDescription> {
        self.products.iter().find(|p| p.name == name)
    }

    fn declared_traits(&self) -> impl Iterator<Item = &TraitDescription> {
        self.traits.iter().filter(|t| !t.is_default())
    }

    fn trait_description(&self, name: &str) -> Option<&TraitDescription> {
        self.traits.iter().find(|t| t.name == name)
    }

    /// The trait request a root configuration makes of this package.
    pub fn requested_traits(&self, config: &TraitConfiguration) -> BTreeSet<String> {
        match config {
            TraitConfiguration::Default => [DEFAULT_TRAIT.to_string()].into(),
            TraitConfiguration::Explicit(traits) => traits.clone(),
            TraitConfiguration::All => self.declared_traits().map(|t| t.name.clone()).collect(),
        }
    }

    /// Expand a trait request into the concrete enabled set.
    ///
    /// `default` stands for the traits listed by this package's `default`
    /// trait; implied traits are enabled transitively.
    pub fn enabled_traits(&self, requested: &BTreeSet<String>) -> Result<BTreeSet<String>, TraitError> {
        let available: Vec<String> = self.declared_traits().map(|t| t.name.clone()).collect();

        if available.is_empty() {
            if requested.iter().any(|t| t != DEFAULT_TRAIT) {
                return Err(TraitError::TraitsNotSupported {
                    package: self.display_name.clone(),
                });
            }
            return Ok(BTreeSet::new());
        }

        let invalid = |name: &str| TraitError::InvalidTrait {
            package: self.display_name.clone(),
            trait_name: name.to_string(),
            available: available.clone(),
        };

        let mut pending: Vec<String> = Vec::new();
        for name in requested {
            if name == DEFAULT_TRAIT {
                if let Some(default) = self.trait_description(DEFAULT_TRAIT) {
                    pending.extend(default.enabled_traits.iter().cloned());
                }
            } else {
                pending.push(name.clone());
            }
        }

        let mut enabled = BTreeSet::new();
        while let Some(name) = pending.pop() {
            let description = self
                .trait_description(&name)
                .filter(|t| !t.is_default())
                .ok_or_else(|| invalid(&name))?;
            if enabled.insert(name) {
                pending.extend(description.enabled_traits.iter().cloned());
            }
        }

        Ok(enabled)
    }

    /// Modules needed to build the products in `filter`, closed over
    /// same-package module dependencies active under `traits`.
    pub(crate) fn required_modules(&self, filter: &ProductFilter, traits: &BTreeSet<String>) -> Vec<&ModuleDescription> {
        let ProductFilter::Specific(products) = filter else {
            return self.modules.iter().collect();
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = self
            .products
            .iter()
            .filter(|p| products.contains(&p.name))
            .flat_map(|p| p.modules.iter().map(String::as_str))
            .collect();
        let mut required = Vec::new();

        while let Some(name) = stack.pop() {
            if !seen.insert(name) {
                continue;
            }
            let Some(module) = self.module(name) else {
                continue;
            };
            required.push(module);
            for decl in module.dependencies.iter().filter(|d| d.is_enabled_by(traits)) {
                match decl {
                    ModuleDependencyDecl::Module { name, .. } | ModuleDependencyDecl::ByName { name, .. } => {
                        stack.push(name)
                    }
                    ModuleDependencyDecl::Product { .. } => {}
                }
            }
        }

        required
    }

    /// Index of the declared dependency a product reference points at.
    ///
    /// Qualified references match by package name; unqualified ones match a
    /// dependency whose name equals the product name.
    fn dependency_index_for(&self, decl: &ModuleDependencyDecl, resolver: &dyn IdentityResolver) -> Option<usize> {
        let (name, package) = match decl {
            ModuleDependencyDecl::Product { name, package, .. } => (name.as_str(), package.as_deref()),
            ModuleDependencyDecl::ByName { name, .. } if self.module(name).is_none() => (name.as_str(), None),
            _ => return None,
        };
        let wanted = package.unwrap_or(name);
        self.dependencies
            .iter()
            .position(|d| d.matches_package_name(wanted, d.identity(resolver)))
    }

    /// Dependencies needed for `filter`, each with the products used from it.
    ///
    /// With [`ProductFilter::Everything`] every declared dependency is needed
    /// unless all of its usages are disabled by traits. With a specific filter
    /// only dependencies referenced from the required modules are.
    pub fn dependencies_required(
        &self,
        filter: &ProductFilter,
        traits: &BTreeSet<String>,
        resolver: &dyn IdentityResolver,
    ) -> Vec<(&PackageDependency, ProductFilter)> {
        let modules = self.required_modules(filter, traits);
        let mut used: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
        let mut disabled_only: BTreeSet<usize> = BTreeSet::new();
        let mut unmatched: BTreeSet<String> = BTreeSet::new();

        for module in &modules {
            for decl in &module.dependencies {
                let index = self.dependency_index_for(decl, resolver);
                if !decl.is_enabled_by(traits) {
                    if let Some(index) = index {
                        if !used.contains_key(&index) {
                            disabled_only.insert(index);
                        }
                    }
                    continue;
                }
                match index {
                    Some(index) => {
                        disabled_only.remove(&index);
                        used.entry(index).or_default().insert(decl.name().to_string());
                    }
                    None => {
                        if matches!(decl, ModuleDependencyDecl::Product { package: None, .. })
                            || matches!(decl, ModuleDependencyDecl::ByName { name, .. } if self.module(name).is_none())
                        {
                            unmatched.insert(decl.name().to_string());
                        }
                    }
                }
            }
        }

        self.dependencies
            .iter()
            .enumerate()
            .filter_map(|(index, dep)| {
                let mut products = used.get(&index).cloned().unwrap_or_default();
                products.extend(unmatched.iter().cloned());
                match filter {
                    ProductFilter::Everything => {
                        if disabled_only.contains(&index) {
                            None
                        } else {
                            Some((dep, ProductFilter::Everything))
                        }
                    }
                    ProductFilter::Specific(_) => {
                        if products.is_empty() {
                            None
                        } else {
                            Some((dep, ProductFilter::Specific(products)))
                        }
                    }
                }
            })
            .collect()
    }

    /// Dependencies only reached through trait-guarded edges whose traits are
    /// enabled by `traits`.
    pub fn dependencies_trait_guarded(
        &self,
        traits: &BTreeSet<String>,
        resolver: &dyn IdentityResolver,
    ) -> Vec<&PackageDependency> {
        let mut guarded: BTreeMap<usize, bool> = BTreeMap::new();
        for decl in self.modules.iter().flat_map(|m| m.dependencies.iter()) {
            let Some(index) = self.dependency_index_for(decl, resolver) else {
                continue;
            };
            let entry = guarded.entry(index).or_insert(true);
            if !decl.is_trait_guarded() {
                *entry = false;
            }
        }

        guarded
            .into_iter()
            .filter(|(_, only_guarded)| *only_guarded)
            .filter(|(index, _)| {
                self.modules
                    .iter()
                    .flat_map(|m| m.dependencies.iter())
                    .filter(|d| self.dependency_index_for(d, resolver) == Some(*index))
                    .any(|d| d.is_enabled_by(traits))
            })
            .filter_map(|(index, _)| self.dependencies.get(index))
            .collect()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} v{}", self.display_name, version),
            None => write!(f, "{}", self.display_name),
        }
    }
}
