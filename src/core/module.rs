//! Modules: the buildable units of a package.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::artifact::{BinaryArtifact, PrebuiltLibrary};
use crate::core::condition::{BuildEnvironment, PackageCondition, PlatformRequirement};
use crate::core::identity::PackageIdentity;
use crate::core::product::ProductId;
use crate::core::resources::ModuleSources;

/// Module type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    Library,
    Executable,
    Test,
    Plugin,
    Macro,
    SystemLibrary,
    Binary,
    Snippet,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Library => "library",
            ModuleKind::Executable => "executable",
            ModuleKind::Test => "test",
            ModuleKind::Plugin => "plugin",
            ModuleKind::Macro => "macro",
            ModuleKind::SystemLibrary => "system-library",
            ModuleKind::Binary => "binary",
            ModuleKind::Snippet => "snippet",
        }
    }

    /// Default directory holding the module's files, relative to the package.
    pub fn default_directory(&self) -> &'static str {
        match self {
            ModuleKind::Test => "Tests",
            ModuleKind::Plugin => "Plugins",
            _ => "Sources",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "library" => Ok(ModuleKind::Library),
            "executable" => Ok(ModuleKind::Executable),
            "test" => Ok(ModuleKind::Test),
            "plugin" => Ok(ModuleKind::Plugin),
            "macro" => Ok(ModuleKind::Macro),
            "system-library" => Ok(ModuleKind::SystemLibrary),
            "binary" => Ok(ModuleKind::Binary),
            "snippet" => Ok(ModuleKind::Snippet),
            _ => Err(format!("unknown module kind: {}", s)),
        }
    }
}

/// Graph-wide identity of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId {
    pub package: PackageIdentity,
    pub name: String,
}

impl ModuleId {
    pub fn new(package: PackageIdentity, name: impl Into<String>) -> Self {
        ModuleId {
            package,
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.name)
    }
}

/// What a resolved dependency edge points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyTarget {
    Module(ModuleId),
    Product(ProductId),
}

/// A resolved dependency edge of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDependency {
    pub target: DependencyTarget,
    pub conditions: Vec<PackageCondition>,
}

impl ModuleDependency {
    pub fn module(id: ModuleId, conditions: Vec<PackageCondition>) -> Self {
        ModuleDependency {
            target: DependencyTarget::Module(id),
            conditions,
        }
    }

    pub fn product(id: ProductId, conditions: Vec<PackageCondition>) -> Self {
        ModuleDependency {
            target: DependencyTarget::Product(id),
            conditions,
        }
    }

    /// Whether every condition holds for `env`.
    pub fn satisfies(&self, env: &BuildEnvironment) -> bool {
        self.conditions.iter().all(|c| c.satisfies(env))
    }

    pub fn as_module(&self) -> Option<&ModuleId> {
        match &self.target {
            DependencyTarget::Module(id) => Some(id),
            DependencyTarget::Product(_) => None,
        }
    }

    pub fn as_product(&self) -> Option<&ProductId> {
        match &self.target {
            DependencyTarget::Product(id) => Some(id),
            DependencyTarget::Module(_) => None,
        }
    }
}

/// A module after assembly.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedModule {
    pub(crate) id: ModuleId,
    pub(crate) kind: ModuleKind,
    pub(crate) path: PathBuf,
    pub(crate) dependencies: Vec<ModuleDependency>,
    pub(crate) platforms: Vec<PlatformRequirement>,
    #[serde(skip_serializing_if = "ModuleSources::is_empty")]
    pub(crate) sources: ModuleSources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) binary_artifact: Option<BinaryArtifact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) prebuilt_libraries: Vec<PrebuiltLibrary>,
}

impl ResolvedModule {
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn package(&self) -> PackageIdentity {
        self.id.package
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// All resolved edges, regardless of build environment.
    pub fn dependencies(&self) -> &[ModuleDependency] {
        &self.dependencies
    }

    /// Edges active in `env`.
    pub fn dependencies_satisfying<'a>(
        &'a self,
        env: &'a BuildEnvironment,
    ) -> impl Iterator<Item = &'a ModuleDependency> + 'a {
        self.dependencies.iter().filter(move |d| d.satisfies(env))
    }

    pub fn platforms(&self) -> &[PlatformRequirement] {
        &self.platforms
    }

    pub fn sources(&self) -> &ModuleSources {
        &self.sources
    }

    pub fn binary_artifact(&self) -> Option<&BinaryArtifact> {
        self.binary_artifact.as_ref()
    }

    pub fn prebuilt_libraries(&self) -> &[PrebuiltLibrary] {
        &self.prebuilt_libraries
    }

    pub fn is_test(&self) -> bool {
        self.kind == ModuleKind::Test
    }
}

impl fmt::Display for ResolvedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind)
    }
}
