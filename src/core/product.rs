//! Products: named artifacts composed of modules.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::condition::PlatformRequirement;
use crate::core::identity::PackageIdentity;
use crate::core::module::ModuleId;

/// Product type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductKind {
    Library,
    StaticLibrary,
    DynamicLibrary,
    Executable,
    Plugin,
    Test,
    Macro,
    Snippet,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Library => "library",
            ProductKind::StaticLibrary => "static-library",
            ProductKind::DynamicLibrary => "dynamic-library",
            ProductKind::Executable => "executable",
            ProductKind::Plugin => "plugin",
            ProductKind::Test => "test",
            ProductKind::Macro => "macro",
            ProductKind::Snippet => "snippet",
        }
    }

    pub fn is_library(&self) -> bool {
        matches!(
            self,
            ProductKind::Library | ProductKind::StaticLibrary | ProductKind::DynamicLibrary
        )
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "library" => Ok(ProductKind::Library),
            "static-library" => Ok(ProductKind::StaticLibrary),
            "dynamic-library" => Ok(ProductKind::DynamicLibrary),
            "executable" => Ok(ProductKind::Executable),
            "plugin" => Ok(ProductKind::Plugin),
            "test" => Ok(ProductKind::Test),
            "macro" => Ok(ProductKind::Macro),
            "snippet" => Ok(ProductKind::Snippet),
            _ => Err(format!("unknown product kind: {}", s)),
        }
    }
}

/// Graph-wide identity of a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProductId {
    pub package: PackageIdentity,
    pub name: String,
}

impl ProductId {
    pub fn new(package: PackageIdentity, name: impl Into<String>) -> Self {
        ProductId {
            package,
            name: name.into(),
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.name)
    }
}

/// A product after assembly.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProduct {
    pub(crate) id: ProductId,
    pub(crate) kind: ProductKind,
    pub(crate) modules: Vec<ModuleId>,
    /// Module name -> alias, as requested by consumers.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) module_aliases: BTreeMap<String, String>,
    pub(crate) platforms: Vec<PlatformRequirement>,
    /// Created by the loader rather than declared.
    pub(crate) synthesized: bool,
}

impl ResolvedProduct {
    pub fn id(&self) -> &ProductId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn package(&self) -> PackageIdentity {
        self.id.package
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    pub fn module_aliases(&self) -> &BTreeMap<String, String> {
        &self.module_aliases
    }

    pub fn platforms(&self) -> &[PlatformRequirement] {
        &self.platforms
    }

    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    pub fn is_test(&self) -> bool {
        self.kind == ProductKind::Test
    }
}

impl fmt::Display for ResolvedProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind)
    }
}
