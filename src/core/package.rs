//! Packages after assembly.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::core::identity::{PackageIdentity, PackageKind};
use crate::core::manifest::{Manifest, ProductFilter};
use crate::core::module::ResolvedModule;
use crate::core::product::ResolvedProduct;

/// A package with its modules and products resolved.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub(crate) identity: PackageIdentity,
    pub(crate) manifest: Arc<Manifest>,
    pub(crate) is_root: bool,
    pub(crate) modules: Vec<Arc<ResolvedModule>>,
    pub(crate) products: Vec<Arc<ResolvedProduct>>,
    /// Loaded packages this one depends on.
    pub(crate) dependencies: Vec<PackageIdentity>,
    pub(crate) enabled_traits: BTreeSet<String>,
    pub(crate) product_filter: ProductFilter,
}

impl ResolvedPackage {
    pub fn identity(&self) -> PackageIdentity {
        self.identity
    }

    pub fn display_name(&self) -> &str {
        &self.manifest.display_name
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn kind(&self) -> &PackageKind {
        &self.manifest.kind
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn modules(&self) -> &[Arc<ResolvedModule>] {
        &self.modules
    }

    pub fn products(&self) -> &[Arc<ResolvedProduct>] {
        &self.products
    }

    pub fn module(&self, name: &str) -> Option<&Arc<ResolvedModule>> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn product(&self, name: &str) -> Option<&Arc<ResolvedProduct>> {
        self.products.iter().find(|p| p.name() == name)
    }

    pub fn dependencies(&self) -> &[PackageIdentity] {
        &self.dependencies
    }

    pub fn enabled_traits(&self) -> &BTreeSet<String> {
        &self.enabled_traits
    }

    pub fn product_filter(&self) -> &ProductFilter {
        &self.product_filter
    }

    /// Human-readable description of where the package comes from, as used
    /// in conflict diagnostics.
    pub fn location_description(&self) -> String {
        describe_location(self.identity, &self.manifest.kind)
    }
}

/// `'id' (at 'path')`, `'id' (from 'url')` or `'id'`.
pub fn describe_location(identity: PackageIdentity, kind: &PackageKind) -> String {
    match kind {
        PackageKind::Root(path) | PackageKind::FileSystem(path) => {
            format!("'{}' (at '{}')", identity, path.display())
        }
        PackageKind::RemoteSourceControl(url) => format!("'{}' (from '{}')", identity, url),
        PackageKind::Registry(_) => format!("'{}'", identity),
    }
}

impl fmt::Display for ResolvedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.manifest)
    }
}
