//! Core data structures for harbour-graph.
//!
//! This module contains the value types the graph is built from and made of:
//! - Package identities and locations
//! - Manifests, as handed over by the loading subsystem
//! - Resolved packages, modules and products
//! - Traits, conditions, artifacts and resource classification

pub mod artifact;
pub mod condition;
pub mod identity;
pub mod manifest;
pub mod module;
pub mod package;
pub mod product;
pub mod resources;
pub mod traits;

pub use artifact::{BinaryArtifact, BinaryArtifactKind, BinaryArtifactsMap, PrebuiltLibrary, PrebuiltsMap};
pub use condition::{
    BuildConfiguration, BuildEnvironment, ModuleDependencyCondition, PackageCondition,
    PlatformRequirement, PlatformVersion,
};
pub use identity::{
    CanonicalPackageLocation, DefaultIdentityResolver, IdentityResolver, PackageIdentity,
    PackageKind, PackageReference,
};
pub use manifest::{
    DependencyTrait, Manifest, ModuleDependencyDecl, ModuleDescription, PackageDependency,
    ProductDescription, ProductFilter,
};
pub use module::{DependencyTarget, ModuleDependency, ModuleId, ModuleKind, ResolvedModule};
pub use package::ResolvedPackage;
pub use product::{ProductId, ProductKind, ResolvedProduct};
pub use resources::{FileRuleSet, ModuleSources};
pub use traits::{EnabledTraitsMap, TraitConfiguration, TraitDescription, TraitError, DEFAULT_TRAIT};
