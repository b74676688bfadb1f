//! harbour-graph - module graph construction for Harbour
//!
//! This crate turns loaded package manifests into a validated graph of
//! packages, modules and products, including trait resolution,
//! reachability and the executable to test-module mapping.

pub mod core;
pub mod graph;
pub mod util;

/// Test utilities for harbour-graph unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides manifest fixtures and loaders wired to an
/// in-memory file system.
#[cfg(test)]
pub mod test_support;

pub use core::{
    identity::PackageIdentity, manifest::Manifest, module::ResolvedModule,
    package::ResolvedPackage, product::ResolvedProduct,
};

pub use graph::{GraphLoader, GraphOptions, ModulesGraph, ModulesGraphError};
pub use util::config::GraphConfig;
