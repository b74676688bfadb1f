//! Test utilities for harbour-graph unit tests.
//!
//! This module provides manifest fixtures and one-call loaders that wire
//! the default identity resolver, an in-memory file system and a collecting
//! diagnostics sink into a [`GraphLoader`].
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::{self, app_kit};
//!
//! #[test]
//! fn test_example() {
//!     let graph = test_support::load(&app_kit()).unwrap();
//!     assert_eq!(graph.root_packages().len(), 1);
//! }
//! ```

pub mod fixtures;

pub use fixtures::*;

use crate::core::identity::DefaultIdentityResolver;
use crate::core::manifest::Manifest;
use crate::graph::{GraphLoader, GraphOptions, ModulesGraph, ModulesGraphError};
use crate::util::diagnostic::CollectingSink;
use crate::util::fs::InMemoryFileSystem;

/// Load `manifests` with default options and an empty file system.
pub fn load(manifests: &[Manifest]) -> Result<ModulesGraph, ModulesGraphError> {
    load_with(manifests, GraphOptions::default()).0
}

/// Load `manifests` with `options`, returning the warnings as well.
pub fn load_with(
    manifests: &[Manifest],
    options: GraphOptions,
) -> (Result<ModulesGraph, ModulesGraphError>, CollectingSink) {
    load_with_fs(manifests, options, &InMemoryFileSystem::new())
}

/// Load `manifests` against a prepared in-memory file system.
pub fn load_with_fs(
    manifests: &[Manifest],
    options: GraphOptions,
    fs: &InMemoryFileSystem,
) -> (Result<ModulesGraph, ModulesGraphError>, CollectingSink) {
    let resolver = DefaultIdentityResolver::new();
    let sink = CollectingSink::new();
    let result = GraphLoader::new(&resolver, fs, &sink)
        .with_options(options)
        .load(manifests);
    (result, sink)
}

/// Unwrap a load failure into its package-graph error.
pub fn package_error(result: Result<ModulesGraph, ModulesGraphError>) -> crate::graph::PackageGraphError {
    match result {
        Ok(_) => panic!("expected the graph to fail loading"),
        Err(err) => match err.package_error() {
            Some(err) => err.clone(),
            None => panic!("expected a package graph error, got {}", err),
        },
    }
}
