//! Binary artifacts and prebuilt libraries supplied by the caller.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::identity::PackageIdentity;

/// Packaging format of a binary artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryArtifactKind {
    Framework,
    ArtifactsArchive,
    StaticLibrary,
    Unknown,
}

/// A downloaded or local binary backing a binary module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryArtifact {
    pub kind: BinaryArtifactKind,
    pub path: PathBuf,
}

impl BinaryArtifact {
    pub fn new(kind: BinaryArtifactKind, path: impl Into<PathBuf>) -> Self {
        BinaryArtifact {
            kind,
            path: path.into(),
        }
    }
}

/// package identity -> module name -> artifact
pub type BinaryArtifactsMap = BTreeMap<PackageIdentity, BTreeMap<String, BinaryArtifact>>;

/// A library built ahead of time that stands in for a product dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PrebuiltLibrary {
    pub identity: PackageIdentity,
    pub library_name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub include_path: Option<PathBuf>,
}

/// package identity -> product name -> prebuilt
pub type PrebuiltsMap = BTreeMap<PackageIdentity, BTreeMap<String, PrebuiltLibrary>>;
