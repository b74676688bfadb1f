//! Package identification - WHO a package is, independent of WHERE it was
//! reached from.
//!
//! A [`PackageIdentity`] is interned for cheap comparison and cloning. Two
//! manifests with the same identity denote the same logical package even if
//! they were reached through different dependency declarations.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{LazyLock, PoisonError, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// Global identity interner
static IDENTITY_INTERNER: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// Canonical, case-insensitive key for a package (interned).
///
/// Equality and hashing are pointer based.
#[derive(Clone, Copy)]
pub struct PackageIdentity {
    inner: &'static str,
}

impl PackageIdentity {
    /// Create an identity from a plain name. Identities are lower-cased.
    pub fn plain(name: impl AsRef<str>) -> Self {
        Self::intern(&name.as_ref().to_lowercase())
    }

    fn intern(s: &str) -> Self {
        // Fast path: check if already interned
        {
            let interner = IDENTITY_INTERNER
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(&interned) = interner.get(s) {
                return PackageIdentity { inner: interned };
            }
        }

        let mut interner = IDENTITY_INTERNER
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Double-check after acquiring write lock
        if let Some(&interned) = interner.get(s) {
            return PackageIdentity { inner: interned };
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        interner.insert(leaked);

        PackageIdentity { inner: leaked }
    }

    /// Get the identity string.
    pub fn as_str(&self) -> &'static str {
        self.inner
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner.cmp(other.inner)
    }
}

impl fmt::Debug for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageIdentity({:?})", self.inner)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner)
    }
}

impl Serialize for PackageIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackageIdentity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PackageIdentity::plain(s))
    }
}

/// Where a package comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    /// A root package being built
    Root(PathBuf),
    /// A local path dependency
    FileSystem(PathBuf),
    /// A remote source-controlled repository
    RemoteSourceControl(Url),
    /// A registry package, `scope.name`
    Registry(String),
}

impl PackageKind {
    /// Whether this is a root package.
    pub fn is_root(&self) -> bool {
        matches!(self, PackageKind::Root(_))
    }

    /// Human-readable location (path, URL or registry id).
    pub fn location(&self) -> String {
        match self {
            PackageKind::Root(path) | PackageKind::FileSystem(path) => {
                path.display().to_string()
            }
            PackageKind::RemoteSourceControl(url) => url.to_string(),
            PackageKind::Registry(id) => id.clone(),
        }
    }

    /// Location normalised for comparisons.
    pub fn canonical_location(&self) -> CanonicalPackageLocation {
        CanonicalPackageLocation::new(&self.location())
    }

    /// On-disk directory of the package, when the kind is path based.
    pub fn local_path(&self) -> Option<&std::path::Path> {
        match self {
            PackageKind::Root(path) | PackageKind::FileSystem(path) => Some(path),
            _ => None,
        }
    }
}

/// A package location with cosmetic differences removed.
///
/// `https://github.com/Org/Repo.git`, `git@github.com:org/repo` and
/// `github.com/org/repo/` all canonicalise to `github.com/org/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPackageLocation(String);

impl CanonicalPackageLocation {
    pub fn new(location: &str) -> Self {
        let mut s = location.trim().to_lowercase();

        if let Some(idx) = s.find("://") {
            s = s[idx + 3..].to_string();
        } else if let Some(rest) = s.strip_prefix("git@") {
            s = rest.replacen(':', "/", 1);
        }

        // Drop user info (`user@host/...`)
        if let Some(at) = s.find('@') {
            if s.find('/').map_or(true, |slash| at < slash) {
                s = s[at + 1..].to_string();
            }
        }

        while s.ends_with('/') {
            s.pop();
        }
        if let Some(stripped) = s.strip_suffix(".git") {
            s = stripped.to_string();
        }

        CanonicalPackageLocation(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPackageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference to a package required to realize the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageReference {
    pub identity: PackageIdentity,
    pub kind: PackageKind,
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identity, self.kind.location())
    }
}

/// Maps a package location to its canonical identity.
///
/// Implementations must be deterministic and total.
pub trait IdentityResolver {
    fn resolve_identity(&self, kind: &PackageKind) -> PackageIdentity;
}

/// Derives identities from the last location component, after applying
/// configured mirrors.
#[derive(Debug, Clone, Default)]
pub struct DefaultIdentityResolver {
    mirrors: HashMap<CanonicalPackageLocation, String>,
}

impl DefaultIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `original` as if it were `mirror`.
    pub fn with_mirror(mut self, original: &str, mirror: impl Into<String>) -> Self {
        self.mirrors
            .insert(CanonicalPackageLocation::new(original), mirror.into());
        self
    }

    fn identity_for_location(location: &str) -> PackageIdentity {
        let trimmed = location.trim_end_matches(|c| c == '/' || c == '\\');
        let last = trimmed
            .rsplit(|c| c == '/' || c == '\\' || c == ':')
            .next()
            .unwrap_or(trimmed);
        let last = last.strip_suffix(".git").unwrap_or(last);
        PackageIdentity::plain(last)
    }
}

impl IdentityResolver for DefaultIdentityResolver {
    fn resolve_identity(&self, kind: &PackageKind) -> PackageIdentity {
        if let PackageKind::Registry(id) = kind {
            return PackageIdentity::plain(id);
        }

        let location = kind.location();
        match self.mirrors.get(&CanonicalPackageLocation::new(&location)) {
            Some(mirror) => Self::identity_for_location(mirror),
            None => Self::identity_for_location(&location),
        }
    }
}
