//! Package traits: optional, named features that gate dependencies.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::identity::PackageIdentity;

/// Name of the sentinel trait that stands for "the package's defaults".
pub const DEFAULT_TRAIT: &str = "default";

/// Errors expanding a trait request against a manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraitError {
    #[error(
        "Trait '{trait_name}' is not declared by package '{package}'. The available traits declared by this package are: {}.",
        .available.join(", ")
    )]
    InvalidTrait {
        package: String,
        trait_name: String,
        available: Vec<String>,
    },

    #[error("Package '{package}' does not have any available traits defined.")]
    TraitsNotSupported { package: String },
}

/// A trait as declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TraitDescription {
    pub name: String,
    /// Traits implied by enabling this one.
    #[serde(default)]
    pub enabled_traits: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TraitDescription {
    pub fn new(name: impl Into<String>) -> Self {
        TraitDescription {
            name: name.into(),
            enabled_traits: BTreeSet::new(),
            description: None,
        }
    }

    pub fn with_enabled_traits(mut self, traits: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enabled_traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_TRAIT
    }
}

/// How traits are selected on the root packages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "TraitConfigurationRepr", into = "TraitConfigurationRepr")]
pub enum TraitConfiguration {
    /// Only the traits each root marks as default.
    #[default]
    Default,
    /// Exactly this set (may include `default`).
    Explicit(BTreeSet<String>),
    /// Every declared trait.
    All,
}

impl TraitConfiguration {
    pub fn explicit(traits: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TraitConfiguration::Explicit(traits.into_iter().map(Into::into).collect())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TraitConfigurationRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<TraitConfigurationRepr> for TraitConfiguration {
    type Error = String;

    fn try_from(repr: TraitConfigurationRepr) -> Result<Self, Self::Error> {
        match repr {
            TraitConfigurationRepr::Keyword(k) => match k.as_str() {
                "default" => Ok(TraitConfiguration::Default),
                "all" => Ok(TraitConfiguration::All),
                other => Err(format!(
                    "invalid trait configuration `{}`, expected `default`, `all` or a list",
                    other
                )),
            },
            TraitConfigurationRepr::List(list) => Ok(TraitConfiguration::explicit(list)),
        }
    }
}

impl From<TraitConfiguration> for TraitConfigurationRepr {
    fn from(config: TraitConfiguration) -> Self {
        match config {
            TraitConfiguration::Default => TraitConfigurationRepr::Keyword("default".into()),
            TraitConfiguration::All => TraitConfigurationRepr::Keyword("all".into()),
            TraitConfiguration::Explicit(set) => {
                TraitConfigurationRepr::List(set.into_iter().collect())
            }
        }
    }
}

/// Resolved enabled traits per package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnabledTraitsMap {
    map: BTreeMap<PackageIdentity, BTreeSet<String>>,
}

impl EnabledTraitsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enabled traits of `identity`; empty when the package was not reached.
    pub fn get(&self, identity: PackageIdentity) -> BTreeSet<String> {
        self.map.get(&identity).cloned().unwrap_or_default()
    }

    pub fn contains(&self, identity: PackageIdentity) -> bool {
        self.map.contains_key(&identity)
    }

    pub fn is_enabled(&self, identity: PackageIdentity, name: &str) -> bool {
        self.map
            .get(&identity)
            .is_some_and(|traits| traits.contains(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageIdentity, &BTreeSet<String>)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn insert(&mut self, identity: PackageIdentity, traits: BTreeSet<String>) {
        self.map.insert(identity, traits);
    }
}

impl fmt::Display for EnabledTraitsMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (identity, traits) in &self.map {
            let names: Vec<&str> = traits.iter().map(String::as_str).collect();
            writeln!(f, "{}: [{}]", identity, names.join(", "))?;
        }
        Ok(())
    }
}
