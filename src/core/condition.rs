//! Platforms, build environments and the conditions attached to module
//! dependency edges.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A dotted platform version such as `13.0` or `10.15.4`.
///
/// Missing trailing components compare as zero, so `13` == `13.0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformVersion(Vec<u32>);

impl PlatformVersion {
    pub fn new(components: impl Into<Vec<u32>>) -> Self {
        PlatformVersion(components.into())
    }

    fn component(&self, idx: usize) -> u32 {
        self.0.get(idx).copied().unwrap_or(0)
    }
}

impl PartialEq for PlatformVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PlatformVersion {}

impl PartialOrd for PlatformVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlatformVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl FromStr for PlatformVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = s
            .trim()
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| format!("invalid platform version: `{}`", s))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PlatformVersion(components))
    }
}

impl TryFrom<String> for PlatformVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlatformVersion> for String {
    fn from(value: PlatformVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Minimum deployment target for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRequirement {
    pub platform: String,
    pub version: PlatformVersion,
}

impl PlatformRequirement {
    pub fn new(platform: impl Into<String>, version: PlatformVersion) -> Self {
        PlatformRequirement {
            platform: platform.into(),
            version,
        }
    }
}

/// Debug or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildConfiguration {
    Debug,
    Release,
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildConfiguration::Debug => write!(f, "debug"),
            BuildConfiguration::Release => write!(f, "release"),
        }
    }
}

/// The environment conditions are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    pub platform: String,
    pub configuration: Option<BuildConfiguration>,
}

impl BuildEnvironment {
    pub fn new(platform: impl Into<String>, configuration: Option<BuildConfiguration>) -> Self {
        BuildEnvironment {
            platform: platform.into(),
            configuration,
        }
    }
}

/// Condition attached to a module dependency as declared in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleDependencyCondition {
    pub platforms: Option<Vec<String>>,
    pub configuration: Option<BuildConfiguration>,
    pub traits: Option<BTreeSet<String>>,
}

impl ModuleDependencyCondition {
    /// Only when building for one of `platforms`.
    pub fn platforms(platforms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ModuleDependencyCondition {
            platforms: Some(platforms.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Only when one of `traits` is enabled in the declaring package.
    pub fn traits(traits: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ModuleDependencyCondition {
            traits: Some(traits.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Whether the trait part of the condition holds for `enabled` traits.
    pub fn is_enabled_by(&self, enabled: &BTreeSet<String>) -> bool {
        match &self.traits {
            Some(traits) => traits.iter().any(|t| enabled.contains(t)),
            None => true,
        }
    }

    /// Whether the condition is gated on traits at all.
    pub fn is_trait_guarded(&self) -> bool {
        self.traits.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// The conditions carried onto a resolved edge.
    pub fn to_package_conditions(&self) -> Vec<PackageCondition> {
        let mut conditions = Vec::new();
        if let Some(platforms) = &self.platforms {
            conditions.push(PackageCondition::Platforms(platforms.clone()));
        }
        if let Some(configuration) = self.configuration {
            conditions.push(PackageCondition::Configuration(configuration));
        }
        if let Some(traits) = &self.traits {
            conditions.push(PackageCondition::Traits(traits.clone()));
        }
        conditions
    }
}

/// A condition on a resolved dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageCondition {
    Platforms(Vec<String>),
    Configuration(BuildConfiguration),
    /// Already decided at assembly; carried for inspection.
    Traits(BTreeSet<String>),
}

impl PackageCondition {
    pub fn satisfies(&self, env: &BuildEnvironment) -> bool {
        match self {
            PackageCondition::Platforms(platforms) => platforms
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&env.platform)),
            PackageCondition::Configuration(configuration) => {
                env.configuration.map_or(true, |c| c == *configuration)
            }
            PackageCondition::Traits(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_version_ordering() {
        let a: PlatformVersion = "13".parse().unwrap();
        let b: PlatformVersion = "13.0.0".parse().unwrap();
        let c: PlatformVersion = "13.1".parse().unwrap();
        assert_eq!(a, b);
        assert!(c > b);
        assert_eq!(c.to_string(), "13.1");
        assert!("13.x".parse::<PlatformVersion>().is_err());
    }

    #[test]
    fn test_platform_condition() {
        let linux = BuildEnvironment::new("linux", Some(BuildConfiguration::Debug));
        let cond = PackageCondition::Platforms(vec!["Linux".into(), "windows".into()]);
        assert!(cond.satisfies(&linux));
        assert!(!cond.satisfies(&BuildEnvironment::new("macos", None)));
    }

    #[test]
    fn test_configuration_condition() {
        let cond = PackageCondition::Configuration(BuildConfiguration::Release);
        assert!(!cond.satisfies(&BuildEnvironment::new("linux", Some(BuildConfiguration::Debug))));
        assert!(cond.satisfies(&BuildEnvironment::new("linux", Some(BuildConfiguration::Release))));
        // No configuration in the environment means "any".
        assert!(cond.satisfies(&BuildEnvironment::new("linux", None)));
    }

    #[test]
    fn test_trait_guard() {
        let cond = ModuleDependencyCondition::traits(["Networking"]);
        let mut enabled = BTreeSet::new();
        assert!(!cond.is_enabled_by(&enabled));
        enabled.insert("Networking".to_string());
        assert!(cond.is_enabled_by(&enabled));
        assert!(ModuleDependencyCondition::default().is_enabled_by(&BTreeSet::new()));
    }
}
