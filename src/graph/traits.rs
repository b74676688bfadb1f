//! Trait resolution across the package graph.
//!
//! Every package reachable from the roots gets an enabled trait set. A
//! package is traversed once, but each edge reaching it unions its
//! requested traits into the package's record, so a package reached by
//! several parents ends up with the union of their requests. A request
//! arriving after the package was traversed still updates its record but
//! does not re-traverse its dependencies.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::core::identity::{IdentityResolver, PackageIdentity};
use crate::core::manifest::{Manifest, PackageDependency, ProductFilter};
use crate::core::traits::{EnabledTraitsMap, TraitConfiguration, TraitError, DEFAULT_TRAIT};

/// One pending dependency edge: target and the traits it explicitly enables.
type Edge = (PackageIdentity, Option<BTreeSet<String>>);

struct Frame {
    edges: std::vec::IntoIter<Edge>,
}

pub(crate) struct TraitResolver<'a> {
    manifests: &'a HashMap<PackageIdentity, Arc<Manifest>>,
    resolver: &'a dyn IdentityResolver,
    requested: HashMap<PackageIdentity, BTreeSet<String>>,
    enabled: EnabledTraitsMap,
    visited: HashSet<PackageIdentity>,
}

impl<'a> TraitResolver<'a> {
    pub(crate) fn new(
        manifests: &'a HashMap<PackageIdentity, Arc<Manifest>>,
        resolver: &'a dyn IdentityResolver,
    ) -> Self {
        TraitResolver {
            manifests,
            resolver,
            requested: HashMap::new(),
            enabled: EnabledTraitsMap::new(),
            visited: HashSet::new(),
        }
    }

    /// Resolve traits for everything reachable from `roots` and
    /// `root_dependencies`.
    pub(crate) fn resolve(
        mut self,
        roots: &[PackageIdentity],
        root_dependencies: &[PackageDependency],
        configuration: &TraitConfiguration,
        root_filter: &ProductFilter,
    ) -> Result<EnabledTraitsMap, TraitError> {
        for &root in roots {
            let Some(manifest) = self.manifests.get(&root) else {
                continue;
            };
            let requested = manifest.requested_traits(configuration);
            let enabled = manifest.enabled_traits(&requested)?;
            tracing::debug!("root `{}` enables traits {:?}", root, enabled);
            self.requested.insert(root, requested);
            self.enabled.insert(root, enabled);
            self.visited.insert(root);
        }

        for &root in roots {
            let Some(manifest) = self.manifests.get(&root).cloned() else {
                continue;
            };
            let edges = self.edges_of(&manifest, root, root_filter);
            self.walk(edges)?;
        }

        let none = BTreeSet::new();
        let edges: Vec<Edge> = root_dependencies
            .iter()
            .map(|dep| (dep.identity(self.resolver), dep.explicitly_enabled_traits(&none)))
            .collect();
        self.walk(edges)?;

        Ok(self.enabled)
    }

    fn edges_of(&self, manifest: &Manifest, identity: PackageIdentity, filter: &ProductFilter) -> Vec<Edge> {
        let traits = self.enabled.get(identity);
        let mut seen = HashSet::new();
        let required = manifest
            .dependencies_required(filter, &traits, self.resolver)
            .into_iter()
            .map(|(dep, _)| dep);
        let guarded = manifest.dependencies_trait_guarded(&traits, self.resolver);

        required
            .chain(guarded)
            .filter_map(|dep| {
                let id = dep.identity(self.resolver);
                seen.insert(id)
                    .then(|| (id, dep.explicitly_enabled_traits(&traits)))
            })
            .collect()
    }

    fn walk(&mut self, edges: Vec<Edge>) -> Result<(), TraitError> {
        let mut stack = vec![Frame {
            edges: edges.into_iter(),
        }];

        while let Some(frame) = stack.last_mut() {
            let Some((identity, explicit)) = frame.edges.next() else {
                stack.pop();
                continue;
            };

            self.record(identity, explicit);

            let Some(manifest) = self.manifests.get(&identity).cloned() else {
                tracing::debug!("no manifest for `{}`, skipping trait resolution", identity);
                continue;
            };
            let requested = self.requested.get(&identity).cloned().unwrap_or_default();
            let enabled = manifest.enabled_traits(&requested)?;
            self.enabled.insert(identity, enabled);

            if self.visited.insert(identity) {
                let edges = self.edges_of(&manifest, identity, &ProductFilter::Everything);
                stack.push(Frame {
                    edges: edges.into_iter(),
                });
            }
        }

        Ok(())
    }

    /// Fold one edge's request into the dependency's record.
    fn record(&mut self, identity: PackageIdentity, explicit: Option<BTreeSet<String>>) {
        let default_only: BTreeSet<String> = [DEFAULT_TRAIT.to_string()].into();
        match (self.requested.entry(identity), explicit) {
            (Entry::Vacant(slot), Some(explicit)) => {
                slot.insert(explicit);
            }
            (Entry::Vacant(slot), None) => {
                slot.insert(default_only);
            }
            (Entry::Occupied(mut slot), Some(explicit)) => {
                if *slot.get() == default_only {
                    slot.insert(explicit);
                } else {
                    slot.get_mut().extend(explicit);
                }
            }
            (Entry::Occupied(_), None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::core::identity::{DefaultIdentityResolver, PackageKind};
    use crate::core::manifest::{DependencyTrait, ModuleDependencyDecl, ModuleDescription};
    use crate::core::module::ModuleKind;
    use crate::core::traits::TraitDescription;

    fn dep(name: &str) -> PackageDependency {
        PackageDependency::new(PackageKind::FileSystem(PathBuf::from(format!("/deps/{}", name))))
    }

    fn leaf(name: &str) -> Manifest {
        Manifest::new(name, PackageKind::FileSystem(PathBuf::from(format!("/deps/{}", name))))
            .with_trait(TraitDescription::new("default").with_enabled_traits(["Basic"]))
            .with_trait(TraitDescription::new("Basic"))
            .with_trait(TraitDescription::new("Json"))
            .with_trait(TraitDescription::new("Tls"))
    }

    fn index(manifests: Vec<Manifest>) -> HashMap<PackageIdentity, Arc<Manifest>> {
        let resolver = DefaultIdentityResolver::new();
        manifests
            .into_iter()
            .map(|m| (resolver.resolve_identity(&m.kind), Arc::new(m)))
            .collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn resolve(manifests: &HashMap<PackageIdentity, Arc<Manifest>>, config: TraitConfiguration) -> EnabledTraitsMap {
        let resolver = DefaultIdentityResolver::new();
        TraitResolver::new(manifests, &resolver)
            .resolve(&[PackageIdentity::plain("app")], &[], &config, &ProductFilter::Everything)
            .unwrap()
    }

    #[test]
    fn test_defaults_flow_to_dependencies() {
        let app = Manifest::new("App", PackageKind::Root(PathBuf::from("/app"))).with_dependency(dep("kit"));
        let manifests = index(vec![app, leaf("kit")]);

        let map = resolve(&manifests, TraitConfiguration::Default);
        assert_eq!(map.get(PackageIdentity::plain("kit")), set(&["Basic"]));
        assert!(map.get(PackageIdentity::plain("app")).is_empty());
    }

    #[test]
    fn test_sibling_requests_are_unioned() {
        let app = Manifest::new("App", PackageKind::Root(PathBuf::from("/app")))
            .with_dependency(dep("a"))
            .with_dependency(dep("b"));
        let a = Manifest::new("a", PackageKind::FileSystem(PathBuf::from("/deps/a")))
            .with_dependency(dep("kit").with_traits(vec![DependencyTrait::new("Json")]));
        let b = Manifest::new("b", PackageKind::FileSystem(PathBuf::from("/deps/b")))
            .with_dependency(dep("kit").with_traits(vec![DependencyTrait::new("Tls")]));
        let manifests = index(vec![app, a, b, leaf("kit")]);

        let first = resolve(&manifests, TraitConfiguration::Default);
        assert_eq!(first.get(PackageIdentity::plain("kit")), set(&["Json", "Tls"]));

        let second = resolve(&manifests, TraitConfiguration::Default);
        assert_eq!(first, second);
    }

    #[test]
    fn test_conditional_dependency_traits_follow_parent() {
        let app = Manifest::new("App", PackageKind::Root(PathBuf::from("/app")))
            .with_trait(TraitDescription::new("Secure"))
            .with_dependency(dep("kit").with_traits(vec![
                DependencyTrait::new("default"),
                DependencyTrait::new("Tls").when(["Secure"]),
            ]));
        let manifests = index(vec![app, leaf("kit")]);

        let plain = resolve(&manifests, TraitConfiguration::Default);
        assert_eq!(plain.get(PackageIdentity::plain("kit")), set(&["Basic"]));

        let secure = resolve(&manifests, TraitConfiguration::explicit(["Secure"]));
        assert_eq!(secure.get(PackageIdentity::plain("kit")), set(&["Basic", "Tls"]));
    }

    #[test]
    fn test_trait_guarded_dependency_only_with_trait() {
        let app = Manifest::new("App", PackageKind::Root(PathBuf::from("/app")))
            .with_trait(TraitDescription::new("Networking"))
            .with_module(ModuleDescription::new("App", ModuleKind::Library).with_dependency(
                ModuleDependencyDecl::product("net", Some("net")).with_condition(
                    crate::core::condition::ModuleDependencyCondition::traits(["Networking"]),
                ),
            ))
            .with_dependency(dep("net"));
        let manifests = index(vec![app, leaf("net")]);

        let off = resolve(&manifests, TraitConfiguration::Default);
        assert!(!off.contains(PackageIdentity::plain("net")));

        let on = resolve(&manifests, TraitConfiguration::All);
        assert_eq!(on.get(PackageIdentity::plain("net")), set(&["Basic"]));
    }

    #[test]
    fn test_late_request_updates_record_without_retraversal() {
        let parents = |first: &str, second: &str| {
            Manifest::new("App", PackageKind::Root(PathBuf::from("/app")))
                .with_dependency(dep(first))
                .with_dependency(dep(second))
        };
        let plain = Manifest::new("a", PackageKind::FileSystem(PathBuf::from("/deps/a"))).with_dependency(dep("kit"));
        let secure = Manifest::new("b", PackageKind::FileSystem(PathBuf::from("/deps/b")))
            .with_dependency(dep("kit").with_traits(vec![DependencyTrait::new("Tls")]));
        let kit = leaf("kit")
            .with_module(ModuleDescription::new("Kit", ModuleKind::Library).with_dependency(
                ModuleDependencyDecl::product("ssl", Some("ssl"))
                    .with_condition(crate::core::condition::ModuleDependencyCondition::traits(["Tls"])),
            ))
            .with_dependency(dep("ssl"));

        // `kit` is walked with its defaults first; the later `Tls` request
        // replaces the record but `ssl` is never reached.
        let manifests = index(vec![parents("a", "b"), plain.clone(), secure.clone(), kit.clone(), leaf("ssl")]);
        let map = resolve(&manifests, TraitConfiguration::Default);
        assert_eq!(map.get(PackageIdentity::plain("kit")), set(&["Tls"]));
        assert!(!map.contains(PackageIdentity::plain("ssl")));

        let manifests = index(vec![parents("b", "a"), plain, secure, kit, leaf("ssl")]);
        let map = resolve(&manifests, TraitConfiguration::Default);
        assert_eq!(map.get(PackageIdentity::plain("kit")), set(&["Tls"]));
        assert_eq!(map.get(PackageIdentity::plain("ssl")), set(&["Basic"]));
    }

    #[test]
    fn test_cyclic_manifests_terminate() {
        let app = Manifest::new("App", PackageKind::Root(PathBuf::from("/app"))).with_dependency(dep("a"));
        let a = Manifest::new("a", PackageKind::FileSystem(PathBuf::from("/deps/a"))).with_dependency(dep("b"));
        let b = Manifest::new("b", PackageKind::FileSystem(PathBuf::from("/deps/b"))).with_dependency(dep("a"));
        let manifests = index(vec![app, a, b]);

        let map = resolve(&manifests, TraitConfiguration::Default);
        assert!(map.contains(PackageIdentity::plain("a")));
        assert!(map.contains(PackageIdentity::plain("b")));
    }

    #[test]
    fn test_invalid_requested_trait_fails() {
        let app = Manifest::new("App", PackageKind::Root(PathBuf::from("/app")))
            .with_dependency(dep("kit").with_traits(vec![DependencyTrait::new("Gzip")]));
        let manifests = index(vec![app, leaf("kit")]);
        let resolver = DefaultIdentityResolver::new();

        let err = TraitResolver::new(&manifests, &resolver)
            .resolve(
                &[PackageIdentity::plain("app")],
                &[],
                &TraitConfiguration::Default,
                &ProductFilter::Everything,
            )
            .unwrap_err();
        assert!(matches!(err, TraitError::InvalidTrait { .. }));
    }
}
