//! Identity-keyed collections.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::core::identity::PackageIdentity;
use crate::core::module::{ModuleId, ResolvedModule};
use crate::core::package::ResolvedPackage;
use crate::core::product::{ProductId, ResolvedProduct};

/// A value with a stable identity.
pub trait Identifiable {
    type Id: Clone + Eq + Hash + Ord + Debug;

    fn id(&self) -> Self::Id;
}

impl<T: Identifiable + ?Sized> Identifiable for Arc<T> {
    type Id = T::Id;

    fn id(&self) -> Self::Id {
        (**self).id()
    }
}

impl Identifiable for PackageIdentity {
    type Id = PackageIdentity;

    fn id(&self) -> PackageIdentity {
        *self
    }
}

impl Identifiable for ResolvedPackage {
    type Id = PackageIdentity;

    fn id(&self) -> PackageIdentity {
        self.identity
    }
}

impl Identifiable for ResolvedModule {
    type Id = ModuleId;

    fn id(&self) -> ModuleId {
        self.id.clone()
    }
}

impl Identifiable for ResolvedProduct {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id.clone()
    }
}

/// A set of values keyed by identity.
///
/// Inserting a value whose identity is already present replaces it.
/// Iteration follows identity order.
#[derive(Debug, Clone)]
pub struct IdentifiableSet<T: Identifiable> {
    items: BTreeMap<T::Id, T>,
}

impl<T: Identifiable> Default for IdentifiableSet<T> {
    fn default() -> Self {
        IdentifiableSet {
            items: BTreeMap::new(),
        }
    }
}

impl<T: Identifiable> IdentifiableSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item`; returns whether its identity was new.
    pub fn insert(&mut self, item: T) -> bool {
        self.items.insert(item.id(), item).is_none()
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.get(id)
    }

    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        self.items.remove(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &T::Id> {
        self.items.keys()
    }
}

impl<T: Identifiable + Clone> IdentifiableSet<T> {
    pub fn union(&self, other: &IdentifiableSet<T>) -> IdentifiableSet<T> {
        let mut result = self.clone();
        result.extend(other.iter().cloned());
        result
    }

    pub fn subtracting(&self, other: &IdentifiableSet<T>) -> IdentifiableSet<T> {
        self.iter().filter(|i| !other.contains(&i.id())).cloned().collect()
    }

    pub fn intersection(&self, other: &IdentifiableSet<T>) -> IdentifiableSet<T> {
        self.iter().filter(|i| other.contains(&i.id())).cloned().collect()
    }

    pub fn is_subset(&self, other: &IdentifiableSet<T>) -> bool {
        self.ids().all(|id| other.contains(id))
    }
}

impl<T: Identifiable> FromIterator<T> for IdentifiableSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = IdentifiableSet::new();
        set.extend(iter);
        set
    }
}

impl<T: Identifiable> Extend<T> for IdentifiableSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T: Identifiable> IntoIterator for IdentifiableSet<T> {
    type Item = T;
    type IntoIter = std::collections::btree_map::IntoValues<T::Id, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}
