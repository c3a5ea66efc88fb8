//! Snapshot queries over the registry
//!
//! A query captures the matching handles at the moment it is built. Later
//! structural changes never alter it, and it can be iterated any number of
//! times.

use crate::foundation::collections::{ComponentId, EntityId};

/// Immutable, restartable sequence of handles captured at query time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<K> {
    items: Vec<K>,
}

/// Snapshot of component handles
pub type ComponentQuery = Query<ComponentId>;

/// Snapshot of entity handles
pub type EntityQuery = Query<EntityId>;

impl<K: Copy + PartialEq> Query<K> {
    pub(crate) fn new(items: Vec<K>) -> Self {
        Self { items }
    }

    /// Iterate from the beginning
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, K>> {
        self.items.iter().copied()
    }

    /// Number of captured handles
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `item` was captured
    pub fn contains(&self, item: K) -> bool {
        self.items.contains(&item)
    }

    /// First captured handle
    pub fn first(&self) -> Option<K> {
        self.items.first().copied()
    }
}

impl<K> Default for Query<K> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<'a, K: Copy + PartialEq> IntoIterator for &'a Query<K> {
    type Item = K;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K> IntoIterator for Query<K> {
    type Item = K;
    type IntoIter = std::vec::IntoIter<K>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
