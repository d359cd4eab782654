//! Compare-and-set over a version counter. Game states (`game_seq`) and the
//! inter-round slot counter on tables both go through this contract.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

use super::{ConflictKind, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<V> {
    pub version: u64,
    pub value: V,
}

/// Rejects a write whose precondition does not match the stored version.
pub fn check_version(expected: u64, actual: u64) -> Result<(), StoreError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StoreError::Conflict(ConflictKind::VersionMismatch {
            expected,
            actual: Some(actual),
        }))
    }
}

pub struct VersionedMap<K, V> {
    entries: RwLock<HashMap<K, Versioned<V>>>,
}

impl<K, V> Default for VersionedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> VersionedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn insert_new(&self, key: K, value: V, what: &'static str) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(StoreError::Conflict(ConflictKind::AlreadyExists(what)));
        }
        entries.insert(key, Versioned { version: 0, value });
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<Versioned<V>> {
        self.entries.read().get(key).cloned()
    }

    /// Writes `value` iff the stored version equals `expected`; returns the new version.
    pub fn put(
        &self,
        key: &K,
        expected: u64,
        what: &'static str,
        value: impl FnOnce(&V, u64) -> V,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(key).ok_or(StoreError::NotFound(what))?;
        check_version(expected, entry.version)?;
        let next = expected + 1;
        entry.value = value(&entry.value, next);
        entry.version = next;
        Ok(next)
    }

    /// Unversioned in-place edit for fields outside the version contract.
    pub fn modify(
        &self,
        key: &K,
        what: &'static str,
        edit: impl FnOnce(&mut V),
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(key).ok_or(StoreError::NotFound(what))?;
        edit(&mut entry.value);
        Ok(())
    }

    pub fn values(&self) -> Vec<V> {
        self.entries.read().values().map(|v| v.value.clone()).collect()
    }
}
