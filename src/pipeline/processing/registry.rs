use std::collections::HashMap;

use tracing::debug;

use crate::domain::{NaturalKey, SurrogateId};
use crate::error::{EtlError, Result};

/// Master mapping from natural key to surrogate id for one dimension.
///
/// Ids are dense, start at 1 and follow first-seen order. Once allocated an id
/// is never reassigned, so the registry only ever grows.
#[derive(Debug, Clone)]
pub struct KeyRegistry<K: NaturalKey> {
    index: HashMap<K, SurrogateId>,
    entries: Vec<K>,
}

impl<K: NaturalKey> Default for KeyRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NaturalKey> KeyRegistry<K> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<SurrogateId> {
        self.index.get(key).copied()
    }

    pub fn key(&self, id: SurrogateId) -> Option<&K> {
        (id.get() as usize)
            .checked_sub(1)
            .and_then(|slot| self.entries.get(slot))
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SurrogateId, &K)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(slot, key)| (SurrogateId(slot as u32 + 1), key))
    }

    /// Reject a batch containing a blank key component before anything is registered.
    pub fn validate(keys: &[K]) -> Result<()> {
        match keys.iter().find_map(|k| k.blank_component()) {
            Some(column) => Err(EtlError::NullKeyComponent {
                dimension: K::DIMENSION,
                column,
            }),
            None => Ok(()),
        }
    }

    /// Allocate ids for keys not yet present, in first-seen order.
    ///
    /// Returns how many ids were allocated. Keys already present, including
    /// repeats within `keys`, allocate nothing.
    pub fn register<'a, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let before = self.entries.len();
        for key in keys {
            if self.index.contains_key(key) {
                continue;
            }
            let id = SurrogateId(self.entries.len() as u32 + 1);
            self.index.insert(key.clone(), id);
            self.entries.push(key.clone());
        }
        let allocated = self.entries.len() - before;
        if allocated > 0 {
            debug!(
                dimension = K::DIMENSION,
                allocated,
                total = self.entries.len(),
                "Allocated surrogate ids"
            );
        }
        allocated
    }

    /// Attach the surrogate id of every key, in input order.
    pub fn lookup_all(&self, keys: &[K]) -> Result<Vec<SurrogateId>> {
        keys.iter()
            .map(|key| {
                self.get(key).ok_or_else(|| EtlError::UnresolvedKey {
                    dimension: K::DIMENSION,
                    key: format!("{:?}", key),
                })
            })
            .collect()
    }

    /// Validate, register new keys, then look every key up.
    pub fn resolve(&mut self, keys: &[K]) -> Result<Vec<SurrogateId>> {
        Self::validate(keys)?;
        self.register(keys);
        self.lookup_all(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AirportKey, RouteKey};

    fn airports(names: &[&str]) -> Vec<AirportKey> {
        names.iter().map(|n| AirportKey::new(n)).collect()
    }

    #[test]
    fn test_ids_are_dense_in_first_seen_order() {
        let mut registry = KeyRegistry::new();
        let ids = registry
            .resolve(&airports(&["HEATHROW", "GATWICK", "HEATHROW", "LUTON"]))
            .unwrap();
        assert_eq!(ids, vec![SurrogateId(1), SurrogateId(2), SurrogateId(1), SurrogateId(3)]);

        let ids = registry.resolve(&airports(&["STANSTED", "GATWICK"])).unwrap();
        assert_eq!(ids, vec![SurrogateId(4), SurrogateId(2)]);

        let all: Vec<u32> = registry.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(all, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let batch = airports(&["HEATHROW", "GATWICK"]);
        let mut registry = KeyRegistry::new();
        let first = registry.resolve(&batch).unwrap();
        let snapshot: Vec<_> = registry.iter().map(|(id, k)| (id, k.clone())).collect();

        let second = registry.resolve(&batch).unwrap();
        let after: Vec<_> = registry.iter().map(|(id, k)| (id, k.clone())).collect();

        assert_eq!(first, second);
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_case_and_whitespace_resolve_to_same_id() {
        let mut registry = KeyRegistry::new();
        let ids = registry.resolve(&airports(&[" lhr ", "LHR", "Lhr"])).unwrap();
        assert_eq!(ids, vec![SurrogateId(1); 3]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_blank_component_registers_nothing() {
        let mut registry = KeyRegistry::new();
        let batch = vec![RouteKey::new("PARIS", "FRANCE"), RouteKey::new("", "SPAIN")];
        let err = registry.resolve(&batch).unwrap_err();
        assert!(matches!(err, EtlError::NullKeyComponent { dimension: "route", .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_of_unknown_key_is_surfaced() {
        let registry: KeyRegistry<AirportKey> = KeyRegistry::new();
        let err = registry.lookup_all(&airports(&["HEATHROW"])).unwrap_err();
        assert!(matches!(err, EtlError::UnresolvedKey { dimension: "airport", .. }));
    }

    #[test]
    fn test_key_by_id() {
        let mut registry = KeyRegistry::new();
        registry.register(&airports(&["HEATHROW", "GATWICK"]));
        assert_eq!(registry.key(SurrogateId(2)).map(|k| k.name()), Some("GATWICK"));
        assert!(registry.key(SurrogateId(0)).is_none());
        assert!(registry.key(SurrogateId(3)).is_none());
    }
}
