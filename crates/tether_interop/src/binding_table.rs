//! Precompiled bindings
//!
//! A binding resolved once by name gets an integer id. Calls by id skip name
//! hashing and owner resolution; they go straight to the registry lookup.
//! The table stores keys, not handlers, so re-registering a member rebinds
//! every id that points at it.

use crate::error::InteropError;
use crate::key::FastPathKey;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct BindingTable {
    keys: Vec<FastPathKey>,
    ids: FxHashMap<FastPathKey, i32>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `key`, 1-based. The same key always gets the same id.
    pub fn assign(&mut self, key: FastPathKey) -> Result<i32, InteropError> {
        if let Some(&id) = self.ids.get(&key) {
            return Ok(id);
        }
        let id = i32::try_from(self.keys.len() + 1).map_err(|_| InteropError::BindingIdsExhausted)?;
        self.keys.push(key);
        self.ids.insert(key, id);
        Ok(id)
    }

    #[inline]
    pub fn key(&self, id: i32) -> Option<FastPathKey> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.keys.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CallKind, OwnerIdentity};

    fn key(member: u32) -> FastPathKey {
        FastPathKey::new(OwnerIdentity::NamedStatic(3), member, CallKind::Method, true)
    }

    #[test]
    fn test_ids_are_stable_per_key() {
        let mut table = BindingTable::new();
        assert_eq!(table.assign(key(10)), Ok(1));
        assert_eq!(table.assign(key(20)), Ok(2));
        assert_eq!(table.assign(key(10)), Ok(1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.key(2), Some(key(20)));
    }

    #[test]
    fn test_unknown_ids() {
        let mut table = BindingTable::new();
        table.assign(key(1)).unwrap();
        assert!(table.key(0).is_none());
        assert!(table.key(-1).is_none());
        assert!(table.key(2).is_none());
        table.clear();
        assert!(table.key(1).is_none());
        assert!(table.is_empty());
    }
}
