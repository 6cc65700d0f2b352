//! Fast-path registry
//!
//! Maps [`FastPathKey`]s to boxed handlers. Handlers decode their arguments,
//! call the host function and encode the result; a handler returning `None`
//! declined the call (missing or mistyped target, object already borrowed).

use crate::key::FastPathKey;
use crate::marshal::Marshaler;
use crate::value::InteropValue;
use rustc_hash::{FxHashMap, FxHashSet};
use std::any::{Any, TypeId};
use tracing::{debug, warn};

pub type Handler = Box<
    dyn Fn(Option<&dyn Any>, &[InteropValue<'_>], &mut Marshaler<'_>) -> Option<InteropValue<'static>>,
>;

struct Binding {
    member: Box<str>,
    handler: Handler,
}

#[derive(Default)]
pub struct FastPathRegistry {
    bindings: FxHashMap<FastPathKey, Binding>,
    /// Type name hash -> host type, for statics addressed by name.
    type_names: FxHashMap<u32, TypeId>,
    /// Name hashes of script-only static namespaces.
    named_statics: FxHashSet<u32>,
    /// Set while built-in bindings install; earlier host bindings win.
    keep_existing: bool,
}

impl FastPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, [`insert`](Self::insert) and [`alias_type`](Self::alias_type)
    /// leave existing entries in place.
    pub fn set_keep_existing(&mut self, keep: bool) {
        self.keep_existing = keep;
    }

    pub fn insert(&mut self, key: FastPathKey, member: &str, handler: Handler) {
        if self.keep_existing {
            if let Some(current) = self.bindings.get(&key) {
                debug!("Keeping host binding '{}' over built-in '{}'", current.member, member);
                return;
            }
        }

        let previous = self.bindings.insert(
            key,
            Binding {
                member: member.into(),
                handler,
            },
        );

        match previous {
            Some(old) if &*old.member == member => {
                debug!("Rebound {} ({})", member, key.kind);
            }
            Some(old) => {
                warn!(
                    "Member hash collision: '{}' replaces '{}' (key {})",
                    member, old.member, key
                );
            }
            None => {}
        }
    }

    #[inline]
    pub fn get(&self, key: &FastPathKey) -> Option<&Handler> {
        self.bindings.get(key).map(|binding| &binding.handler)
    }

    pub fn member_name(&self, key: &FastPathKey) -> Option<&str> {
        self.bindings.get(key).map(|binding| &*binding.member)
    }

    #[inline]
    pub fn contains(&self, key: &FastPathKey) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn alias_type(&mut self, name_hash: u32, ty: TypeId) {
        if self.keep_existing && self.type_names.contains_key(&name_hash) {
            return;
        }
        if let Some(old) = self.type_names.insert(name_hash, ty) {
            if old != ty {
                warn!("Type name hash {:#010x} now refers to a different type", name_hash);
            }
        }
    }

    #[inline]
    pub fn type_for(&self, name_hash: u32) -> Option<TypeId> {
        self.type_names.get(&name_hash).copied()
    }

    pub fn mark_named_static(&mut self, name_hash: u32) {
        self.named_statics.insert(name_hash);
    }

    #[inline]
    pub fn is_named_static(&self, name_hash: u32) -> bool {
        self.named_statics.contains(&name_hash)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
        self.type_names.clear();
        self.named_statics.clear();
    }
}

impl std::fmt::Debug for FastPathRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastPathRegistry")
            .field("bindings", &self.bindings.len())
            .field("type_names", &self.type_names.len())
            .field("named_statics", &self.named_statics.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleTable;
    use crate::hash::member_hash;
    use crate::key::{CallKind, OwnerIdentity};
    use crate::marshal::StructRegistry;

    fn constant(v: i32) -> Handler {
        Box::new(
            move |_: Option<&dyn Any>, _: &[InteropValue<'_>], _: &mut Marshaler<'_>| {
                Some(InteropValue::Int32(v))
            },
        )
    }

    fn run(reg: &FastPathRegistry, key: &FastPathKey) -> Option<InteropValue<'static>> {
        let structs = StructRegistry::new();
        let mut handles = HandleTable::new();
        let mut marshaler = Marshaler::new(&structs, &mut handles);
        reg.get(key).and_then(|handler| handler(None, &[], &mut marshaler))
    }

    fn static_key(member: u32) -> FastPathKey {
        FastPathKey::new(OwnerIdentity::NamedStatic(1), member, CallKind::GetProp, true)
    }

    #[test]
    fn test_insert_overwrites() {
        let mut reg = FastPathRegistry::new();
        let key = static_key(member_hash(b"answer"));
        reg.insert(key, "answer", constant(1));
        reg.insert(key, "answer", constant(2));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.member_name(&key), Some("answer"));
        assert_eq!(run(&reg, &key), Some(InteropValue::Int32(2)));
    }

    #[test]
    fn test_truncated_hash_collision_replaces_other_member() {
        let mut reg = FastPathRegistry::new();
        // same low 24 bits, different full hashes
        let alpha = static_key(0x0100_0042);
        let beta = static_key(0x0200_0042);
        assert_eq!(alpha, beta);

        reg.insert(alpha, "alpha", constant(1));
        reg.insert(beta, "beta", constant(2));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.member_name(&alpha), Some("beta"));
        assert_eq!(run(&reg, &alpha), Some(InteropValue::Int32(2)));
    }

    #[test]
    fn test_keep_existing_skips_bound_keys() {
        let mut reg = FastPathRegistry::new();
        let taken = static_key(member_hash(b"taken"));
        let free = static_key(member_hash(b"free"));
        reg.insert(taken, "taken", constant(1));
        reg.alias_type(7, TypeId::of::<u8>());

        reg.set_keep_existing(true);
        reg.insert(taken, "taken", constant(10));
        reg.insert(free, "free", constant(20));
        reg.alias_type(7, TypeId::of::<u16>());
        reg.set_keep_existing(false);

        assert_eq!(run(&reg, &taken), Some(InteropValue::Int32(1)));
        assert_eq!(run(&reg, &free), Some(InteropValue::Int32(20)));
        assert_eq!(reg.type_for(7), Some(TypeId::of::<u8>()));

        reg.insert(taken, "taken", constant(3));
        assert_eq!(run(&reg, &taken), Some(InteropValue::Int32(3)));
    }

    #[test]
    fn test_clear_drops_caches() {
        let mut reg = FastPathRegistry::new();
        reg.mark_named_static(9);
        reg.alias_type(4, TypeId::of::<u8>());
        reg.clear();
        assert!(!reg.is_named_static(9));
        assert!(reg.type_for(4).is_none());
        assert!(reg.is_empty());
    }
}
