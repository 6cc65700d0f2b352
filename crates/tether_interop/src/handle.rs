//! Handle table - revocable script references to host objects
//!
//! Handles are opaque non-zero integers. They are issued in increasing order
//! starting at 1 and never reissued, so a released handle can never resolve to
//! another object later.
//!
//! The table is owned by the dispatch thread. Objects are held as `Rc`, which
//! makes the table `!Send`: registering from another thread does not compile.

use crate::error::InteropError;
use crate::key::script_type_name;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroI32;
use std::rc::Rc;

/// Host object shared with scripts.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a value so it can be handed to scripts.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Opaque script-side reference to a host object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroI32);

impl Handle {
    /// Wrap a raw handle; only positive values are valid.
    #[inline]
    pub fn new(raw: i32) -> Option<Self> {
        if raw > 0 {
            NonZeroI32::new(raw).map(Self)
        } else {
            None
        }
    }

    #[inline]
    pub fn get(self) -> i32 {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for Handle {
    type Error = InteropError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Handle::new(raw).ok_or(InteropError::InvalidHandle(raw))
    }
}

/// A live table entry.
pub struct HandleEntry {
    object: Rc<dyn Any>,
    owner: TypeId,
    type_name: &'static str,
}

impl HandleEntry {
    /// The object as stored (`RefCell<T>` behind `dyn Any`).
    #[inline]
    pub fn object(&self) -> &Rc<dyn Any> {
        &self.object
    }

    /// `TypeId` of the wrapped `T`, used as the dispatch owner identity.
    #[inline]
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for HandleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleEntry")
            .field("type_name", &self.type_name)
            .field("strong_count", &Rc::strong_count(&self.object))
            .finish()
    }
}

/// Integer-keyed table of host objects visible to scripts.
#[derive(Debug)]
pub struct HandleTable {
    entries: FxHashMap<Handle, HandleEntry>,
    next: i32,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            next: 1,
        }
    }

    /// Retain `object` and issue a fresh handle for it.
    pub fn register<T: 'static>(&mut self, object: Shared<T>) -> Result<Handle, InteropError> {
        self.register_named(object, script_type_name::<T>())
    }

    /// Like [`register`](Self::register) with an explicit script-facing type name.
    pub fn register_named<T: 'static>(
        &mut self,
        object: Shared<T>,
        type_name: &'static str,
    ) -> Result<Handle, InteropError> {
        let handle = Handle::new(self.next).ok_or(InteropError::HandlesExhausted {
            issued: i32::MAX,
        })?;
        // i32::MAX is issued once; afterwards `next` stays at 0 and every
        // further registration fails instead of wrapping.
        self.next = self.next.checked_add(1).unwrap_or(0);

        self.entries.insert(
            handle,
            HandleEntry {
                object,
                owner: TypeId::of::<T>(),
                type_name,
            },
        );
        Ok(handle)
    }

    /// Look up the object behind `handle`.
    #[inline]
    pub fn resolve(&self, handle: Handle) -> Option<Rc<dyn Any>> {
        self.entries.get(&handle).map(|entry| Rc::clone(&entry.object))
    }

    /// Look up and downcast. Wrong type or stale handle yields `None`.
    pub fn resolve_as<T: 'static>(&self, handle: Handle) -> Option<Shared<T>> {
        let entry = self.entries.get(&handle)?;
        if entry.owner != TypeId::of::<T>() {
            return None;
        }
        Rc::clone(&entry.object).downcast::<RefCell<T>>().ok()
    }

    #[inline]
    pub fn entry(&self, handle: Handle) -> Option<&HandleEntry> {
        self.entries.get(&handle)
    }

    #[inline]
    pub fn type_name(&self, handle: Handle) -> Option<&'static str> {
        self.entries.get(&handle).map(|entry| entry.type_name)
    }

    /// Drop the table's reference. Returns `false` for unknown handles.
    pub fn release(&mut self, handle: Handle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every entry. The counter is not rewound.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        value: i32,
    }

    #[test]
    fn test_handles_start_at_one() {
        let mut table = HandleTable::new();
        let a = table.register(shared(Probe { value: 1 })).unwrap();
        let b = table.register(shared(Probe { value: 2 })).unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resolve_release_lifecycle() {
        let mut table = HandleTable::new();
        let obj = shared(Probe { value: 7 });
        let handle = table.register(Rc::clone(&obj)).unwrap();

        let resolved = table.resolve_as::<Probe>(handle).unwrap();
        assert!(Rc::ptr_eq(&resolved, &obj));
        assert_eq!(resolved.borrow().value, 7);

        assert!(table.release(handle));
        assert!(table.resolve(handle).is_none());
        assert!(table.resolve_as::<Probe>(handle).is_none());
        assert!(!table.release(handle));
    }

    #[test]
    fn test_released_handles_are_not_reissued() {
        let mut table = HandleTable::new();
        let first = table.register(shared(Probe { value: 1 })).unwrap();
        table.release(first);
        let second = table.register(shared(Probe { value: 2 })).unwrap();
        assert_ne!(first, second);
        assert!(table.resolve(first).is_none());
    }

    #[test]
    fn test_wrong_type_does_not_resolve() {
        let mut table = HandleTable::new();
        let handle = table.register(shared(Probe { value: 1 })).unwrap();
        assert!(table.resolve_as::<String>(handle).is_none());
        assert_eq!(table.type_name(handle), Some("Probe"));
    }

    #[test]
    fn test_release_drops_reference() {
        let mut table = HandleTable::new();
        let obj = shared(Probe { value: 1 });
        let handle = table.register(Rc::clone(&obj)).unwrap();
        assert_eq!(Rc::strong_count(&obj), 2);
        table.release(handle);
        assert_eq!(Rc::strong_count(&obj), 1);
    }

    #[test]
    fn test_exhaustion_never_wraps() {
        let mut table = HandleTable::new();
        table.next = i32::MAX;
        let last = table.register(shared(Probe { value: 1 })).unwrap();
        assert_eq!(last.get(), i32::MAX);
        assert!(matches!(
            table.register(shared(Probe { value: 2 })),
            Err(InteropError::HandlesExhausted { .. })
        ));
    }

    #[test]
    fn test_invalid_raw_handles() {
        assert!(Handle::new(0).is_none());
        assert!(Handle::new(-5).is_none());
        assert_eq!(Handle::try_from(0), Err(InteropError::InvalidHandle(0)));
    }
}
