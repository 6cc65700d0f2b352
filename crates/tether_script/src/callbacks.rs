//! Script callbacks held by the host
//!
//! Ids are 1-based slot indices. Freed slots are reused, lowest first.

use crate::error::ScriptError;

#[derive(Debug)]
pub struct CallbackTable<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
    capacity: usize,
}

impl<T> CallbackTable<T> {
    /// Ids are `i32`, so capacity is clamped to `i32::MAX`.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity: capacity.min(i32::MAX as usize),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn register(&mut self, callback: T) -> Result<i32, ScriptError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < self.capacity => {
                self.slots.push(None);
                self.slots.len() - 1
            }
            None => return Err(ScriptError::CallbacksFull(self.capacity)),
        };
        self.slots[index] = Some(callback);
        Ok(index as i32 + 1)
    }

    fn index(&self, id: i32) -> Option<usize> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        (index < self.slots.len()).then_some(index)
    }

    pub fn get(&self, id: i32) -> Option<&T> {
        self.slots[self.index(id)?].as_ref()
    }

    pub fn remove(&mut self, id: i32) -> bool {
        let Some(index) = self.index(id) else {
            return false;
        };
        if self.slots[index].take().is_none() {
            return false;
        }
        self.free.push(index);
        // lowest slot first
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        true
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_reuse_slots() {
        let mut table = CallbackTable::new(8);
        let a = table.register("a").unwrap();
        let b = table.register("b").unwrap();
        let c = table.register("c").unwrap();
        assert_eq!((a, b, c), (1, 2, 3));

        assert!(table.remove(b));
        assert!(table.remove(a));
        assert_eq!(table.len(), 1);
        assert_eq!(table.register("d").unwrap(), 1);
        assert_eq!(table.register("e").unwrap(), 2);
        assert_eq!(table.get(2), Some(&"e"));
    }

    #[test]
    fn test_full_table() {
        let mut table = CallbackTable::new(2);
        table.register(1).unwrap();
        table.register(2).unwrap();
        assert!(matches!(table.register(3), Err(ScriptError::CallbacksFull(2))));
    }

    #[test]
    fn test_capacity_fits_i32_ids() {
        let table: CallbackTable<u8> = CallbackTable::new(usize::MAX);
        assert_eq!(table.capacity(), i32::MAX as usize);
        assert_eq!(CallbackTable::<u8>::new(16).capacity(), 16);
    }

    #[test]
    fn test_unknown_ids() {
        let mut table: CallbackTable<u8> = CallbackTable::new(4);
        assert!(table.get(0).is_none());
        assert!(table.get(-3).is_none());
        assert!(!table.remove(1));
        let id = table.register(9).unwrap();
        assert!(table.remove(id));
        assert!(!table.remove(id));
        assert!(table.is_empty());
    }
}
