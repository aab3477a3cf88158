//! The open-addressed hash table (spec.md §4.2).
//!
//! Keys are interned string handles, compared (and probed) by the
//! precomputed FNV-1a hash plus index equality -- interning already
//! guarantees at most one `LoxString` per distinct byte sequence, so two
//! equal keys are always the same `ObjRef`. Used for globals, class
//! method tables and instance field tables.

use crate::object::{LoxString, ObjRef};

const MAX_LOAD_FACTOR: f64 = 0.75;
const MIN_CAPACITY: usize = 8;

#[derive(Clone)]
enum Slot<V> {
    Empty,
    Tombstone,
    Occupied { key: ObjRef<LoxString>, hash: u32, value: V },
}

/// An open-addressed, linear-probing table keyed by interned string
/// handles.
///
/// Deletions leave tombstones so probe sequences for other keys stay
/// intact; tombstones count toward the load factor (so they eventually
/// get reclaimed by a resize) but are reused immediately by a subsequent
/// insert that lands on one.
#[derive(Clone)]
pub struct Table<V> {
    entries: Vec<Slot<V>>,
    count: usize, // occupied + tombstones
    len: usize,   // occupied only
}

impl<V: Clone> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Table<V> {
    pub fn new() -> Self {
        Table {
            entries: Vec::new(),
            count: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Find the slot for `key`: the first matching occupied entry, or
    /// else the first tombstone/empty slot seen along the probe
    /// sequence, whichever is reached first.
    fn find_slot(entries: &[Slot<V>], key: ObjRef<LoxString>, hash: u32) -> usize {
        let cap = entries.len();
        let mut index = (hash as usize) % cap;
        let mut tombstone: Option<usize> = None;
        loop {
            match &entries[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied { key: k, .. } if *k == key => return index,
                Slot::Occupied { .. } => {}
            }
            index = (index + 1) % cap;
        }
    }

    fn grow(&mut self, new_capacity: usize) {
        let mut new_entries: Vec<Slot<V>> = (0..new_capacity).map(|_| Slot::Empty).collect();
        let mut new_len = 0;
        for slot in self.entries.drain(..) {
            if let Slot::Occupied { key, hash, value } = slot {
                let index = Self::find_slot(&new_entries, key, hash);
                new_entries[index] = Slot::Occupied { key, hash, value };
                new_len += 1;
            }
        }
        self.entries = new_entries;
        self.count = new_len;
        self.len = new_len;
    }

    fn ensure_capacity(&mut self) {
        if self.capacity() == 0 {
            self.grow(MIN_CAPACITY);
            return;
        }
        if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD_FACTOR {
            self.grow(self.capacity() * 2);
        }
    }

    /// Insert or overwrite `key` -> `value`. Returns `true` if this was a
    /// new key (matching clox's `tableSet` return convention, used by
    /// `DEFINE_GLOBAL` vs. reassignment checks).
    pub fn set(&mut self, key: ObjRef<LoxString>, hash: u32, value: V) -> bool {
        self.ensure_capacity();
        let index = Self::find_slot(&self.entries, key, hash);
        let is_new = !matches!(self.entries[index], Slot::Occupied { .. });
        if is_new && !matches!(self.entries[index], Slot::Tombstone) {
            self.count += 1;
        }
        if is_new {
            self.len += 1;
        }
        self.entries[index] = Slot::Occupied { key, hash, value };
        is_new
    }

    pub fn get(&self, key: ObjRef<LoxString>, hash: u32) -> Option<&V> {
        if self.capacity() == 0 {
            return None;
        }
        let index = Self::find_slot(&self.entries, key, hash);
        match &self.entries[index] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: ObjRef<LoxString>, hash: u32) -> Option<&mut V> {
        if self.capacity() == 0 {
            return None;
        }
        let index = Self::find_slot(&self.entries, key, hash);
        match &mut self.entries[index] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn delete(&mut self, key: ObjRef<LoxString>, hash: u32) -> bool {
        if self.capacity() == 0 {
            return false;
        }
        let index = Self::find_slot(&self.entries, key, hash);
        if matches!(self.entries[index], Slot::Occupied { .. }) {
            self.entries[index] = Slot::Tombstone;
            self.len -= 1;
            true
        } else {
            false
        }
    }

    /// Copy every entry of `other` into `self`, overwriting duplicates.
    /// Used by `OP_INHERIT` to copy a superclass's methods into a
    /// subclass's table at class-creation time.
    pub fn copy_from(&mut self, other: &Table<V>) {
        for (key, hash, value) in other.iter() {
            self.set(key, hash, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjRef<LoxString>, u32, &V)> {
        self.entries.iter().filter_map(|slot| match slot {
            Slot::Occupied { key, hash, value } => Some((*key, *hash, value)),
            _ => None,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, _, v)| v)
    }
}
