// lute-vm - Bytecode compiler and virtual machine for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Open-addressed hash table keyed by interned strings, and the interner
//! built on top of it.
//!
//! Interned keys make key comparison a pointer check; the raw
//! `find_string` lookup exists so the interner can deduplicate before
//! allocating.

use std::rc::Rc;

use crate::value::{LuteString, Value};

/// Capacity of the first allocation; growth doubles from here.
const INITIAL_CAPACITY: usize = 8;

/// FNV-1a over the string's bytes.
pub fn hash_string(text: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in text.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

#[derive(Debug, Clone)]
struct Entry {
    key: Option<Rc<LuteString>>,
    value: Value,
}

impl Entry {
    /// A vacated slot: key gone, sentinel `true` so probe chains continue.
    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !matches!(self.value, Value::Nil)
    }
}

/// An open-addressed hash table with linear probing and tombstone deletion.
///
/// Capacity is always a power of two and the live-plus-tombstone count is
/// kept at or below 3/4 of it.
#[derive(Debug, Default)]
pub struct Table {
    /// Live entries plus tombstones.
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            count: 0,
            entries: Vec::new(),
        }
    }

    /// Look up a key.
    pub fn get(&self, key: &Rc<LuteString>) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = &self.entries[self.find_slot(key)];
        entry.key.as_ref().map(|_| entry.value.clone())
    }

    /// Insert or update a key. Returns true when the key was not present.
    ///
    /// Inserting may reuse a tombstone left by an earlier deletion.
    pub fn set(&mut self, key: Rc<LuteString>, value: Value) -> bool {
        if (self.count + 1) * 4 > self.entries.len() * 3 {
            self.grow();
        }

        let slot = self.find_slot(&key);
        let is_new = self.entries[slot].key.is_none();
        if is_new && !self.entries[slot].is_tombstone() {
            self.count += 1;
        }
        self.entries[slot] = Entry {
            key: Some(key),
            value,
        };
        is_new
    }

    /// Remove a key, leaving a tombstone. Returns true when it was present.
    pub fn delete(&mut self, key: &Rc<LuteString>) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let slot = self.find_slot(key);
        if self.entries[slot].key.is_none() {
            return false;
        }
        self.entries[slot] = Entry {
            key: None,
            value: Value::Bool(true),
        };
        true
    }

    /// Raw lookup by bytes and hash, for interning: returns the canonical
    /// key if an equal string is already present.
    pub fn find_string(&self, text: &str, hash: u32) -> Option<Rc<LuteString>> {
        if self.entries.is_empty() {
            return None;
        }
        let mask = self.entries.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            match &self.entries[index].key {
                Some(key) => {
                    if key.hash == hash && &*key.text == text {
                        return Some(Rc::clone(key));
                    }
                }
                None => {
                    if !self.entries[index].is_tombstone() {
                        return None;
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    /// Find the slot for a key: its entry if present, otherwise the first
    /// reusable slot (an earlier tombstone wins over the trailing empty).
    fn find_slot(&self, key: &Rc<LuteString>) -> usize {
        let mask = self.entries.len() - 1;
        let mut index = key.hash as usize & mask;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &self.entries[index];
            match &entry.key {
                Some(existing) => {
                    if Rc::ptr_eq(existing, key) {
                        return index;
                    }
                }
                None => {
                    if entry.is_tombstone() {
                        if tombstone.is_none() {
                            tombstone = Some(index);
                        }
                    } else {
                        return tombstone.unwrap_or(index);
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    /// Double the capacity and rehash, discarding tombstones.
    fn grow(&mut self) {
        let capacity = if self.entries.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.entries.len() * 2
        };
        let old = std::mem::replace(
            &mut self.entries,
            vec![
                Entry {
                    key: None,
                    value: Value::Nil,
                };
                capacity
            ],
        );

        self.count = 0;
        for entry in old {
            if let Some(key) = entry.key {
                let slot = self.find_slot(&key);
                self.entries[slot] = Entry {
                    key: Some(key),
                    value: entry.value,
                };
                self.count += 1;
            }
        }
    }
}

/// The string interner: a table whose keys are the canonical allocations.
///
/// Two equal strings interned through the same `Strings` are the same `Rc`,
/// which is what lets `Value` compare strings by pointer. Each VM owns its
/// own interner; independent VMs share nothing.
#[derive(Debug, Default)]
pub struct Strings {
    table: Table,
}

impl Strings {
    /// Create a new empty interner.
    pub fn new() -> Self {
        Self {
            table: Table::new(),
        }
    }

    /// Return the canonical string for `text`, allocating it on first sight.
    pub fn intern(&mut self, text: &str) -> Rc<LuteString> {
        let hash = hash_string(text);
        if let Some(existing) = self.table.find_string(text, hash) {
            return existing;
        }

        let string = Rc::new(LuteString {
            text: text.into(),
            hash,
        });
        self.table.set(Rc::clone(&string), Value::Nil);
        string
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(strings: &mut Strings, text: &str) -> Rc<LuteString> {
        strings.intern(text)
    }

    #[test]
    fn test_set_and_get() {
        let mut strings = Strings::new();
        let mut table = Table::new();
        let a = key(&mut strings, "a");

        assert!(table.set(Rc::clone(&a), Value::Number(1.0)));
        assert_eq!(table.get(&a), Some(Value::Number(1.0)));

        // Updating an existing key is not "new".
        assert!(!table.set(Rc::clone(&a), Value::Number(2.0)));
        assert_eq!(table.get(&a), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_missing_key() {
        let mut strings = Strings::new();
        let table = Table::new();
        assert_eq!(table.get(&key(&mut strings, "missing")), None);
    }

    #[test]
    fn test_delete_leaves_reusable_tombstone() {
        let mut strings = Strings::new();
        let mut table = Table::new();
        let a = key(&mut strings, "a");
        let b = key(&mut strings, "b");

        table.set(Rc::clone(&a), Value::Number(1.0));
        table.set(Rc::clone(&b), Value::Number(2.0));
        assert!(table.delete(&a));
        assert!(!table.delete(&a));
        assert_eq!(table.get(&a), None);

        // Probes continue past the tombstone.
        assert_eq!(table.get(&b), Some(Value::Number(2.0)));

        // Reinsertion reports the key as new again.
        assert!(table.set(Rc::clone(&a), Value::Number(3.0)));
        assert_eq!(table.get(&a), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_growth_keeps_entries() {
        let mut strings = Strings::new();
        let mut table = Table::new();
        let keys: Vec<_> = (0..64).map(|i| key(&mut strings, &format!("k{}", i))).collect();

        for (i, k) in keys.iter().enumerate() {
            table.set(Rc::clone(k), Value::Number(i as f64));
        }
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(table.get(k), Some(Value::Number(i as f64)));
        }
    }

    #[test]
    fn test_intern_returns_identical_allocation() {
        let mut strings = Strings::new();
        let a = strings.intern("shared");
        let b = strings.intern("shared");
        assert!(Rc::ptr_eq(&a, &b));

        let c = strings.intern("other");
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_separate_interners_share_nothing() {
        let mut first = Strings::new();
        let mut second = Strings::new();
        let a = first.intern("same");
        let b = second.intern("same");
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_find_string_matches_by_bytes() {
        let mut strings = Strings::new();
        let a = strings.intern("needle");
        let found = strings.table.find_string("needle", hash_string("needle"));
        assert!(matches!(found, Some(f) if Rc::ptr_eq(&f, &a)));
        assert!(strings.table.find_string("nope", hash_string("nope")).is_none());
    }
}
