// Copyright 2024 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::hashkey::HashKey;

#[derive(Clone)]
struct Entry<V> {
    hash_key: HashKey,
    data: Option<V>,
}

impl<V> Entry<V> {
    fn empty() -> Self {
        Self { hash_key: 0, data: None }
    }

    fn is_free(&self) -> bool {
        self.data.is_none()
    }
}

/// An open-addressed (linear probing), power-of-two sized hash table with
/// no resizing -- the caller is responsible for sizing it so the load
/// factor stays reasonable, matching `open_address_hash_table.h`.
///
/// Entries are never evicted implicitly; `store` always succeeds as long
/// as the table is not full (linear probing wraps around once).
pub struct OpenAddressHashTable<V> {
    entries: Vec<Entry<V>>,
    mask: usize,
    count: usize,
}

impl<V: Clone> OpenAddressHashTable<V> {
    /// Creates a table with `1 << bit_size` slots.
    pub fn new(bit_size: u32) -> Self {
        let size = 1usize << bit_size;

        Self {
            entries: vec![Entry::empty(); size],
            mask: size - 1,
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.entries.len()
    }

    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = Entry::empty();
        }
        self.count = 0;
    }

    /// Finds the slot a key would occupy, whether or not it is currently
    /// stored there. Returns `None` only if the table is full and every
    /// slot is occupied by a different key (the table should never reach
    /// this state in practice if the caller keeps load factor reasonable).
    fn probe(&self, hash_key: HashKey) -> Option<usize> {
        let start = (hash_key as usize) & self.mask;

        for step in 0..self.entries.len() {
            let index = (start + step) & self.mask;
            let entry = &self.entries[index];

            if entry.is_free() || entry.hash_key == hash_key {
                return Some(index);
            }
        }

        None
    }

    pub fn lookup(&self, hash_key: HashKey) -> Option<&V> {
        let index = self.probe(hash_key)?;
        let entry = &self.entries[index];

        if entry.is_free() || entry.hash_key != hash_key {
            None
        } else {
            entry.data.as_ref()
        }
    }

    pub fn lookup_mut(&mut self, hash_key: HashKey) -> Option<&mut V> {
        let index = self.probe(hash_key)?;
        let entry = &mut self.entries[index];

        if entry.is_free() || entry.hash_key != hash_key {
            None
        } else {
            entry.data.as_mut()
        }
    }

    /// Stores `data` under `hash_key`, overwriting whatever was already
    /// stored for that key. Returns `false` if the table was full and
    /// `hash_key` was not already present.
    pub fn store(&mut self, hash_key: HashKey, data: V) -> bool {
        match self.probe(hash_key) {
            Some(index) => {
                let entry = &mut self.entries[index];
                if entry.is_free() {
                    self.count += 1;
                }
                entry.hash_key = hash_key;
                entry.data = Some(data);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_lookup() {
        let mut tt: OpenAddressHashTable<u32> = OpenAddressHashTable::new(4);

        assert!(tt.store(123, 7));
        assert_eq!(tt.lookup(123), Some(&7));
        assert_eq!(tt.lookup(456), None);
        assert_eq!(tt.count(), 1);
    }

    #[test]
    fn overwrite_same_key() {
        let mut tt: OpenAddressHashTable<u32> = OpenAddressHashTable::new(4);

        tt.store(123, 7);
        tt.store(123, 9);

        assert_eq!(tt.lookup(123), Some(&9));
        assert_eq!(tt.count(), 1);
    }

    #[test]
    fn linear_probing_handles_collisions() {
        let mut tt: OpenAddressHashTable<u32> = OpenAddressHashTable::new(2);

        // four slots; these two keys collide on the low bits.
        tt.store(0, 1);
        tt.store(4, 2);

        assert_eq!(tt.lookup(0), Some(&1));
        assert_eq!(tt.lookup(4), Some(&2));
    }

    #[test]
    fn clear_resets_table() {
        let mut tt: OpenAddressHashTable<u32> = OpenAddressHashTable::new(4);

        tt.store(1, 1);
        tt.clear();

        assert_eq!(tt.count(), 0);
        assert_eq!(tt.lookup(1), None);
    }

    #[test]
    fn full_table_rejects_new_keys() {
        let mut tt: OpenAddressHashTable<u32> = OpenAddressHashTable::new(1);

        assert!(tt.store(0, 1));
        assert!(tt.store(1, 2));
        assert!(tt.is_full());

        // a third distinct key cannot be placed.
        assert!(!tt.store(2, 3));

        // but re-storing an existing key still succeeds.
        assert!(tt.store(0, 10));
    }
}
