use loxvm_gc::Ref;

const MAX_LOAD: f64 = 0.75;

#[derive(Clone)]
enum Entry<V> {
    Empty,
    Tombstone,
    Occupied { key: Ref, hash: u64, value: V },
}

/// An open-addressed hash table from interned-string `Ref` to `V`, linear
/// probing with tombstones, matching `spec.md` §4.1. Used for globals,
/// instance fields, class method tables, and (as `Table<()>`) the intern
/// set.
///
/// `Clone` (where `V: Clone`) exists so `INHERIT` can snapshot a
/// superclass's method table before copying it into a fresh subclass
/// without holding two live borrows into the same heap slot at once.
#[derive(Clone)]
pub struct Table<V> {
    entries: Vec<Entry<V>>,
    /// Live entries plus tombstones; drives the load-factor rehash trigger
    /// the same way clox counts tombstones against capacity.
    count: usize,
    live: usize,
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), count: 0, live: 0 }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Find the slot a `(key, hash)` probe chain resolves to: either the
    /// occupied slot for `key`, or the first empty/tombstone slot suitable
    /// for insertion (remembering the earliest tombstone seen, per
    /// `spec.md` §4.1's tie-break rule).
    fn find_slot(&self, key: Ref, hash: u64) -> usize {
        let capacity = self.capacity();
        let mut index = (hash as usize) % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            match &self.entries[index] {
                Entry::Empty => return tombstone.unwrap_or(index),
                Entry::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Entry::Occupied { key: k, .. } if *k == key => return index,
                Entry::Occupied { .. } => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity() * 2).max(8);
        let mut grown = Self {
            entries: (0..new_capacity).map(|_| Entry::Empty).collect(),
            count: 0,
            live: 0,
        };
        for entry in self.entries.drain(..) {
            if let Entry::Occupied { key, hash, value } = entry {
                grown.set_no_grow(key, hash, value);
            }
        }
        *self = grown;
    }

    fn set_no_grow(&mut self, key: Ref, hash: u64, value: V) -> bool {
        let index = self.find_slot(key, hash);
        let is_new_key = !matches!(self.entries[index], Entry::Occupied { .. });
        if is_new_key && !matches!(self.entries[index], Entry::Tombstone) {
            self.count += 1;
        }
        if is_new_key {
            self.live += 1;
        }
        self.entries[index] = Entry::Occupied { key, hash, value };
        is_new_key
    }

    /// Insert `value` under `key`/`hash`. Returns `true` if `key` was not
    /// already present (a fresh insertion), `false` if it overwrote an
    /// existing entry — a tombstone reused by a later re-insertion counts as
    /// new, per `spec.md` §4.1.
    pub fn set(&mut self, key: Ref, hash: u64, value: V) -> bool {
        if self.entries.is_empty() || (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            self.grow();
        }
        self.set_no_grow(key, hash, value)
    }

    pub fn get(&self, key: Ref, hash: u64) -> Option<&V> {
        if self.entries.is_empty() {
            return None;
        }
        match &self.entries[self.find_slot(key, hash)] {
            Entry::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: Ref, hash: u64) -> Option<&mut V> {
        if self.entries.is_empty() {
            return None;
        }
        let index = self.find_slot(key, hash);
        match &mut self.entries[index] {
            Entry::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Write a tombstone over `key`'s entry. Returns whether it existed.
    pub fn delete(&mut self, key: Ref, hash: u64) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = self.find_slot(key, hash);
        if matches!(self.entries[index], Entry::Occupied { .. }) {
            self.entries[index] = Entry::Tombstone;
            self.live -= 1;
            true
        } else {
            false
        }
    }

    /// Copy every entry of `self` into `dst`, overwriting on key collision.
    /// Used for class inheritance (`spec.md` §4.6 `INHERIT`): the
    /// subclass's method table is seeded with the superclass's.
    pub fn add_all(&self, dst: &mut Table<V>)
    where
        V: Clone,
    {
        for entry in &self.entries {
            if let Entry::Occupied { key, hash, value } = entry {
                dst.set(*key, *hash, value.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ref, &V)> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Occupied { key, value, .. } => Some((*key, value)),
            _ => None,
        })
    }

    /// Remove every entry whose key is not reported live by `is_marked`,
    /// turning it into a tombstone. This is the weak-sweep pass `spec.md`
    /// §4.3 requires for the intern set before the heap's own sweep runs,
    /// so a dead string's `Ref` does not dangle in the table.
    pub fn retain_live(&mut self, is_marked: impl Fn(Ref) -> bool) {
        for entry in &mut self.entries {
            let should_drop = matches!(entry, Entry::Occupied { key, .. } if !is_marked(*key));
            if should_drop {
                *entry = Entry::Tombstone;
                self.live -= 1;
            }
        }
    }

    /// Specialized lookup for interning: scan for an occupied entry whose
    /// key's resolved bytes equal `bytes`, without needing to allocate a
    /// candidate object first (`spec.md` §4.1 `findString`). `resolve` maps
    /// a key `Ref` to its string's byte content.
    pub fn find_string(
        &self,
        bytes: &[u8],
        hash: u64,
        resolve: impl Fn(Ref) -> Option<&[u8]>,
    ) -> Option<Ref> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.capacity();
        let mut index = (hash as usize) % capacity;
        loop {
            match &self.entries[index] {
                Entry::Empty => return None,
                Entry::Occupied { key, hash: h, .. } if *h == hash => {
                    if resolve(*key).is_some_and(|candidate| candidate == bytes) {
                        return Some(*key);
                    }
                }
                Entry::Occupied { .. } | Entry::Tombstone => {}
            }
            index = (index + 1) % capacity;
        }
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}
