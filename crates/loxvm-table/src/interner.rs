use loxvm_gc::Ref;

use crate::Table;

/// The VM's intern set (`spec.md` §4.2): a `Table<()>` used as a set of
/// canonical string `Ref`s, keyed by content hash and resolved to bytes on
/// collision through a caller-supplied accessor (the interner itself never
/// touches a heap).
pub struct Interner {
    set: Table<()>,
}

impl Interner {
    pub fn new() -> Self {
        Self { set: Table::new() }
    }

    /// Look up a string with these exact bytes among already-interned
    /// strings. Returns its canonical `Ref` if one exists.
    pub fn find(&self, bytes: &[u8], hash: u64, resolve: impl Fn(Ref) -> Option<&[u8]>) -> Option<Ref> {
        self.set.find_string(bytes, hash, resolve)
    }

    /// Register `key` (assumed not already present — callers check via
    /// [`Interner::find`] first) as the canonical `Ref` for its content.
    pub fn insert(&mut self, key: Ref, hash: u64) {
        self.set.set(key, hash, ());
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Drop entries for strings the collector did not mark, per `spec.md`
    /// §4.3's "string-table sweep": this must run after tracing but before
    /// [`loxvm_gc::Heap::sweep`], or the set would keep a freed `Ref`.
    pub fn retain_live(&mut self, is_marked: impl Fn(Ref) -> bool) {
        self.set.retain_live(is_marked);
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_none_on_empty_interner() {
        let interner = Interner::new();
        assert!(interner.find(b"hi", 42, |_| None).is_none());
    }

    #[test]
    fn insert_then_find_round_trips() {
        let mut interner = Interner::new();
        let key = Ref::synthetic(7);
        interner.insert(key, 42);
        let found = interner.find(b"hi", 42, |r| if r == key { Some(&b"hi"[..]) } else { None });
        assert_eq!(found, Some(key));
    }

    #[test]
    fn retain_live_drops_collected_strings() {
        let mut interner = Interner::new();
        let alive = Ref::synthetic(1);
        let dead = Ref::synthetic(2);
        interner.insert(alive, 1);
        interner.insert(dead, 2);
        interner.retain_live(|r| r == alive);
        assert_eq!(interner.len(), 1);
    }
}
