use loxvm_gc::Ref;
use loxvm_table::Interner;
use loxvm_util::fnv1a;

use crate::obj::{LoxString, Obj};
use crate::Heap;

/// Ties `loxvm-table`'s generic [`Interner`] to this crate's concrete
/// `Obj::Str`, implementing the canonicalization rule of `spec.md` §4.2:
/// hash the bytes, probe the intern set, and either reuse an existing
/// string's `Ref` or allocate a new one and register it.
pub struct Strings {
    interner: Interner,
}

impl Strings {
    pub fn new() -> Self {
        Self { interner: Interner::new() }
    }

    /// Intern `bytes`, returning the canonical `Ref` to a `LoxString` with
    /// that exact content. Allocates a new object only on a miss.
    pub fn intern(&mut self, heap: &mut Heap, bytes: &[u8]) -> Ref {
        intern(&mut self.interner, heap, bytes)
    }

    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }

    /// Weak-sweep the intern set ahead of [`loxvm_gc::Heap::sweep`]
    /// (`spec.md` §4.3 "string-table sweep"), dropping any string the
    /// tracer did not mark.
    pub fn retain_live(&mut self, heap: &Heap) {
        self.interner.retain_live(|r| heap.is_marked(r));
    }
}

impl Default for Strings {
    fn default() -> Self {
        Self::new()
    }
}

/// Free function form of [`Strings::intern`], for call sites (native
/// implementations, the VM's `ADD`-on-strings path) that already hold a
/// split `&mut Interner`/`&mut Heap` borrow and can't go through the
/// wrapper without conflicting borrows.
pub fn intern(interner: &mut Interner, heap: &mut Heap, bytes: &[u8]) -> Ref {
    let hash = fnv1a(bytes);
    if let Some(existing) = interner.find(bytes, hash, |r| match heap.get(r) {
        Some(Obj::Str(s)) => Some(s.bytes.as_slice()),
        _ => None,
    }) {
        return existing;
    }
    let string = LoxString { bytes: bytes.to_vec(), hash };
    let size = std::mem::size_of::<LoxString>() + string.bytes.len();
    let r = heap
        .allocate(Obj::Str(string), size)
        .expect("heap exhausted while interning a string");
    interner.insert(r, hash);
    r
}
