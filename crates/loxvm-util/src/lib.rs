//! loxvm-util - foundational types shared by every loxvm crate.
//!
//! Nothing in here knows about bytecode, values, or the heap. It exists so
//! that `loxvm-gc`, `loxvm-value`, and `loxvm-table` can share a hashing
//! strategy and a couple of numeric constants without depending on one
//! another.

pub use rustc_hash::{FxHashMap, FxHashSet};

/// FNV-1a over raw bytes.
///
/// This is the hash clox uses for string content (`hashString` in
/// `object.c`), and it is what `loxvm-table`'s interner keys on. FNV-1a is
/// not cryptographically strong, but it is fast and has good avalanche
/// behavior for short identifier-like strings, which is the dominant case
/// for a scripting language's string pool.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Growth factor applied to the GC's next-collection threshold after a
/// cycle completes (`spec.md` §4.3): `threshold = max(live_bytes * FACTOR,
/// floor)`.
pub const GC_GROWTH_FACTOR: usize = 2;

/// Minimum GC threshold, in bytes, established at VM startup.
pub const GC_INITIAL_THRESHOLD: usize = 1024 * 1024;

/// Maximum live call frames before a `"Stack overflow."` runtime error.
pub const FRAMES_MAX: usize = 64;

/// Maximum live value-stack slots (`FRAMES_MAX` frames times a generous
/// per-frame slot budget, matching clox's `STACK_MAX`).
pub const STACK_MAX: usize = FRAMES_MAX * 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_is_deterministic() {
        assert_eq!(fnv1a(b"hello"), fnv1a(b"hello"));
    }

    #[test]
    fn fnv1a_distinguishes_distinct_content() {
        assert_ne!(fnv1a(b"hello"), fnv1a(b"world"));
    }

    #[test]
    fn fnv1a_empty_string_is_offset_basis() {
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
    }

    #[quickcheck_macros::quickcheck]
    fn fnv1a_is_a_pure_function_of_content(bytes: Vec<u8>) -> bool {
        fnv1a(&bytes) == fnv1a(&bytes.clone())
    }
}
