use thiserror::Error;

/// Formatted the way `original_source/src/vm.c`'s hand-written natives
/// (`appendNative`, `deleteNative`, `lengthNative`, `tostringNative`,
/// `substringNative`) format their own diagnostics (`SPEC_FULL.md` §11
/// point 4): each guards arity and argument types together in a single
/// check and reports the same `"Bad call to X()."` regardless of which
/// part of the check failed, rather than distinguishing arity from type
/// mismatches the way the out-of-scope `clox_gfx.h` graphics macros do. A
/// native converts one of these to a `String` via `Display` and hands it
/// to [`loxvm_value::NativeContext::fail`].
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("Bad call to {name}().")]
    BadCall { name: &'static str },

    #[error("Index {index} is not valid.")]
    BadIndex { index: f64 },

    #[error("Bad index(es) for substring().")]
    BadSubstringIndices,

    #[error("Cannot convert this type to a string.")]
    NotStringConvertible,
}
