//! loxvm-native - the native-function calling convention (`spec.md` §4.7)
//! and the concrete native set `original_source/src/vm.c` ships beyond the
//! out-of-scope graphics/IO surface (`SPEC_FULL.md` §11 point 1).
//!
//! A native is a plain Rust `fn` matching [`loxvm_value::NativeFn`]: it
//! reads its arguments as a flat slice (no implicit receiver, even when
//! called as a method-shaped `list.append(x)` — `SPEC_FULL.md` §11 point
//! 2), and signals failure by calling [`loxvm_value::NativeContext::fail`]
//! after composing its own diagnostic, matching `vm.c`'s hand-written
//! natives (`appendNative`, `deleteNative`, …), each of which combines
//! its arity and argument-type guard into a single `"Bad call to X()."`.

mod builtins;
mod error;
mod macros;

pub use error::NativeError;

use loxvm_value::Native;

/// The complete built-in native set, in the order `defineNative` installs
/// them at VM startup. `loxvm-vm` owns actually binding these into globals
/// (see `SPEC_FULL.md` §11 point 5 for why that sequencing matters); this
/// crate only supplies the implementations.
pub fn builtins() -> &'static [Native] {
    &[
        Native { name: "append", function: builtins::append },
        Native { name: "delete", function: builtins::delete },
        Native { name: "length", function: builtins::length },
        Native { name: "tostring", function: builtins::tostring },
        Native { name: "substring", function: builtins::substring },
        Native { name: "clock", function: builtins::clock },
    ]
}
