//! loxvm-vm - call-frame machinery, the upvalue engine, and the bytecode
//! dispatch loop: the heart of the virtual machine (`spec.md` §4.4-§4.6).
//!
//! [`Vm`] is the embedding API (`spec.md` §6): construct one, hand it a
//! [`loxvm_value::ChunkProto`] (produced by a front end or, in tests, by
//! [`loxvm_value::ChunkBuilder`]), and call [`Vm::interpret`].

mod error;
mod frame;
mod vm;

pub use error::{InterpretResult, RuntimeError, RuntimeErrorKind};
pub use vm::{Vm, VmConfig};
