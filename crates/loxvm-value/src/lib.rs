//! loxvm-value - the tagged `Value`, heap object kinds, and the
//! `Chunk`/`OpCode` wire contract a compiled function is expressed in
//! (`spec.md` §3, §4.6, §6).
//!
//! This crate instantiates `loxvm-gc`'s generic `Heap<T: Trace>` as
//! `Heap<Obj>` and provides `Obj::trace`, so `loxvm-gc` itself never needs
//! to know what a `Closure` or `Instance` is.

mod chunk;
mod obj;
mod opcode;
mod strings;
mod value;

pub use chunk::{Chunk, ChunkBuilder, ChunkProto, ConstantProto, FunctionProto};
pub use obj::{
    BoundMethod, Class, Closure, Function, Instance, List, LoxString, Native, NativeContext, NativeFn, Obj,
    Upvalue, UpvalueLocation,
};
pub use opcode::OpCode;
pub use strings::{intern, Strings};
pub use value::Value;

/// The VM's heap, specialized to this crate's object kinds.
pub type Heap = loxvm_gc::Heap<Obj>;
