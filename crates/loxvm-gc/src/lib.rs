//! loxvm-gc - a precise, non-moving, tri-color mark-and-sweep collector.
//!
//! This crate owns exactly the mechanics of garbage collection: an object
//! slab (the "allocation list" of `spec.md` §3), a mark bit per slot, a gray
//! worklist, and the two-phase mark/sweep cycle. It does not know anything
//! about `Value`, `Chunk`, or the VM's call stack — those live in
//! `loxvm-value` and `loxvm-vm`. `Heap<T>` is generic over the payload type
//! `T: Trace`; `loxvm-value` instantiates it as `Heap<Obj>`.
//!
//! ## Why a generational slab instead of raw pointers
//!
//! A textbook tracing collector (clox's `memory.c`) links objects through an
//! intrusive `next` pointer and frees them with `free()`. Rust does not make
//! that pattern safe without `unsafe` sprinkled through every object kind,
//! and cyclic references (a `Class`'s methods reference `Closure`s that can
//! reference `Instance`s of that very `Class`) rule out reference counting.
//! Instead, `Heap<T>` is a slab of slots indexed by a `Ref` (an index paired
//! with a generation counter). This is the same trick `slotmap`/
//! `generational-arena`-style arenas use, applied here by hand so the mark
//! bit, gray worklist, and byte-accounted GC trigger stay part of the same
//! data structure the spec describes. `Ref` equality is index-and-generation
//! equality, which is exactly reference identity (`spec.md` §3's object
//! equality rule), and a stale `Ref` into a freed-and-reused slot is caught
//! by the generation mismatch rather than aliasing a live object.
//!
//! ## Cycle protocol
//!
//! 1. The owner (`loxvm-vm`) calls [`Heap::mark`] for every root value:
//!    every live stack slot, every frame's closure, every open upvalue,
//!    every global, the intern set (see caveat below), and any pinned
//!    strings. Marking a previously-white object turns it gray and pushes
//!    it onto the heap's worklist.
//! 2. The owner calls [`Heap::trace_references`], which drains the gray
//!    worklist, calling [`Trace::trace`] on each object to discover and mark
//!    its children (turning the object black), until the worklist is empty.
//! 3. Before sweeping, the owner must remove unmarked entries from any
//!    weak-valued structures (the string intern set) — `loxvm-table`
//!    provides `Table::retain_live` for this.
//! 4. The owner calls [`Heap::sweep`], which frees every slot whose object
//!    was never marked and clears the mark bit on every survivor, readying
//!    the heap for the next cycle.

mod error;
mod heap;
mod reference;
mod trace;

pub use error::GcError;
pub use heap::{Heap, SweepStats};
pub use reference::Ref;
pub use trace::Trace;
