use loxvm_gc::Ref;

/// One activation record (`spec.md` §3 GLOSSARY "Frame", §4.5): which
/// closure is executing, where its instruction pointer sits inside that
/// closure's chunk, and where its locals begin on the shared value stack.
pub(crate) struct CallFrame {
    pub closure: Ref,
    pub ip: usize,
    pub slots_base: usize,
}
