use thiserror::Error;

/// Failures the heap itself can raise. Most `Heap` operations are infallible
/// (`get`/`get_mut` return `Option` for a stale or out-of-range `Ref`); this
/// enum exists for the handful of conditions that are a hard invariant
/// violation rather than an expected "already collected" outcome.
#[derive(Debug, Error)]
pub enum GcError {
    /// The slab's index space (`u32`) is exhausted. In practice this
    /// requires billions of live+freed allocations in one VM instance.
    #[error("heap exhausted: more than u32::MAX objects have been allocated")]
    HeapExhausted,
}
