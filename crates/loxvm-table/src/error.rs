use thiserror::Error;

/// Reserved for future use. `Table`/`Interner` operations are infallible
/// today (`spec.md` §4.1 specifies `get`/`set`/`delete` as returning
/// `Option`/`bool`, never a fallible result), but every other crate in this
/// workspace carries its own error enum and this one is kept so a caller can
/// write `Result<T, TableError>` at a seam without reaching across crates
/// for an unrelated error type.
#[derive(Debug, Error)]
pub enum TableError {}
