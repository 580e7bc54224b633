//! Error handling for the `loxvm` driver binary.
//!
//! Wraps the lower layers' errors (`SPEC_FULL.md` §10.1: `loxvm-vm`'s
//! `RuntimeError`, chunk deserialization, I/O, config parsing) behind one
//! enum, and maps each variant to the process exit code `main` returns.

use thiserror::Error;

/// Top-level error type for the `loxvm` binary.
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading/writing a chunk file, config file, or project scaffold failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input file was not a chunk this binary understands.
    #[error("failed to decode chunk: {0}")]
    ChunkDecode(#[from] bincode::Error),

    /// A `loxvm.toml` existed but did not parse.
    #[error("configuration error: {0}")]
    Config(String),

    /// A directory intended for `init` scaffolding was unsuitable.
    #[error("{0}")]
    Validation(String),

    /// The chunk loaded and ran, but the script raised a runtime error.
    #[error("{0}")]
    Runtime(#[from] loxvm_vm::RuntimeError),
}

pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    /// Process exit code for this error, sysexits-flavored the way
    /// `clox`'s `main.c` distinguishes compile-time and runtime failure
    /// (`spec.md` §6): 65 for a chunk that doesn't even parse (the
    /// `EX_DATAERR` analogue of a compile error), 70 for a script that
    /// parsed and ran but raised (`EX_SOFTWARE`), 74 for everything else
    /// that kept the VM from ever starting (`EX_IOERR`).
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ChunkDecode(_) => 65,
            CliError::Runtime(_) => 70,
            CliError::Io(_) | CliError::Config(_) | CliError::Validation(_) => 74,
        }
    }
}
