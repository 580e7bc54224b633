//! Subcommand implementations for the `loxvm` binary.

pub mod init;
pub mod run;
