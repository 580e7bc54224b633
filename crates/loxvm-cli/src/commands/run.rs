//! `run` command: load a serialized chunk and execute it through
//! `loxvm-vm`, exactly the job `SPEC_FULL.md` §0 assigns `loxvm-cli`.

use std::path::PathBuf;

use loxvm_value::ChunkProto;
use loxvm_vm::{InterpretResult, Vm, VmConfig};

use crate::error::{CliError, Result};

/// Arguments for the `run` command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Path to a `bincode`-serialized `ChunkProto`.
    pub chunk: PathBuf,
    /// Merged VM tuning limits (`SPEC_FULL.md` §10.3).
    pub vm_config: VmConfig,
}

/// Load `args.chunk`, run it to completion, and map the outcome onto a
/// process exit code the way `clox`'s `main` distinguishes compile and
/// runtime failure (`spec.md` §6): 0 on success, 65 if the file isn't a
/// well-formed chunk, 70 if the script itself raised.
pub fn run(args: RunArgs) -> Result<i32> {
    log::info!("loading chunk from {}", args.chunk.display());
    let bytes = std::fs::read(&args.chunk)?;
    let proto: ChunkProto = bincode::deserialize(&bytes)?;

    let mut vm = Vm::with_config(args.vm_config);
    match vm.interpret(&proto) {
        InterpretResult::Ok => Ok(0),
        InterpretResult::CompileError => Ok(65),
        InterpretResult::RuntimeError(err) => {
            log::warn!("script raised a runtime error");
            eprint!("{err}");
            Err(CliError::Runtime(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loxvm_value::{ChunkBuilder, ConstantProto, Heap, OpCode, Strings};
    use tempfile::NamedTempFile;

    fn write_chunk(proto: &ChunkProto) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let bytes = bincode::serialize(proto).unwrap();
        std::fs::write(file.path(), bytes).unwrap();
        file
    }

    #[test]
    fn running_a_print_chunk_succeeds() {
        let mut heap = Heap::new();
        let mut strings = Strings::new();
        let mut builder = ChunkBuilder::new(&mut heap, &mut strings);
        let idx = builder.add_number_constant(1.0);
        builder.emit_op(OpCode::Constant, 1).emit_byte(idx, 1);
        builder.emit_op(OpCode::Print, 1);
        builder.emit_op(OpCode::Nil, 1);
        builder.emit_op(OpCode::Return, 1);
        let chunk = builder.finish();

        let proto = ChunkProto {
            code: chunk.code,
            constants: chunk.constants.iter().map(|_| ConstantProto::Number(1.0)).collect(),
            lines: chunk.lines,
        };
        let file = write_chunk(&proto);

        let result = run(RunArgs { chunk: file.path().to_path_buf(), vm_config: VmConfig::default() });
        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn running_a_corrupt_file_reports_a_chunk_decode_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a chunk").unwrap();

        let result = run(RunArgs { chunk: file.path().to_path_buf(), vm_config: VmConfig::default() });
        assert!(matches!(result, Err(CliError::ChunkDecode(_))));
    }

    #[test]
    fn running_a_missing_file_reports_io_error() {
        let result = run(RunArgs {
            chunk: PathBuf::from("/nonexistent/chunk.bin"),
            vm_config: VmConfig::default(),
        });
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
