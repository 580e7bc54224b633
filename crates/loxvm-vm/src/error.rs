/// The category of failure a single instruction hit, without the call-stack
/// context (`spec.md` §7). [`RuntimeError`] pairs one of these with the
/// backtrace captured at the moment of failure.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("Expected {expected} arguments but got {got}.")]
    Arity { expected: u8, got: u8 },
    #[error("Expected 0 arguments but got {got}.")]
    InitArity { got: u8 },
    #[error("{0}")]
    Type(String),
    #[error("Undefined variable '{0}'.")]
    UndefinedGlobal(String),
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("{0}")]
    IndexRange(String),
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Superclass must be a class.")]
    SuperclassNotClass,
    #[error("Only instances have methods.")]
    NotAnInstance,
    #[error("Only instances have fields.")]
    NotAnInstanceField,
    #[error("Only instances have properties.")]
    NotAnInstanceProperty,
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("{0}")]
    Native(String),
    #[error("{0}")]
    Internal(String),
}

/// A runtime error surfaced with the call-stack backtrace `vm.c`'s
/// `runtimeError` prints (`spec.md` §7): the frames are innermost-first,
/// one line per active call at the moment the error was raised, and the
/// stack/frame state has already been reset by the time this is returned.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub frames: Vec<String>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.kind)?;
        for line in &self.frames {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

/// The outcome of [`crate::Vm::interpret`] (`spec.md` §6). The front end
/// that produces a [`loxvm_value::ChunkProto`] is out of scope for this
/// crate, so `CompileError` is never constructed here; it exists so a host
/// (`loxvm-cli`) can report a chunk-deserialization failure through the
/// same three-way result the embedding API promises.
#[derive(Debug)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError(RuntimeError),
}
