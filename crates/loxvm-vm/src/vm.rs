use std::io::Write;

use loxvm_gc::Ref;
use loxvm_table::Table;
use loxvm_value::{
    BoundMethod, Chunk, ChunkProto, Class, Closure, Function, Heap, Instance, List, NativeContext, Obj, OpCode,
    Strings, Upvalue, UpvalueLocation, Value,
};
use loxvm_util::{fnv1a, FRAMES_MAX, STACK_MAX};

use crate::error::{InterpretResult, RuntimeError, RuntimeErrorKind};
use crate::frame::CallFrame;

/// Tunable limits a host may override (`SPEC_FULL.md` §10.3: `loxvm-cli`'s
/// layered `Config` merges GC growth factor, initial threshold, and
/// stack/frame capacity from a project file and CLI flags). Every field
/// defaults to the constant `loxvm-util` defines, so an embedder that
/// doesn't care can just use [`VmConfig::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum live call frames before `"Stack overflow."` (`spec.md` §4.5).
    pub frames_max: usize,
    /// Initial value-stack `Vec` capacity; a hint, not a hard cap (the stack
    /// grows past it like any `Vec`).
    pub stack_capacity_hint: usize,
    /// GC allocation-byte threshold at startup (`spec.md` §4.3).
    pub gc_initial_threshold: usize,
    /// GC threshold growth factor applied after each collection.
    pub gc_growth_factor: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            frames_max: FRAMES_MAX,
            stack_capacity_hint: STACK_MAX,
            gc_initial_threshold: loxvm_util::GC_INITIAL_THRESHOLD,
            gc_growth_factor: loxvm_util::GC_GROWTH_FACTOR,
        }
    }
}

/// The call-frame stack, value stack, upvalue engine, globals table, and
/// bytecode dispatch loop (`spec.md` §4.4-§4.6, §6). One `Vm` owns exactly
/// one [`Heap`] and one [`Strings`] interner for its whole lifetime.
pub struct Vm {
    heap: Heap,
    strings: Strings,
    globals: Table<Value>,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    frames_max: usize,
    /// Head of the open-upvalue list, sorted by descending stack address
    /// (`spec.md` §3 invariant 4).
    open_upvalues: Option<Ref>,
    init_string: Ref,
    init_hash: u64,
    output: Box<dyn Write>,
}

impl Vm {
    /// A fresh VM writing `PRINT` output to stdout, with every built-in
    /// native already installed (`spec.md` §4.7, §11 point 5).
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// A fresh VM writing `PRINT` output to `output` instead of stdout,
    /// mainly so tests can capture it.
    pub fn with_output(output: impl Write + 'static) -> Self {
        let config = VmConfig::default();
        Self::new_internal(Heap::with_config(config.gc_initial_threshold, config.gc_growth_factor), Strings::new(), Box::new(output), config)
    }

    /// A fresh VM under caller-chosen [`VmConfig`] limits, writing `PRINT`
    /// output to stdout.
    pub fn with_config(config: VmConfig) -> Self {
        let heap = Heap::with_config(config.gc_initial_threshold, config.gc_growth_factor);
        Self::new_internal(heap, Strings::new(), Box::new(std::io::stdout()), config)
    }

    /// A VM taking ownership of an already-populated `heap`/`strings`,
    /// writing `PRINT` output to stdout. Pairs with
    /// [`loxvm_value::ChunkBuilder`] and [`Vm::interpret_chunk`]: a test
    /// builds a scenario's chunk against a standalone heap/interner (no `Vm`
    /// exists yet to own them), then hands that same heap/interner to the
    /// `Vm` that will execute it, so the chunk's constants and the VM's
    /// objects live in one heap.
    pub fn from_parts(heap: Heap, strings: Strings) -> Self {
        Self::new_internal(heap, strings, Box::new(std::io::stdout()), VmConfig::default())
    }

    /// As [`Vm::from_parts`], but capturing `PRINT` output instead of
    /// writing it to stdout.
    pub fn from_parts_with_output(heap: Heap, strings: Strings, output: impl Write + 'static) -> Self {
        Self::new_internal(heap, strings, Box::new(output), VmConfig::default())
    }

    /// As [`Vm::from_parts_with_output`], additionally overriding frame/stack
    /// limits (`loxvm-cli`'s `run` command uses this to apply the merged
    /// project config, per `SPEC_FULL.md` §10.3).
    pub fn from_parts_with_config(heap: Heap, strings: Strings, output: impl Write + 'static, config: VmConfig) -> Self {
        Self::new_internal(heap, strings, Box::new(output), config)
    }

    fn new_internal(mut heap: Heap, mut strings: Strings, output: Box<dyn Write>, config: VmConfig) -> Self {
        let init_string = strings.intern(&mut heap, b"init");
        let init_hash = fnv1a(b"init");
        let mut vm = Self {
            heap,
            strings,
            globals: Table::new(),
            stack: Vec::with_capacity(config.stack_capacity_hint),
            frames: Vec::with_capacity(config.frames_max),
            frames_max: config.frames_max,
            open_upvalues: None,
            init_string,
            init_hash,
            output,
        };
        for native in loxvm_native::builtins() {
            vm.define_native(native);
        }
        vm
    }

    /// Register one native under its name in globals, rooting both the
    /// interned name and the freshly allocated native object on the stack
    /// across the `tableSet`-equivalent insert (`SPEC_FULL.md` §11 point 5,
    /// mirroring `vm.c`'s `defineNative`).
    fn define_native(&mut self, native: &loxvm_value::Native) {
        let name_ref = self.strings.intern(&mut self.heap, native.name.as_bytes());
        let hash = self.string_hash(name_ref);
        let native_ref = self
            .heap
            .allocate(
                Obj::Native(loxvm_value::Native { name: native.name, function: native.function }),
                std::mem::size_of::<loxvm_value::Native>(),
            )
            .expect("loxvm heap exhausted while registering a native");
        self.push(Value::Obj(name_ref));
        self.push(Value::Obj(native_ref));
        self.globals.set(name_ref, hash, Value::Obj(native_ref));
        self.pop();
        self.pop();
    }

    /// Load `proto` as the top-level script, run it to completion or to its
    /// first runtime error, and reset VM state for the next call either way
    /// (`spec.md` §6).
    pub fn interpret(&mut self, proto: &ChunkProto) -> InterpretResult {
        let chunk = proto.load(&mut self.heap, &mut self.strings);
        self.interpret_chunk(chunk)
    }

    /// Bytes currently accounted against the GC threshold (`spec.md` §4.3),
    /// exposed for diagnostics and the GC-stress scenario test (`spec.md`
    /// §8 scenario 6), which asserts this stays bounded across many
    /// allocation/collection cycles rather than growing with iteration
    /// count.
    pub fn heap_bytes_allocated(&self) -> usize {
        self.heap.bytes_allocated()
    }

    /// As [`Vm::interpret`], but for a runtime [`Chunk`] already assembled
    /// directly against this VM's heap: the entry point
    /// [`loxvm_value::ChunkBuilder`]-driven tests use to run a hand-built
    /// scenario without a front end or the `ChunkProto` wire format.
    pub fn interpret_chunk(&mut self, chunk: Chunk) -> InterpretResult {
        self.reset_stack();
        let function = Function { arity: 0, upvalue_count: 0, name: None, chunk };
        let function_ref = self
            .heap
            .allocate(Obj::Function(function), std::mem::size_of::<Function>())
            .expect("loxvm heap exhausted while loading the top-level chunk");
        self.push(Value::Obj(function_ref));
        let closure_ref = self
            .heap
            .allocate(
                Obj::Closure(Closure { function: function_ref, upvalues: Vec::new() }),
                std::mem::size_of::<Closure>(),
            )
            .expect("loxvm heap exhausted while loading the top-level chunk");
        self.pop();
        self.push(Value::Obj(closure_ref));
        if let Err(err) = self.call(closure_ref, 0) {
            return InterpretResult::RuntimeError(err);
        }
        match self.run() {
            Ok(()) => InterpretResult::Ok,
            Err(err) => InterpretResult::RuntimeError(err),
        }
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("loxvm stack underflow: compiler-emitted bytecode is unbalanced")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn alloc(&mut self, obj: Obj, size: usize) -> Ref {
        self.heap.allocate(obj, size).expect("loxvm heap exhausted")
    }

    fn string_hash(&self, r: Ref) -> u64 {
        match self.heap.get(r) {
            Some(Obj::Str(s)) => s.hash,
            _ => unreachable!("expected a LoxString"),
        }
    }

    fn string_contents(&self, r: Ref) -> &str {
        match self.heap.get(r) {
            Some(Obj::Str(s)) => s.as_str(),
            _ => "",
        }
    }

    fn is_string(&self, value: Value) -> bool {
        matches!(value.as_obj().and_then(|r| self.heap.get(r)), Some(Obj::Str(_)))
    }

    fn is_list(&self, value: Value) -> bool {
        matches!(value.as_obj().and_then(|r| self.heap.get(r)), Some(Obj::List(_)))
    }

    // -- Bytecode reading ---------------------------------------------

    fn current_chunk(&self) -> &Chunk {
        let frame = self.frames.last().expect("run() requires at least one active frame");
        let closure = match self.heap.get(frame.closure) {
            Some(Obj::Closure(c)) => c,
            _ => unreachable!("a frame's closure must reference a Closure object"),
        };
        match self.heap.get(closure.function) {
            Some(Obj::Function(f)) => &f.chunk,
            _ => unreachable!("a closure must reference a Function object"),
        }
    }

    fn read_byte(&mut self) -> u8 {
        let ip = self.frames.last().unwrap().ip;
        let byte = self.current_chunk().read_byte(ip);
        self.frames.last_mut().unwrap().ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let ip = self.frames.last().unwrap().ip;
        let value = self.current_chunk().read_u16(ip);
        self.frames.last_mut().unwrap().ip += 2;
        value
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte();
        self.current_chunk().constants[idx as usize]
    }

    fn read_string(&mut self) -> Ref {
        match self.read_constant() {
            Value::Obj(r) => r,
            _ => unreachable!("a STRING-typed operand must be an interned string constant"),
        }
    }

    // -- Upvalues --------------------------------------------------------

    fn read_upvalue(&self, upvalue_ref: Ref) -> Value {
        match self.heap.get(upvalue_ref) {
            Some(Obj::Upvalue(u)) => match u.location {
                UpvalueLocation::Stack(slot) => self.stack[slot],
                UpvalueLocation::Closed(value) => value,
            },
            _ => unreachable!("expected an Upvalue object"),
        }
    }

    fn write_upvalue(&mut self, upvalue_ref: Ref, value: Value) {
        let slot = match self.heap.get(upvalue_ref) {
            Some(Obj::Upvalue(u)) => match u.location {
                UpvalueLocation::Stack(slot) => Some(slot),
                UpvalueLocation::Closed(_) => None,
            },
            _ => unreachable!("expected an Upvalue object"),
        };
        match slot {
            Some(slot) => self.stack[slot] = value,
            None => {
                if let Some(Obj::Upvalue(u)) = self.heap.get_mut(upvalue_ref) {
                    u.location = UpvalueLocation::Closed(value);
                }
            }
        }
    }

    /// Find or create the open upvalue for stack slot `local_slot`, keeping
    /// the open list sorted by descending slot so that two closures
    /// capturing the same local share one upvalue (`spec.md` §4.4).
    fn capture_upvalue(&mut self, local_slot: usize) -> Ref {
        let mut prev: Option<Ref> = None;
        let mut cur = self.open_upvalues;
        while let Some(r) = cur {
            let (slot, next) = match self.heap.get(r) {
                Some(Obj::Upvalue(u)) => match u.location {
                    UpvalueLocation::Stack(slot) => (slot, u.next_open),
                    UpvalueLocation::Closed(_) => unreachable!("the open list must hold only open upvalues"),
                },
                _ => unreachable!("expected an Upvalue object"),
            };
            if slot <= local_slot {
                break;
            }
            prev = Some(r);
            cur = next;
        }

        if let Some(r) = cur {
            if let Some(Obj::Upvalue(u)) = self.heap.get(r) {
                if matches!(u.location, UpvalueLocation::Stack(slot) if slot == local_slot) {
                    return r;
                }
            }
        }

        let upvalue = Upvalue { location: UpvalueLocation::Stack(local_slot), next_open: cur };
        let new_ref = self.alloc(Obj::Upvalue(upvalue), std::mem::size_of::<Upvalue>());
        match prev {
            Some(p) => {
                if let Some(Obj::Upvalue(u)) = self.heap.get_mut(p) {
                    u.next_open = Some(new_ref);
                }
            }
            None => self.open_upvalues = Some(new_ref),
        }
        new_ref
    }

    /// Close every open upvalue at or above `boundary`, copying each one's
    /// stack value into itself so it survives the slot going out of scope
    /// (`spec.md` §4.4).
    fn close_upvalues(&mut self, boundary: usize) {
        while let Some(r) = self.open_upvalues {
            let (slot, next) = match self.heap.get(r) {
                Some(Obj::Upvalue(u)) => match u.location {
                    UpvalueLocation::Stack(slot) => (slot, u.next_open),
                    UpvalueLocation::Closed(_) => unreachable!("the open list must hold only open upvalues"),
                },
                _ => unreachable!("expected an Upvalue object"),
            };
            if slot < boundary {
                break;
            }
            let value = self.stack[slot];
            if let Some(Obj::Upvalue(u)) = self.heap.get_mut(r) {
                u.location = UpvalueLocation::Closed(value);
                u.next_open = None;
            }
            self.open_upvalues = next;
        }
    }

    // -- Calling -----------------------------------------------------------

    fn call(&mut self, closure_ref: Ref, arg_count: u8) -> Result<(), RuntimeError> {
        let arity = match self.heap.get(closure_ref) {
            Some(Obj::Closure(c)) => match self.heap.get(c.function) {
                Some(Obj::Function(f)) => f.arity,
                _ => unreachable!("a closure must reference a Function object"),
            },
            _ => unreachable!("call target must be a Closure object"),
        };
        if arg_count != arity {
            return Err(self.runtime_error(RuntimeErrorKind::Arity { expected: arity, got: arg_count }));
        }
        if self.frames.len() == self.frames_max {
            return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
        }
        let slots_base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame { closure: closure_ref, ip: 0, slots_base });
        Ok(())
    }

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        let Some(r) = callee.as_obj() else {
            return Err(self.runtime_error(RuntimeErrorKind::NotCallable));
        };
        match self.heap.get(r) {
            Some(Obj::BoundMethod(b)) => {
                let receiver = b.receiver;
                let method = b.method;
                let idx = self.stack.len() - arg_count as usize - 1;
                self.stack[idx] = receiver;
                self.call(method, arg_count)
            }
            Some(Obj::Class(_)) => {
                let instance_ref =
                    self.alloc(Obj::Instance(Instance { class: r, fields: Table::new() }), std::mem::size_of::<Instance>());
                let idx = self.stack.len() - arg_count as usize - 1;
                self.stack[idx] = Value::Obj(instance_ref);
                let initializer = match self.heap.get(r) {
                    Some(Obj::Class(c)) => c.methods.get(self.init_string, self.init_hash).copied(),
                    _ => unreachable!(),
                };
                match initializer {
                    Some(init_ref) => self.call(init_ref, arg_count),
                    None if arg_count != 0 => Err(self.runtime_error(RuntimeErrorKind::InitArity { got: arg_count })),
                    None => Ok(()),
                }
            }
            Some(Obj::Closure(_)) => self.call(r, arg_count),
            Some(Obj::Native(native)) => {
                let native_fn = native.function;
                let args_base = self.stack.len() - arg_count as usize;
                let args: Vec<Value> = self.stack[args_base..].to_vec();
                let mut ctx = NativeContext::new(&mut self.heap, &mut self.strings);
                let result = native_fn(&mut ctx, &args);
                if result.is_error() {
                    let message = ctx.error.take().unwrap_or_else(|| "native call failed".to_string());
                    return Err(self.runtime_error(RuntimeErrorKind::Native(message)));
                }
                self.stack.truncate(args_base - 1);
                self.push(result);
                Ok(())
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::NotCallable)),
        }
    }

    fn invoke(&mut self, name_ref: Ref, name_hash: u64, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize);
        let Some(inst_ref) = receiver.as_obj() else {
            return Err(self.runtime_error(RuntimeErrorKind::NotAnInstance));
        };
        let (class_ref, field) = match self.heap.get(inst_ref) {
            Some(Obj::Instance(inst)) => (inst.class, inst.fields.get(name_ref, name_hash).copied()),
            _ => return Err(self.runtime_error(RuntimeErrorKind::NotAnInstance)),
        };
        if let Some(value) = field {
            let idx = self.stack.len() - arg_count as usize - 1;
            self.stack[idx] = value;
            return self.call_value(value, arg_count);
        }
        self.invoke_from_class(class_ref, name_ref, name_hash, arg_count)
    }

    fn invoke_from_class(
        &mut self,
        class_ref: Ref,
        name_ref: Ref,
        name_hash: u64,
        arg_count: u8,
    ) -> Result<(), RuntimeError> {
        let method = match self.heap.get(class_ref) {
            Some(Obj::Class(c)) => c.methods.get(name_ref, name_hash).copied(),
            _ => None,
        };
        match method {
            Some(closure_ref) => self.call(closure_ref, arg_count),
            None => {
                let name = self.string_contents(name_ref).to_string();
                Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty(name)))
            }
        }
    }

    fn bind_method(&mut self, class_ref: Ref, name_ref: Ref, name_hash: u64) -> Result<(), RuntimeError> {
        let method = match self.heap.get(class_ref) {
            Some(Obj::Class(c)) => c.methods.get(name_ref, name_hash).copied(),
            _ => None,
        };
        let Some(method_ref) = method else {
            let name = self.string_contents(name_ref).to_string();
            return Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty(name)));
        };
        let receiver = self.peek(0);
        let bound_ref = self.alloc(
            Obj::BoundMethod(BoundMethod { receiver, method: method_ref }),
            std::mem::size_of::<BoundMethod>(),
        );
        self.pop();
        self.push(Value::Obj(bound_ref));
        Ok(())
    }

    // -- Arithmetic/string helpers -----------------------------------------

    fn binary_numeric(&mut self, f: impl FnOnce(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(f(a, b));
                Ok(())
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::Type("Operands must be numbers.".into()))),
        }
    }

    /// Concatenate the two strings at the top of the stack, reusing
    /// `Strings::intern` so the result is canonicalized like any other
    /// string (`spec.md` §8 scenario 5). Both operands stay rooted on the
    /// stack until after interning, matching `vm.c`'s `concatenate`.
    fn concatenate(&mut self) -> Result<(), RuntimeError> {
        let b_ref = self.peek(0).as_obj().expect("operand checked to be a string");
        let a_ref = self.peek(1).as_obj().expect("operand checked to be a string");
        let mut bytes = match self.heap.get(a_ref) {
            Some(Obj::Str(s)) => s.bytes.clone(),
            _ => unreachable!(),
        };
        match self.heap.get(b_ref) {
            Some(Obj::Str(s)) => bytes.extend_from_slice(&s.bytes),
            _ => unreachable!(),
        }
        let result_ref = self.strings.intern(&mut self.heap, &bytes);
        self.pop();
        self.pop();
        self.push(Value::Obj(result_ref));
        Ok(())
    }

    /// `ADD` over two lists: append the right list's items onto the left
    /// list in place and push the (mutated) left list back, so identity is
    /// preserved rather than allocating a third list (`spec.md` §4.6).
    fn list_append_all(&mut self) -> Result<(), RuntimeError> {
        let b_ref = self.peek(0).as_obj().expect("operand checked to be a list");
        let a_ref = self.peek(1).as_obj().expect("operand checked to be a list");
        let items_b = match self.heap.get(b_ref) {
            Some(Obj::List(l)) => l.items.clone(),
            _ => unreachable!(),
        };
        match self.heap.get_mut(a_ref) {
            Some(Obj::List(l)) => l.items.extend(items_b),
            _ => unreachable!(),
        }
        self.pop();
        self.pop();
        self.push(Value::Obj(a_ref));
        Ok(())
    }

    // -- Formatting ----------------------------------------------------

    fn stringify(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Error => "<error>".to_string(),
            Value::Obj(r) => self.stringify_obj(r),
        }
    }

    fn stringify_obj(&self, r: Ref) -> String {
        match self.heap.get(r) {
            Some(Obj::Str(s)) => s.as_str().to_string(),
            Some(Obj::Function(f)) => match f.name {
                Some(name_ref) => format!("<fn {}>", self.string_contents(name_ref)),
                None => "<script>".to_string(),
            },
            Some(Obj::Native(n)) => format!("<native fn {}>", n.name),
            Some(Obj::Closure(c)) => self.stringify_obj(c.function),
            Some(Obj::Upvalue(_)) => "<upvalue>".to_string(),
            Some(Obj::Class(c)) => self.string_contents(c.name).to_string(),
            Some(Obj::Instance(i)) => {
                let class_name = match self.heap.get(i.class) {
                    Some(Obj::Class(c)) => self.string_contents(c.name).to_string(),
                    _ => "?".to_string(),
                };
                format!("{class_name} instance")
            }
            Some(Obj::BoundMethod(b)) => self.stringify_obj(b.method),
            Some(Obj::List(l)) => {
                let items: Vec<String> = l.items.iter().map(|&v| self.stringify(v)).collect();
                format!("[{}]", items.join(", "))
            }
            None => "<collected>".to_string(),
        }
    }

    // -- Garbage collection ----------------------------------------------

    fn collect_garbage_if_needed(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    /// One mark-trace-sweep cycle (`spec.md` §4.3). Roots are the value
    /// stack, every active frame's closure, the open-upvalue list, the
    /// globals table (both keys and values), and the pinned `"init"`
    /// string. Sweeping the intern set ahead of `Heap::sweep` keeps a dead
    /// string's `Ref` from dangling in the table.
    fn collect_garbage(&mut self) {
        log::debug!("gc: cycle start ({} bytes allocated)", self.heap.bytes_allocated());
        self.mark_roots();
        self.heap.trace_references();
        self.strings.retain_live(&self.heap);
        self.heap.sweep();
    }

    fn mark_roots(&mut self) {
        for i in 0..self.stack.len() {
            if let Some(r) = self.stack[i].as_obj() {
                self.heap.mark(r);
            }
        }
        for frame in &self.frames {
            self.heap.mark(frame.closure);
        }
        let mut cur = self.open_upvalues;
        while let Some(r) = cur {
            self.heap.mark(r);
            cur = match self.heap.get(r) {
                Some(Obj::Upvalue(u)) => u.next_open,
                _ => None,
            };
        }
        for (key, &value) in self.globals.iter() {
            self.heap.mark(key);
            if let Some(r) = value.as_obj() {
                self.heap.mark(r);
            }
        }
        self.heap.mark(self.init_string);
    }

    // -- Errors --------------------------------------------------------

    /// Build a [`RuntimeError`] carrying `kind` and the current call stack's
    /// backtrace, then reset VM state the way `vm.c`'s `runtimeError` does
    /// (`spec.md` §7).
    fn runtime_error(&mut self, kind: RuntimeErrorKind) -> RuntimeError {
        log::warn!("runtime error: {kind}");
        let mut frames = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let closure = match self.heap.get(frame.closure) {
                Some(Obj::Closure(c)) => c,
                _ => unreachable!(),
            };
            let function = match self.heap.get(closure.function) {
                Some(Obj::Function(f)) => f,
                _ => unreachable!(),
            };
            let line = function.chunk.line_at(frame.ip.saturating_sub(1));
            match function.name {
                Some(name_ref) => frames.push(format!("[line {line}] in {}()", self.string_contents(name_ref))),
                None => frames.push(format!("[line {line}] in script")),
            }
        }
        self.reset_stack();
        RuntimeError { kind, frames }
    }

    // -- Dispatch loop ----------------------------------------------------

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            self.collect_garbage_if_needed();
            let instruction_byte = self.read_byte();
            let instruction = match OpCode::try_from(instruction_byte) {
                Ok(op) => op,
                Err(_) => {
                    return Err(self.runtime_error(RuntimeErrorKind::Internal(format!(
                        "invalid opcode byte {instruction_byte}"
                    ))))
                }
            };

            match instruction {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots_base;
                    self.push(self.stack[base + slot]);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots_base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    match self.globals.get(name_ref, hash) {
                        Some(&value) => self.push(value),
                        None => {
                            let name = self.string_contents(name_ref).to_string();
                            return Err(self.runtime_error(RuntimeErrorKind::UndefinedGlobal(name)));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    let value = self.pop();
                    self.globals.set(name_ref, hash, value);
                }
                OpCode::SetGlobal => {
                    // Explicit existence check instead of clox's
                    // insert-then-delete-on-miss (`SPEC_FULL.md` §12): a
                    // lookup avoids ever inserting a global that turns out
                    // not to exist.
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    if self.globals.get(name_ref, hash).is_none() {
                        let name = self.string_contents(name_ref).to_string();
                        return Err(self.runtime_error(RuntimeErrorKind::UndefinedGlobal(name)));
                    }
                    let value = self.peek(0);
                    self.globals.set(name_ref, hash, value);
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure_ref = self.frames.last().unwrap().closure;
                    let upvalue_ref = match self.heap.get(closure_ref) {
                        Some(Obj::Closure(c)) => c.upvalues[slot],
                        _ => unreachable!(),
                    };
                    self.push(self.read_upvalue(upvalue_ref));
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure_ref = self.frames.last().unwrap().closure;
                    let upvalue_ref = match self.heap.get(closure_ref) {
                        Some(Obj::Closure(c)) => c.upvalues[slot],
                        _ => unreachable!(),
                    };
                    let value = self.peek(0);
                    self.write_upvalue(upvalue_ref, value);
                }
                OpCode::GetProperty => {
                    let receiver = self.peek(0);
                    let Some(inst_ref) = receiver.as_obj() else {
                        return Err(self.runtime_error(RuntimeErrorKind::NotAnInstanceProperty));
                    };
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    let (class_ref, field) = match self.heap.get(inst_ref) {
                        Some(Obj::Instance(inst)) => (inst.class, inst.fields.get(name_ref, hash).copied()),
                        _ => return Err(self.runtime_error(RuntimeErrorKind::NotAnInstanceProperty)),
                    };
                    if let Some(value) = field {
                        self.pop();
                        self.push(value);
                    } else {
                        self.bind_method(class_ref, name_ref, hash)?;
                    }
                }
                OpCode::SetProperty => {
                    let receiver = self.peek(1);
                    let Some(inst_ref) = receiver.as_obj() else {
                        return Err(self.runtime_error(RuntimeErrorKind::NotAnInstanceField));
                    };
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    let value = self.peek(0);
                    match self.heap.get_mut(inst_ref) {
                        Some(Obj::Instance(inst)) => {
                            inst.fields.set(name_ref, hash, value);
                        }
                        _ => return Err(self.runtime_error(RuntimeErrorKind::NotAnInstanceField)),
                    }
                    let value = self.pop();
                    self.pop();
                    self.push(value);
                }
                OpCode::GetSuper => {
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    let superclass = self.pop();
                    let class_ref = superclass.as_obj().expect("GET_SUPER operand must be a class");
                    self.bind_method(class_ref, name_ref, hash)?;
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_numeric(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_numeric(|a, b| Value::Bool(a < b))?,
                OpCode::Add => {
                    let b = self.peek(0);
                    let a = self.peek(1);
                    match (a, b) {
                        (Value::Number(x), Value::Number(y)) => {
                            self.pop();
                            self.pop();
                            self.push(Value::Number(x + y));
                        }
                        _ if self.is_string(a) && self.is_string(b) => self.concatenate()?,
                        _ if self.is_list(a) && self.is_list(b) => self.list_append_all()?,
                        _ => {
                            return Err(self.runtime_error(RuntimeErrorKind::Type(
                                "Operands must be two numbers, two strings, or two lists.".into(),
                            )))
                        }
                    }
                }
                OpCode::Subtract => self.binary_numeric(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_numeric(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_numeric(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(!value.is_truthy()));
                }
                OpCode::Negate => match self.peek(0).as_number() {
                    Some(n) => {
                        self.pop();
                        self.push(Value::Number(-n));
                    }
                    None => return Err(self.runtime_error(RuntimeErrorKind::Type("Operand must be a number.".into()))),
                },
                OpCode::Print => {
                    let value = self.pop();
                    let text = self.stringify(value);
                    let _ = writeln!(self.output, "{text}");
                }
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if !self.peek(0).is_truthy() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    let arg_count = self.read_byte();
                    self.invoke(name_ref, hash, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    let arg_count = self.read_byte();
                    let superclass = self.pop();
                    let class_ref = superclass.as_obj().expect("SUPER_INVOKE operand must be a class");
                    self.invoke_from_class(class_ref, name_ref, hash, arg_count)?;
                }
                OpCode::Closure => {
                    let function_value = self.read_constant();
                    let function_ref = function_value.as_obj().expect("CLOSURE operand must be a function constant");
                    let upvalue_count = match self.heap.get(function_ref) {
                        Some(Obj::Function(f)) => f.upvalue_count,
                        _ => unreachable!(),
                    };
                    let closure_ref = self.alloc(
                        Obj::Closure(Closure { function: function_ref, upvalues: Vec::with_capacity(upvalue_count as usize) }),
                        std::mem::size_of::<Closure>(),
                    );
                    self.push(Value::Obj(closure_ref));
                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte();
                        let index = self.read_byte();
                        let upvalue_ref = if is_local != 0 {
                            let base = self.frames.last().unwrap().slots_base;
                            self.capture_upvalue(base + index as usize)
                        } else {
                            let enclosing = self.frames.last().unwrap().closure;
                            match self.heap.get(enclosing) {
                                Some(Obj::Closure(c)) => c.upvalues[index as usize],
                                _ => unreachable!(),
                            }
                        };
                        if let Some(Obj::Closure(c)) = self.heap.get_mut(closure_ref) {
                            c.upvalues.push(upvalue_ref);
                        }
                    }
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let base = self.frames.last().unwrap().slots_base;
                    self.close_upvalues(base);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(base);
                    self.push(result);
                }
                OpCode::Class => {
                    let name_ref = self.read_string();
                    let class_ref = self.alloc(Obj::Class(Class { name: name_ref, methods: Table::new() }), std::mem::size_of::<Class>());
                    self.push(Value::Obj(class_ref));
                }
                OpCode::Inherit => {
                    let subclass = self.peek(0);
                    let superclass = self.peek(1);
                    let Some(super_ref) = superclass.as_obj() else {
                        return Err(self.runtime_error(RuntimeErrorKind::SuperclassNotClass));
                    };
                    if !matches!(self.heap.get(super_ref), Some(Obj::Class(_))) {
                        return Err(self.runtime_error(RuntimeErrorKind::SuperclassNotClass));
                    }
                    let sub_ref = subclass.as_obj().expect("INHERIT operand must be a class");
                    let methods = match self.heap.get(super_ref) {
                        Some(Obj::Class(c)) => c.methods.clone(),
                        _ => unreachable!(),
                    };
                    if let Some(Obj::Class(sub)) = self.heap.get_mut(sub_ref) {
                        methods.add_all(&mut sub.methods);
                    }
                    self.pop(); // subclass
                }
                OpCode::Method => {
                    let name_ref = self.read_string();
                    let hash = self.string_hash(name_ref);
                    let method_ref = self.peek(0).as_obj().expect("METHOD operand must be a closure");
                    let class_ref = self.peek(1).as_obj().expect("METHOD requires a class beneath the closure");
                    if let Some(Obj::Class(c)) = self.heap.get_mut(class_ref) {
                        c.methods.set(name_ref, hash, method_ref);
                    }
                    self.pop();
                }
                OpCode::BuildList => {
                    let count = self.read_byte() as usize;
                    let list_ref = self.alloc(Obj::List(List { items: Vec::with_capacity(count) }), std::mem::size_of::<List>());
                    self.push(Value::Obj(list_ref)); // root the list while appending
                    for i in (1..=count).rev() {
                        let item = self.peek(i);
                        if let Some(Obj::List(l)) = self.heap.get_mut(list_ref) {
                            l.items.push(item);
                        }
                    }
                    self.pop(); // the rooting copy
                    for _ in 0..count {
                        self.pop();
                    }
                    self.push(Value::Obj(list_ref));
                }
                OpCode::IndexSubscr => {
                    let index_value = self.pop();
                    let list_value = self.pop();
                    let Some(list_ref) = list_value.as_obj() else {
                        return Err(self.runtime_error(RuntimeErrorKind::Type("Invalid type to index into.".into())));
                    };
                    if !matches!(self.heap.get(list_ref), Some(Obj::List(_))) {
                        return Err(self.runtime_error(RuntimeErrorKind::Type("Invalid type to index into.".into())));
                    }
                    let Some(index) = index_value.as_number() else {
                        return Err(self.runtime_error(RuntimeErrorKind::Type("List index is not a number.".into())));
                    };
                    let index = index.trunc();
                    let result = match self.heap.get(list_ref) {
                        Some(Obj::List(l)) => {
                            if index < 0.0 || index as usize >= l.items.len() {
                                return Err(self.runtime_error(RuntimeErrorKind::IndexRange("List index out of range.".into())));
                            }
                            l.items[index as usize]
                        }
                        _ => unreachable!(),
                    };
                    self.push(result);
                }
                OpCode::StoreSubscr => {
                    let value = self.pop();
                    let index_value = self.pop();
                    let list_value = self.pop();
                    let Some(list_ref) = list_value.as_obj() else {
                        return Err(self.runtime_error(RuntimeErrorKind::Type("Invalid type to index into.".into())));
                    };
                    let Some(index) = index_value.as_number() else {
                        return Err(self.runtime_error(RuntimeErrorKind::Type("List index is not a number.".into())));
                    };
                    let index = index.trunc();
                    match self.heap.get_mut(list_ref) {
                        Some(Obj::List(l)) => {
                            if index < 0.0 || index as usize >= l.items.len() {
                                return Err(self.runtime_error(RuntimeErrorKind::IndexRange("List index out of range.".into())));
                            }
                            l.items[index as usize] = value;
                        }
                        _ => return Err(self.runtime_error(RuntimeErrorKind::Type("Invalid type to index into.".into()))),
                    }
                    self.push(value);
                }
            }
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
