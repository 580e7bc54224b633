use loxvm_gc::{Ref, Trace};
use loxvm_table::Table;

use crate::{Chunk, Value};

/// Interned, immutable byte string (`spec.md` §3 "String"). Two `LoxString`
/// objects with equal bytes never coexist; identity (`Ref` equality) is
/// content equality by construction of the interner in [`crate::strings`].
pub struct LoxString {
    pub bytes: Vec<u8>,
    pub hash: u64,
}

impl LoxString {
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).expect("loxvm strings are always valid UTF-8")
    }
}

/// A compiled function: its arity, how many upvalues its closures capture,
/// an optional name for diagnostics, and its code (`spec.md` §3
/// "Function").
pub struct Function {
    pub arity: u8,
    pub upvalue_count: u8,
    pub name: Option<Ref>,
    pub chunk: Chunk,
}

/// Heap access a native needs to allocate or inspect objects: a native
/// reads arguments from a flat slice (`spec.md` §4.7) but, unlike a pure
/// function, may need to intern a result string or mutate a list in place.
///
/// `error` is how a failing native hands its already-formatted diagnostic
/// back to the caller (`spec.md` §4.7/§7: "natives emit their own error
/// messages; they signal failure via the error sentinel") without needing
/// to know anything about `loxvm-vm`'s `RuntimeError` type.
pub struct NativeContext<'a> {
    pub heap: &'a mut crate::Heap,
    pub strings: &'a mut crate::Strings,
    pub error: Option<String>,
}

impl<'a> NativeContext<'a> {
    pub fn new(heap: &'a mut crate::Heap, strings: &'a mut crate::Strings) -> Self {
        Self { heap, strings, error: None }
    }

    /// Record `message` as this call's diagnostic and return the error
    /// sentinel. Every native that can fail should `return ctx.fail(...)`
    /// rather than constructing [`Value::Error`] directly.
    pub fn fail(&mut self, message: impl Into<String>) -> Value {
        self.error = Some(message.into());
        Value::Error
    }
}

/// The calling convention a native implements: a flat argument slice in,
/// one `Value` out. Failure is signaled by returning [`Value::Error`] after
/// the native has already reported its own diagnostic (`spec.md` §4.7),
/// which `loxvm-native` is responsible for doing before returning it.
pub type NativeFn = fn(ctx: &mut NativeContext, args: &[Value]) -> Value;

pub struct Native {
    pub name: &'static str,
    pub function: NativeFn,
}

/// Either an open upvalue, still pointing at a live stack slot index, or a
/// closed one owning its own value after the slot it named has died
/// (`spec.md` §3 "Upvalue", §4.4).
pub enum UpvalueLocation {
    Stack(usize),
    Closed(Value),
}

pub struct Upvalue {
    pub location: UpvalueLocation,
    /// Links this upvalue into the VM's open-upvalue list, sorted by
    /// descending stack address (`spec.md` §3 invariant 4). `None` once
    /// closed or at the tail of the list.
    pub next_open: Option<Ref>,
}

/// A function paired with its resolved upvalue cells (`spec.md` §3
/// "Closure").
pub struct Closure {
    pub function: Ref,
    pub upvalues: Vec<Ref>,
}

/// A class: its name and a method table mapping name `Ref` to `Closure`
/// `Ref` (`spec.md` §3 "Class"; invariant 5 restricts this table to
/// closures only).
pub struct Class {
    pub name: Ref,
    pub methods: Table<Ref>,
}

/// An instance of a class: its class reference and an arbitrary-valued
/// field table (`spec.md` §3 "Instance").
pub struct Instance {
    pub class: Ref,
    pub fields: Table<Value>,
}

/// A method closure bound to the receiver it was looked up on (`spec.md`
/// §3 "BoundMethod"), produced by `GET_PROPERTY`/`GET_SUPER` when the named
/// member resolves to a method rather than a field.
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Ref,
}

/// A dynamic array of values (`spec.md` §3 "List"), the payload of
/// `BUILD_LIST`/`INDEX_SUBSCR`/`STORE_SUBSCR` and the native `append`/
/// `delete`/`length`.
pub struct List {
    pub items: Vec<Value>,
}

/// Every heap object kind this VM allocates. `loxvm-gc::Heap<Obj>` is the
/// VM's sole allocator; this enum and its [`Trace`] impl are the only place
/// that knows the concrete shape of each kind (`spec.md` §3).
pub enum Obj {
    Str(LoxString),
    Function(Function),
    Native(Native),
    Closure(Closure),
    Upvalue(Upvalue),
    Class(Class),
    Instance(Instance),
    BoundMethod(BoundMethod),
    List(List),
}

fn trace_value(value: &Value, mark: &mut dyn FnMut(Ref)) {
    if let Value::Obj(r) = value {
        mark(*r);
    }
}

impl Trace for Obj {
    fn trace(&self, mark: &mut dyn FnMut(Ref)) {
        match self {
            Obj::Str(_) | Obj::Native(_) => {}
            Obj::Function(f) => {
                if let Some(name) = f.name {
                    mark(name);
                }
                for constant in &f.chunk.constants {
                    trace_value(constant, mark);
                }
            }
            Obj::Closure(c) => {
                mark(c.function);
                for &upvalue in &c.upvalues {
                    mark(upvalue);
                }
            }
            Obj::Upvalue(u) => {
                if let UpvalueLocation::Closed(value) = &u.location {
                    trace_value(value, mark);
                }
            }
            Obj::Class(c) => {
                mark(c.name);
                for (key, &closure) in c.methods.iter() {
                    mark(key);
                    mark(closure);
                }
            }
            Obj::Instance(i) => {
                mark(i.class);
                for (key, value) in i.fields.iter() {
                    mark(key);
                    trace_value(value, mark);
                }
            }
            Obj::BoundMethod(b) => {
                trace_value(&b.receiver, mark);
                mark(b.method);
            }
            Obj::List(l) => {
                for item in &l.items {
                    trace_value(item, mark);
                }
            }
        }
    }

    fn size_hint(&self) -> usize {
        match self {
            Obj::Str(s) => std::mem::size_of::<LoxString>() + s.bytes.len(),
            Obj::Function(f) => {
                std::mem::size_of::<Function>() + f.chunk.code.len() + f.chunk.constants.len() * std::mem::size_of::<Value>()
            }
            Obj::Native(_) => std::mem::size_of::<Native>(),
            Obj::Closure(c) => std::mem::size_of::<Closure>() + c.upvalues.len() * std::mem::size_of::<Ref>(),
            Obj::Upvalue(_) => std::mem::size_of::<Upvalue>(),
            Obj::Class(_) => std::mem::size_of::<Class>(),
            Obj::Instance(_) => std::mem::size_of::<Instance>(),
            Obj::BoundMethod(_) => std::mem::size_of::<BoundMethod>(),
            Obj::List(l) => std::mem::size_of::<List>() + l.items.len() * std::mem::size_of::<Value>(),
        }
    }
}
