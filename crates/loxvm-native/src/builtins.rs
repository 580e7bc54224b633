use loxvm_value::{NativeContext, Obj, Value};

use crate::macros::native_fn;
use crate::NativeError;

native_fn!(pub fn append(ctx, args) -> "append" / 2 {
    let Some(list_ref) = args[0].as_obj() else {
        return ctx.fail(NativeError::BadCall { name: "append" }.to_string());
    };
    match ctx.heap.get_mut(list_ref) {
        Some(Obj::List(list)) => {
            list.items.push(args[1]);
            Value::Nil
        }
        _ => ctx.fail(NativeError::BadCall { name: "append" }.to_string()),
    }
});

native_fn!(pub fn delete(ctx, args) -> "delete" / 2 {
    let Some(list_ref) = args[0].as_obj() else {
        return ctx.fail(NativeError::BadCall { name: "delete" }.to_string());
    };
    let Some(index) = args[1].as_number() else {
        return ctx.fail(NativeError::BadCall { name: "delete" }.to_string());
    };
    match ctx.heap.get_mut(list_ref) {
        Some(Obj::List(list)) => {
            let index = index.trunc();
            if index < 0.0 || index as usize >= list.items.len() {
                return ctx.fail(NativeError::BadIndex { index }.to_string());
            }
            list.items.remove(index as usize)
        }
        _ => ctx.fail(NativeError::BadCall { name: "delete" }.to_string()),
    }
});

native_fn!(pub fn length(ctx, args) -> "length" / 1 {
    let Some(r) = args[0].as_obj() else {
        return ctx.fail(NativeError::BadCall { name: "length" }.to_string());
    };
    match ctx.heap.get(r) {
        Some(Obj::List(list)) => Value::Number(list.items.len() as f64),
        Some(Obj::Str(s)) => Value::Number(s.bytes.len() as f64),
        _ => ctx.fail(NativeError::BadCall { name: "length" }.to_string()),
    }
});

/// Numbers format via Rust's default `f64::Display`, which like clox's
/// `"%g"` omits a trailing `.0` via shortest round-trip formatting
/// (`SPEC_FULL.md` §11 point 3); this satisfies `spec.md` §8's
/// round-trip law without hand-rolling `%g`.
native_fn!(pub fn tostring(ctx, args) -> "tostring" / 1 {
    let text = match &args[0] {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Obj(r) => match ctx.heap.get(*r) {
            Some(Obj::Str(_)) => {
                let r = *r;
                return Value::Obj(r);
            }
            _ => return ctx.fail(NativeError::NotStringConvertible.to_string()),
        },
        Value::Error => return ctx.fail(NativeError::NotStringConvertible.to_string()),
    };
    Value::Obj(ctx.strings.intern(ctx.heap, text.as_bytes()))
});

/// `end` is inclusive of the byte at `end` (`end - start + 1` bytes),
/// preserved verbatim from `vm.c`'s `substringNative` rather than
/// "fixed" to half-open, per `SPEC_FULL.md` §11 point 1.
native_fn!(pub fn substring(ctx, args) -> "substring" / 3 {
    let Some(str_ref) = args[0].as_obj() else {
        return ctx.fail(NativeError::BadCall { name: "substring" }.to_string());
    };
    let Some(start) = args[1].as_number() else {
        return ctx.fail(NativeError::BadCall { name: "substring" }.to_string());
    };
    let Some(end) = args[2].as_number() else {
        return ctx.fail(NativeError::BadCall { name: "substring" }.to_string());
    };
    let bytes = match ctx.heap.get(str_ref) {
        Some(Obj::Str(s)) => s.bytes.clone(),
        _ => return ctx.fail(NativeError::BadCall { name: "substring" }.to_string()),
    };
    let start = start.trunc();
    let end = end.trunc();
    if start < 0.0 || end < start || end as usize >= bytes.len() {
        return ctx.fail(NativeError::BadSubstringIndices.to_string());
    }
    let slice = &bytes[start as usize..=end as usize];
    Value::Obj(ctx.strings.intern(ctx.heap, slice))
});

native_fn!(pub fn clock(_ctx, _args) -> "clock" / 0 {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Value::Number(elapsed.as_secs_f64())
});
