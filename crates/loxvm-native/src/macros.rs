/// Generates a native trampoline that validates argument count up front,
/// matching `original_source/src/vm.c`'s own natives (e.g. `appendNative`'s
/// `if (argCount != 2 || !IS_LIST(args[0]))`): arity and per-argument type
/// are two halves of one combined guard that all report the same
/// `"Bad call to X()."` (`SPEC_FULL.md` §11 point 4), so a wrong argument
/// count fails exactly like a wrong argument type. Per-argument type checks
/// stay in the body, which reports the same `NativeError::BadCall` on
/// failure, since this VM's native set mixes list/string/number arguments
/// too freely for a single generated type-check shape to cover.
macro_rules! native_fn {
    ($vis:vis fn $rust_name:ident($ctx:ident, $args:ident) -> $name:literal / $arity:literal $body:block) => {
        $vis fn $rust_name(
            $ctx: &mut loxvm_value::NativeContext,
            $args: &[loxvm_value::Value],
        ) -> loxvm_value::Value {
            if $args.len() != $arity {
                return $ctx.fail(crate::NativeError::BadCall { name: $name }.to_string());
            }
            $body
        }
    };
}

pub(crate) use native_fn;
