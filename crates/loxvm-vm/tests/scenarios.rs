//! The concrete scenarios of `spec.md` §8, each hand-assembled with
//! [`ChunkBuilder`] (no front end exists in this workspace; see
//! `SPEC_FULL.md` §0) and run to completion, asserting on the program's
//! `PRINT` output.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use loxvm_value::{Chunk, ChunkBuilder, Function, Heap, Obj, OpCode, Strings, Value};
use loxvm_vm::{InterpretResult, Vm};

/// A `Write` sink shared with the test after the `Vm` that owns it has been
/// moved into `run`, so the assertion can read back what `PRINT` wrote.
#[derive(Clone, Default)]
struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedOutput {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("PRINT output is always valid UTF-8")
    }
}

fn function(heap: &mut Heap, arity: u8, upvalue_count: u8, chunk: Chunk) -> loxvm_gc::Ref {
    let f = Function { arity, upvalue_count, name: None, chunk };
    heap.allocate(Obj::Function(f), std::mem::size_of::<Function>()).unwrap()
}

fn run(heap: Heap, strings: Strings, chunk: Chunk) -> (InterpretResult, String) {
    let output = SharedOutput::default();
    let mut vm = Vm::from_parts_with_output(heap, strings, output.clone());
    let result = vm.interpret_chunk(chunk);
    (result, output.contents())
}

/// Scenario 1: closures sharing a captured local observe each other's
/// writes through the same upvalue.
///
/// ```text
/// fun make(){ var x=0; fun up(){ x=x+1; } fun get(){ return x; } return [up,get]; }
/// var p=make(); p[0](); p[0](); print p[1]();
/// ```
#[test]
fn closure_shared_state_observes_sibling_writes() {
    let mut heap = Heap::new();
    let mut strings = Strings::new();

    // up(): x = x + 1;  (upvalue 0)
    let up_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        b.emit_op(OpCode::GetUpvalue, 1).emit_byte(0, 1);
        let one = b.add_number_constant(1.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(one, 1);
        b.emit_op(OpCode::Add, 1);
        b.emit_op(OpCode::SetUpvalue, 1).emit_byte(0, 1);
        b.emit_op(OpCode::Pop, 1);
        b.emit_op(OpCode::Nil, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };
    let up_fn = function(&mut heap, 0, 1, up_chunk);

    // get(): return x;  (upvalue 0, the same captured local as up's)
    let get_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        b.emit_op(OpCode::GetUpvalue, 1).emit_byte(0, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };
    let get_fn = function(&mut heap, 0, 1, get_chunk);

    // make(): var x=0; fun up...; fun get...; return [up, get];
    let make_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        let zero = b.add_number_constant(0.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(zero, 1); // slot1 = x

        let up_const = b.add_constant(Value::Obj(up_fn));
        b.emit_op(OpCode::Closure, 1).emit_byte(up_const, 1);
        b.emit_byte(1, 1).emit_byte(1, 1); // capture local slot 1 (x)

        let get_const = b.add_constant(Value::Obj(get_fn));
        b.emit_op(OpCode::Closure, 1).emit_byte(get_const, 1);
        b.emit_byte(1, 1).emit_byte(1, 1); // capture the same local slot 1

        b.emit_op(OpCode::GetLocal, 1).emit_byte(2, 1); // push up
        b.emit_op(OpCode::GetLocal, 1).emit_byte(3, 1); // push get
        b.emit_op(OpCode::BuildList, 1).emit_byte(2, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };
    let make_fn = function(&mut heap, 0, 0, make_chunk);

    let top_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        let make_const = b.add_constant(Value::Obj(make_fn));
        b.emit_op(OpCode::Closure, 1).emit_byte(make_const, 1);
        let make_name = b.add_string_constant("make");
        b.emit_op(OpCode::DefineGlobal, 1).emit_byte(make_name, 1);

        let make_name_ref = b.add_string_constant("make");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(make_name_ref, 1);
        b.emit_op(OpCode::Call, 1).emit_byte(0, 1); // p = make(); slot1 = p

        for _ in 0..2 {
            b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1); // push p
            let zero = b.add_number_constant(0.0);
            b.emit_op(OpCode::Constant, 1).emit_byte(zero, 1);
            b.emit_op(OpCode::IndexSubscr, 1); // push p[0]
            b.emit_op(OpCode::Call, 1).emit_byte(0, 1); // p[0]()
            b.emit_op(OpCode::Pop, 1); // discard nil result
        }

        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1); // push p
        let one = b.add_number_constant(1.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(one, 1);
        b.emit_op(OpCode::IndexSubscr, 1); // push p[1]
        b.emit_op(OpCode::Call, 1).emit_byte(0, 1); // p[1]()
        b.emit_op(OpCode::Print, 1);

        b.emit_op(OpCode::Pop, 1); // discard p
        b.emit_op(OpCode::Nil, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };

    let (result, output) = run(heap, strings, top_chunk);
    assert!(matches!(result, InterpretResult::Ok), "{result:?}");
    assert_eq!(output, "2\n");
}

/// Scenario 2: inheritance and `super` dispatch.
///
/// ```text
/// class A{ f(){ return 1; } } class B < A { f(){ return super.f()+10; } }
/// print B().f();
/// ```
#[test]
fn super_invoke_dispatches_to_the_superclass_method() {
    let mut heap = Heap::new();
    let mut strings = Strings::new();

    let a_f_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        let one = b.add_number_constant(1.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(one, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };
    let a_f = function(&mut heap, 0, 0, a_f_chunk);

    let b_f_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        b.emit_op(OpCode::GetLocal, 1).emit_byte(0, 1); // push `this`
        let a_name = b.add_string_constant("A");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(a_name, 1); // push superclass
        let f_name = b.add_string_constant("f");
        b.emit_op(OpCode::SuperInvoke, 1).emit_byte(f_name, 1).emit_byte(0, 1);
        let ten = b.add_number_constant(10.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(ten, 1);
        b.emit_op(OpCode::Add, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };
    let b_f = function(&mut heap, 0, 0, b_f_chunk);

    let top_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);

        let a_name = b.add_string_constant("A");
        b.emit_op(OpCode::Class, 1).emit_byte(a_name, 1);
        let a_f_const = b.add_constant(Value::Obj(a_f));
        b.emit_op(OpCode::Closure, 1).emit_byte(a_f_const, 1);
        let f_name = b.add_string_constant("f");
        b.emit_op(OpCode::Method, 1).emit_byte(f_name, 1);
        let a_name2 = b.add_string_constant("A");
        b.emit_op(OpCode::DefineGlobal, 1).emit_byte(a_name2, 1);

        let b_name = b.add_string_constant("B");
        b.emit_op(OpCode::Class, 1).emit_byte(b_name, 1);
        let b_name2 = b.add_string_constant("B");
        b.emit_op(OpCode::DefineGlobal, 1).emit_byte(b_name2, 1);

        let a_name3 = b.add_string_constant("A");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(a_name3, 1);
        let b_name3 = b.add_string_constant("B");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(b_name3, 1);
        b.emit_op(OpCode::Inherit, 1);
        b.emit_op(OpCode::Pop, 1); // discard leftover superclass

        let b_name4 = b.add_string_constant("B");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(b_name4, 1);
        let b_f_const = b.add_constant(Value::Obj(b_f));
        b.emit_op(OpCode::Closure, 1).emit_byte(b_f_const, 1);
        let f_name2 = b.add_string_constant("f");
        b.emit_op(OpCode::Method, 1).emit_byte(f_name2, 1);
        b.emit_op(OpCode::Pop, 1); // discard class B

        let b_name5 = b.add_string_constant("B");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(b_name5, 1);
        b.emit_op(OpCode::Call, 1).emit_byte(0, 1); // B()
        let f_name3 = b.add_string_constant("f");
        b.emit_op(OpCode::Invoke, 1).emit_byte(f_name3, 1).emit_byte(0, 1);
        b.emit_op(OpCode::Print, 1);

        b.emit_op(OpCode::Nil, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };

    let (result, output) = run(heap, strings, top_chunk);
    assert!(matches!(result, InterpretResult::Ok), "{result:?}");
    assert_eq!(output, "11\n");
}

/// Scenario 3: `+` on two lists appends in place and returns the left
/// operand's identity.
///
/// ```text
/// print length([1,2]+[3,4,5]);
/// ```
#[test]
fn list_add_appends_in_place_and_keeps_the_left_identity() {
    let mut heap = Heap::new();
    let mut strings = Strings::new();

    let chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        let one = b.add_number_constant(1.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(one, 1);
        let two = b.add_number_constant(2.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(two, 1);
        b.emit_op(OpCode::BuildList, 1).emit_byte(2, 1); // slot1 = [1,2]

        let three = b.add_number_constant(3.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(three, 1);
        let four = b.add_number_constant(4.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(four, 1);
        let five = b.add_number_constant(5.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(five, 1);
        b.emit_op(OpCode::BuildList, 1).emit_byte(3, 1); // slot2 = [3,4,5]

        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1);
        b.emit_op(OpCode::GetLocal, 1).emit_byte(2, 1);
        b.emit_op(OpCode::Add, 1); // slot3 = slot1 + slot2 (== slot1's object, mutated)

        let length_name = b.add_string_constant("length");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(length_name, 1);
        b.emit_op(OpCode::GetLocal, 1).emit_byte(3, 1);
        b.emit_op(OpCode::Call, 1).emit_byte(1, 1);
        b.emit_op(OpCode::Print, 1);

        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1); // the original left list
        b.emit_op(OpCode::GetLocal, 1).emit_byte(3, 1); // the `+` result
        b.emit_op(OpCode::Equal, 1);
        b.emit_op(OpCode::Print, 1);

        b.emit_op(OpCode::Pop, 1);
        b.emit_op(OpCode::Pop, 1);
        b.emit_op(OpCode::Pop, 1);
        b.emit_op(OpCode::Nil, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };

    let (result, output) = run(heap, strings, chunk);
    assert!(matches!(result, InterpretResult::Ok), "{result:?}");
    assert_eq!(output, "5\ntrue\n");
}

/// Scenario 4: a field set after construction shadows a method of the same
/// name at `GET_PROPERTY`.
///
/// ```text
/// class C{ m(){ return "method"; } } var c=C(); c.m="field"; print c.m;
/// ```
#[test]
fn field_write_shadows_a_method_of_the_same_name() {
    let mut heap = Heap::new();
    let mut strings = Strings::new();

    let m_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        let method_str = b.add_string_constant("method");
        b.emit_op(OpCode::Constant, 1).emit_byte(method_str, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };
    let m_fn = function(&mut heap, 0, 0, m_chunk);

    let top_chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);

        let c_name = b.add_string_constant("C");
        b.emit_op(OpCode::Class, 1).emit_byte(c_name, 1);
        let m_const = b.add_constant(Value::Obj(m_fn));
        b.emit_op(OpCode::Closure, 1).emit_byte(m_const, 1);
        let m_name = b.add_string_constant("m");
        b.emit_op(OpCode::Method, 1).emit_byte(m_name, 1);
        let c_name2 = b.add_string_constant("C");
        b.emit_op(OpCode::DefineGlobal, 1).emit_byte(c_name2, 1);

        let c_name3 = b.add_string_constant("C");
        b.emit_op(OpCode::GetGlobal, 1).emit_byte(c_name3, 1);
        b.emit_op(OpCode::Call, 1).emit_byte(0, 1); // slot1 = c

        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1);
        let field_str = b.add_string_constant("field");
        b.emit_op(OpCode::Constant, 1).emit_byte(field_str, 1);
        let m_name2 = b.add_string_constant("m");
        b.emit_op(OpCode::SetProperty, 1).emit_byte(m_name2, 1);
        b.emit_op(OpCode::Pop, 1); // discard the expression-statement value

        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1);
        let m_name3 = b.add_string_constant("m");
        b.emit_op(OpCode::GetProperty, 1).emit_byte(m_name3, 1);
        b.emit_op(OpCode::Print, 1);

        b.emit_op(OpCode::Pop, 1);
        b.emit_op(OpCode::Nil, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };

    let (result, output) = run(heap, strings, top_chunk);
    assert!(matches!(result, InterpretResult::Ok), "{result:?}");
    assert_eq!(output, "field\n");
}

/// Scenario 5: two strings built by concatenation from different literal
/// pairs still compare equal by reference identity once interned.
///
/// ```text
/// var a="ab"+""; var b="a"+"b"; print a==b;
/// ```
#[test]
fn concatenated_strings_with_equal_content_share_identity() {
    let mut heap = Heap::new();
    let mut strings = Strings::new();

    let chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        let ab = b.add_string_constant("ab");
        b.emit_op(OpCode::Constant, 1).emit_byte(ab, 1);
        let empty = b.add_string_constant("");
        b.emit_op(OpCode::Constant, 1).emit_byte(empty, 1);
        b.emit_op(OpCode::Add, 1); // slot1 = a

        let a_lit = b.add_string_constant("a");
        b.emit_op(OpCode::Constant, 1).emit_byte(a_lit, 1);
        let b_lit = b.add_string_constant("b");
        b.emit_op(OpCode::Constant, 1).emit_byte(b_lit, 1);
        b.emit_op(OpCode::Add, 1); // slot2 = b

        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1);
        b.emit_op(OpCode::GetLocal, 1).emit_byte(2, 1);
        b.emit_op(OpCode::Equal, 1);
        b.emit_op(OpCode::Print, 1);

        b.emit_op(OpCode::Pop, 1);
        b.emit_op(OpCode::Pop, 1);
        b.emit_op(OpCode::Nil, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };

    let (result, output) = run(heap, strings, chunk);
    assert!(matches!(result, InterpretResult::Ok), "{result:?}");
    assert_eq!(output, "true\n");
}

/// Scenario 6: allocating many short-lived lists inside a loop does not
/// exceed a bounded resident heap; interned/live data survives only while
/// referenced (`spec.md` §8 scenario 6), exercised at the VM level with a
/// small GC threshold so multiple collections happen during the loop.
#[test]
fn gc_bounds_resident_heap_across_many_short_lived_allocations() {
    let mut heap = Heap::with_config(4096, 2);
    let mut strings = Strings::new();

    let chunk = {
        let mut b = ChunkBuilder::new(&mut heap, &mut strings);
        let zero = b.add_number_constant(0.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(zero, 1); // slot1 = counter

        let loop_start = b.current_offset();
        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1);
        let limit = b.add_number_constant(20_000.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(limit, 1);
        b.emit_op(OpCode::Less, 1);
        let exit_jump = b.emit_jump(OpCode::JumpIfFalse, 1);
        b.emit_op(OpCode::Pop, 1); // discard the true condition

        // Body: build and immediately discard a short-lived list.
        let one = b.add_number_constant(1.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(one, 1);
        let two = b.add_number_constant(2.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(two, 1);
        b.emit_op(OpCode::BuildList, 1).emit_byte(2, 1);
        b.emit_op(OpCode::Pop, 1);

        // counter = counter + 1;
        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1);
        let one_again = b.add_number_constant(1.0);
        b.emit_op(OpCode::Constant, 1).emit_byte(one_again, 1);
        b.emit_op(OpCode::Add, 1);
        b.emit_op(OpCode::SetLocal, 1).emit_byte(1, 1);
        b.emit_op(OpCode::Pop, 1);

        let loop_offset_from = b.current_offset() + 3; // account for the LOOP instruction itself
        b.emit_op(OpCode::Loop, 1);
        let distance = loop_offset_from - loop_start;
        b.emit_u16(distance as u16, 1);

        b.patch_jump(exit_jump);
        b.emit_op(OpCode::Pop, 1); // discard the false condition

        b.emit_op(OpCode::GetLocal, 1).emit_byte(1, 1);
        b.emit_op(OpCode::Print, 1);

        b.emit_op(OpCode::Pop, 1); // discard counter
        b.emit_op(OpCode::Nil, 1);
        b.emit_op(OpCode::Return, 1);
        b.finish()
    };

    let (result, output) = run(heap, strings, chunk);
    assert!(matches!(result, InterpretResult::Ok), "{result:?}");
    assert_eq!(output, "20000\n");
}
