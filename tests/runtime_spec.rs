/// End-to-end spec tests: source through scan, parse, validate, compile
/// and execute, checking `main`'s result or the runtime failure.
use matiria::compiler::Package;
use matiria::runtime::Engine;
use matiria::source::compile;
use matiria::value::{Object, RuntimeError, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn run(source: &str) -> Value {
    let package = compile(source).expect("source should compile");
    Engine::new().execute(&package).expect("program should run")
}

fn run_int(source: &str) -> i64 {
    match run(source) {
        Value::Int(i) => i,
        other => panic!("expected an int result, got {other:?}"),
    }
}

fn run_float(source: &str) -> f64 {
    match run(source) {
        Value::Float(f) => f,
        other => panic!("expected a float result, got {other:?}"),
    }
}

fn run_err(source: &str) -> RuntimeError {
    let package = compile(source).expect("source should compile");
    Engine::new()
        .execute(&package)
        .err()
        .expect("program should fail at runtime")
}

// ---------------------------------------------------------------------------
// Arithmetic and control flow
// ---------------------------------------------------------------------------

#[test]
fn arithmetic_with_precedence() {
    assert_eq!(run_int("fn main() -> Int { Int x := 3 + 4 * 2; return x; }"), 11);
}

#[test]
fn while_loop_accumulates() {
    let source = "fn main() -> Int {\n\
                      Int s := 0;\n\
                      Int i := 0;\n\
                      while i < 10: { s := s + i; i := i + 1; }\n\
                      return s;\n\
                  }";
    assert_eq!(run_int(source), 45);
}

#[test]
fn recursive_fibonacci() {
    let source = "fn fib(Int n) -> Int {\n\
                      if n < 2: return n;\n\
                      return fib(n - 1) + fib(n - 2);\n\
                  }\n\
                  fn main() -> Int { return fib(10); }";
    assert_eq!(run_int(source), 55);
}

#[test]
fn if_else_branches() {
    let source = "fn pick(Int n) -> Int {\n\
                      if n > 0: return 1;\n\
                      else return 2;\n\
                      return 0;\n\
                  }\n\
                  fn main() -> Int { return pick(5) * 10 + pick(0); }";
    assert_eq!(run_int(source), 12);
}

#[test]
fn unary_operators() {
    assert_eq!(run_int("fn main() -> Int { Int x := 5; return -x; }"), -5);
    assert_eq!(run_int("fn main() -> Bool { return !false; }"), 1);
}

#[test]
fn comparison_results_are_ints() {
    assert_eq!(run_int("fn main() -> Bool { return 3 <= 3; }"), 1);
    assert_eq!(run_int("fn main() -> Bool { return 3 != 3; }"), 0);
    assert_eq!(run_int("fn main() -> Bool { return 2 >= 3; }"), 0);
}

#[test]
fn floor_division_and_modulo() {
    assert_eq!(run_int("fn main() -> Int { return 7 // 2; }"), 3);
    assert_eq!(run_int("fn main() -> Int { return 7 % 3; }"), 1);
}

#[test]
fn float_arithmetic() {
    let result = run_float("fn main() -> Float { return 1.5 + 2.25; }");
    assert!((result - 3.75).abs() < 1e-9);
}

#[test]
fn int_promotes_in_mixed_arithmetic() {
    let result = run_float("fn main() -> Float { return 1 + 0.5; }");
    assert!((result - 1.5).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Short-circuit evaluation
// ---------------------------------------------------------------------------

#[test]
fn and_short_circuits() {
    // boom() would divide by zero; && must not evaluate it.
    let source = "fn boom() -> Bool { Int x := 1 / 0; return true; }\n\
                  fn main() -> Bool { return false && boom(); }";
    assert_eq!(run_int(source), 0);
}

#[test]
fn or_short_circuits() {
    let source = "fn boom() -> Bool { Int x := 1 / 0; return true; }\n\
                  fn main() -> Bool { return true || boom(); }";
    assert_eq!(run_int(source), 1);
}

#[test]
fn and_falls_through_to_the_right_side() {
    assert_eq!(run_int("fn main() -> Bool { return true && false; }"), 0);
    assert_eq!(run_int("fn main() -> Bool { return true && true; }"), 1);
}

#[test]
fn or_falls_through_to_the_right_side() {
    assert_eq!(run_int("fn main() -> Bool { return false || true; }"), 1);
    assert_eq!(run_int("fn main() -> Bool { return false || false; }"), 0);
}

// ---------------------------------------------------------------------------
// Functions and calls
// ---------------------------------------------------------------------------

#[test]
fn calls_pass_arguments_by_position() {
    let source = "fn sub(Int a, Int b) -> Int = a - b;\n\
                  fn main() -> Int { return sub(10, 4); }";
    assert_eq!(run_int(source), 6);
}

#[test]
fn void_function_call_statement() {
    let source = "fn touch(Int a) { Int b := a + 1; }\n\
                  fn main() -> Int { touch(1); return 7; }";
    assert_eq!(run_int(source), 7);
}

#[test]
fn functions_are_first_class() {
    let source = "fn double(Int n) -> Int = n * 2;\n\
                  fn apply((Int) -> Int f, Int n) -> Int = f(n);\n\
                  fn main() -> Int { return apply(double, 21); }";
    assert_eq!(run_int(source), 42);
}

#[test]
fn expression_bodied_functions() {
    let source = "fn square(Int n) -> Int = n * n;\n\
                  fn main() -> Int { return square(9); }";
    assert_eq!(run_int(source), 81);
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

#[test]
fn struct_members_read_and_write() {
    let source = "type Pair := { Int a, Int b }\n\
                  fn main() -> Int {\n\
                      Pair p;\n\
                      p.a := 2;\n\
                      p.b := 40;\n\
                      return p.a + p.b;\n\
                  }";
    assert_eq!(run_int(source), 42);
}

#[test]
fn struct_member_defaults() {
    let source = "type Point := { Int x := 7, Int y := 3 }\n\
                  fn main() -> Int {\n\
                      Point p;\n\
                      return p.x * 10 + p.y;\n\
                  }";
    assert_eq!(run_int(source), 73);
}

#[test]
fn struct_instances_are_shared_references() {
    let source = "type Box := { Int v }\n\
                  fn fill(Box b) { b.v := 9; }\n\
                  fn main() -> Int {\n\
                      Box b;\n\
                      fill(b);\n\
                      return b.v;\n\
                  }";
    assert_eq!(run_int(source), 9);
}

// ---------------------------------------------------------------------------
// Arrays and maps
// ---------------------------------------------------------------------------

#[test]
fn array_literal_indexing() {
    let source = "fn main() -> Int { [Int] xs := [10, 20, 30]; return xs[1]; }";
    assert_eq!(run_int(source), 20);
}

#[test]
fn array_element_assignment() {
    let source = "fn main() -> Int {\n\
                      [Int] xs := [1, 2, 3];\n\
                      xs[2] := 30;\n\
                      return xs[0] + xs[2];\n\
                  }";
    assert_eq!(run_int(source), 31);
}

#[test]
fn array_literal_preserves_order() {
    let source = "fn main() -> Int {\n\
                      [Int] xs := [1, 2, 3];\n\
                      return xs[0] * 100 + xs[1] * 10 + xs[2];\n\
                  }";
    assert_eq!(run_int(source), 123);
}

#[test]
fn map_literal_lookup() {
    let source = "fn main() -> Int {\n\
                      [String, Int] m := {'a': 1, 'b': 2};\n\
                      return m['b'];\n\
                  }";
    assert_eq!(run_int(source), 2);
}

#[test]
fn map_insert_through_subscript() {
    let source = "fn main() -> Int {\n\
                      [Int, Int] m := {1: 10};\n\
                      m[2] := 20;\n\
                      return m[1] + m[2];\n\
                  }";
    assert_eq!(run_int(source), 30);
}

#[test]
fn empty_container_defaults() {
    let source = "fn main() -> Int {\n\
                      [Int, Int] m;\n\
                      m[1] := 5;\n\
                      return m[1];\n\
                  }";
    assert_eq!(run_int(source), 5);
}

// ---------------------------------------------------------------------------
// Closures and upvalues
// ---------------------------------------------------------------------------

#[test]
fn closures_capture_arguments() {
    let source = "fn makeAdder(Int x) -> (Int) -> Int {\n\
                      fn add(Int y) -> Int = x + y;\n\
                      return add;\n\
                  }\n\
                  fn main() -> Int {\n\
                      (Int) -> Int a := makeAdder(3);\n\
                      return a(4);\n\
                  }";
    assert_eq!(run_int(source), 7);
}

#[test]
fn each_closure_gets_its_own_capture() {
    let source = "fn makeAdder(Int x) -> (Int) -> Int {\n\
                      fn add(Int y) -> Int = x + y;\n\
                      return add;\n\
                  }\n\
                  fn main() -> Int {\n\
                      (Int) -> Int a := makeAdder(3);\n\
                      (Int) -> Int b := makeAdder(100);\n\
                      return a(4) + b(4);\n\
                  }";
    assert_eq!(run_int(source), 111);
}

#[test]
fn chained_captures_reach_the_outer_function() {
    let source = "fn outer(Int x) -> Int {\n\
                      fn middle() -> Int {\n\
                          fn inner() -> Int = x;\n\
                          return inner();\n\
                      }\n\
                      return middle();\n\
                  }\n\
                  fn main() -> Int { return outer(11); }";
    assert_eq!(run_int(source), 11);
}

#[test]
fn upvalue_writes_go_through_the_cell() {
    let source = "fn counter(Int start) -> Int {\n\
                      fn bump() { start := start + 1; }\n\
                      fn read() -> Int = start;\n\
                      bump();\n\
                      bump();\n\
                      return read();\n\
                  }\n\
                  fn main() -> Int { return counter(5); }";
    // bump and read each capture their own cell snapshot of start, so the
    // writes are visible through bump's cell only.
    assert_eq!(run_int(source), 5);
}

// ---------------------------------------------------------------------------
// Native functions
// ---------------------------------------------------------------------------

fn native_forty(engine: &mut Engine, argc: u8) -> Result<(), RuntimeError> {
    for _ in 0..argc {
        engine.pop()?;
    }
    engine.push(Value::Int(40))
}

#[test]
fn bound_natives_are_callable() {
    let source = "fn forty() -> Int ...\n\
                  fn main() -> Int { return forty() + 2; }";
    let mut package: Package = compile(source).expect("compiles");
    assert!(package.bind_native("forty", native_forty));
    let result = Engine::new().execute(&package).expect("runs");
    assert!(matches!(result, Value::Int(42)));
}

#[test]
fn natives_accept_any_arguments() {
    let source = "fn swallow(Any v) -> Int ...\n\
                  fn main() -> Int { return swallow('text') + swallow(2); }";
    let mut package = compile(source).expect("compiles");
    assert!(package.bind_native("swallow", native_forty));
    let result = Engine::new().execute(&package).expect("runs");
    assert!(matches!(result, Value::Int(80)));
}

#[test]
fn unbound_native_is_a_runtime_error() {
    let source = "fn forty() -> Int ...\n\
                  fn main() -> Int { return forty(); }";
    let package = compile(source).expect("compiles");
    let error = Engine::new().execute(&package).err().expect("fails");
    assert!(error.to_string().contains("not bound"), "got: {error}");
}

#[test]
fn binding_an_unknown_native_fails() {
    let source = "fn main() -> Int { return 0; }";
    let mut package = compile(source).expect("compiles");
    assert!(!package.bind_native("missing", native_forty));
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

#[test]
fn string_values_flow_through() {
    let source = "fn pick(Bool which) -> String {\n\
                      if which: return 'yes';\n\
                      return 'no';\n\
                  }\n\
                  fn main() -> String { return pick(true); }";
    match run(source) {
        Value::Obj(object) => match object.as_ref() {
            Object::Str(s) => assert_eq!(s.as_ref(), "yes"),
            other => panic!("expected a string, got {other:?}"),
        },
        other => panic!("expected an object, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Runtime failures
// ---------------------------------------------------------------------------

#[test]
fn missing_main_is_a_start_error() {
    let package = compile("fn helper() -> Int = 1;").expect("compiles");
    let error = Engine::new().execute(&package).err().expect("fails");
    assert!(matches!(error, RuntimeError::NoMain));
}

#[test]
fn integer_division_by_zero() {
    let error = run_err("fn main() -> Int { Int z := 0; return 1 / z; }");
    assert!(error.to_string().contains("division by zero"), "got: {error}");
}

#[test]
fn modulo_by_zero() {
    let error = run_err("fn main() -> Int { Int z := 0; return 1 % z; }");
    assert!(error.to_string().contains("division by zero"), "got: {error}");
}

#[test]
fn float_division_by_zero_is_ieee() {
    let result = run_float("fn main() -> Float { Float z := 0.0; return 1.0 / z; }");
    assert!(result.is_infinite());
}

#[test]
fn array_index_out_of_range() {
    let error = run_err("fn main() -> Int { [Int] xs := [1]; return xs[3]; }");
    assert!(error.to_string().contains("out of bounds"), "got: {error}");
}

#[test]
fn negative_array_index() {
    let error = run_err("fn main() -> Int { [Int] xs := [1]; return xs[-1]; }");
    assert!(error.to_string().contains("out of bounds"), "got: {error}");
}

#[test]
fn missing_map_key() {
    let error = run_err(
        "fn main() -> Int { [String, Int] m := {'a': 1}; return m['b']; }",
    );
    assert!(error.to_string().contains("key not found"), "got: {error}");
}

#[test]
fn string_indexing_is_a_runtime_error() {
    // A string subscript type-checks, but the object dispatch rejects it.
    let error = run_err("fn main() -> String { String s := 'abc'; return s[0]; }");
    assert!(
        error.to_string().contains("string indexing"),
        "got: {error}"
    );
}

#[test]
fn string_index_assignment_is_a_runtime_error() {
    let error = run_err("fn main() { String s := 'abc'; s[0] := 'x'; }");
    assert!(
        error.to_string().contains("item assignment"),
        "got: {error}"
    );
}

#[test]
fn runaway_recursion_overflows_the_stack() {
    let source = "fn loop(Int n) -> Int { return loop(n + 1); }\n\
                  fn main() -> Int { return loop(0); }";
    let error = run_err(source);
    assert!(matches!(error, RuntimeError::StackOverflow), "got: {error}");
}

// ---------------------------------------------------------------------------
// Pipeline exit codes
// ---------------------------------------------------------------------------

#[test]
fn parse_errors_exit_one() {
    let error = compile("fn main() { Int x := ; }").err().expect("fails");
    assert_eq!(error.exit_code(), 1);
}

#[test]
fn semantic_errors_exit_two() {
    let error = compile("fn main() { Int x := 'text'; }").err().expect("fails");
    assert_eq!(error.exit_code(), 2);
}
