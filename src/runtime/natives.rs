/// Default native library bound by the CLI.
///
/// A source file opts into a native by declaring it with a `...` body,
/// e.g. `fn print(Any value) ...`; binding attaches the host
/// implementation to that declaration by name.
use super::Engine;
use crate::compiler::Package;
use crate::value::{value_repr, RuntimeError, Value};

pub fn register_defaults(package: &mut Package) {
    package.bind_native("print", native_print);
}

/// `fn print(Any value) ...`: writes its arguments to stdout.
fn native_print(engine: &mut Engine, argc: u8) -> Result<(), RuntimeError> {
    let mut args = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        args.push(engine.pop()?);
    }
    args.reverse();

    let parts: Vec<String> = args.iter().map(value_repr).collect();
    println!("{}", parts.join(" "));

    engine.push(Value::Nil)
}
