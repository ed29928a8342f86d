/// Stack-based bytecode engine.
///
/// One value stack of fixed maximum depth. On a call the frame base is
/// `top - argc` (the callable is popped first), so arguments occupy local
/// slots 0..argc-1 and declarations stack above them. `RETURN` pops the
/// result, truncates to the frame base, and pushes the result back.
///
/// Entry pushes every package global onto the stack bottom so
/// `GLOBAL_GET` resolves by absolute slot, then invokes `main` with an
/// empty frame above them.
use crate::compiler::Package;
use crate::value::{Object, RuntimeError, Value};

pub const MAX_STACK: usize = 512;

pub struct Engine {
    pub(crate) stack: Vec<Value>,
}

impl Engine {
    pub fn new() -> Self {
        Engine { stack: Vec::new() }
    }

    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == MAX_STACK {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::Error("value stack underflow".to_string()))
    }

    pub(crate) fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - distance - 1]
    }

    /// Execute a package starting at `main`; returns `main`'s result.
    pub fn execute(&mut self, package: &Package) -> Result<Value, RuntimeError> {
        let slot = package.slot("main").ok_or(RuntimeError::NoMain)?;
        let main = package.globals[slot].clone();

        self.stack.clear();
        for global in &package.globals {
            self.push(global.clone())?;
        }

        let chunk = match &main {
            Value::Obj(object) => match object.as_ref() {
                Object::Function(function) => &function.chunk,
                _ => return Err(RuntimeError::NoMain),
            },
            _ => return Err(RuntimeError::NoMain),
        };

        let frame = self.stack.len();
        self.run_chunk(chunk, frame, &[])?;
        self.pop()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

mod exec;
pub mod natives;
