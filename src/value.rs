/// Runtime values and heap objects.
///
/// A value is a tagged word: int, float, object reference or nil. Booleans
/// are represented as ints (0/1), matching the typed opcodes that operate
/// on them. Compound objects live behind `Rc`, with interior mutability
/// for the mutable kinds; closures share captured variables through
/// `Rc<RefCell>` cells.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::bytecode::{Chunk, ClosureProto};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Runtime error: {0}")]
    Error(String),
    #[error("Runtime error: stack overflow.")]
    StackOverflow,
    #[error("Runtime error: did not find 'main'.")]
    NoMain,
}

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Obj(Rc<Object>),
    Nil,
}

impl Value {
    /// Condition semantics for `JMP_Z`, `AND` and `OR`: zero numbers and
    /// nil are false, objects are true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Obj(_) => true,
            Value::Nil => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Nil => "nil",
            Value::Obj(object) => match object.as_ref() {
                Object::Str(_) => "string",
                Object::Array(_) => "array",
                Object::Map(_) => "map",
                Object::StructInstance(_) => "struct",
                Object::Function(_) => "function",
                Object::Closure(_) => "closure",
                Object::Native(_) => "native",
            },
        }
    }
}

/// Shared cell for a variable captured by one or more closures.
pub type UpvalueCell = Rc<RefCell<Value>>;

/// Host implementation of a native function: pops `argc` arguments and
/// pushes exactly one result.
pub type NativeFn = fn(&mut crate::runtime::Engine, u8) -> Result<(), RuntimeError>;

#[derive(Debug)]
pub enum Object {
    Str(Rc<str>),
    Array(RefCell<Vec<Value>>),
    Map(RefCell<HashMap<MapKey, Value>>),
    StructInstance(RefCell<Vec<Value>>),
    Function(Function),
    Closure(Closure),
    Native(Native),
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub chunk: Chunk,
}

#[derive(Debug)]
pub struct Closure {
    pub proto: Rc<ClosureProto>,
    pub upvalues: Vec<UpvalueCell>,
}

#[derive(Debug)]
pub struct Native {
    pub name: String,
    /// `None` until the host binds an implementation.
    pub fun: Option<NativeFn>,
}

/// Map keys are restricted to primitives and strings; floats key by bit
/// pattern so equal bits hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Float(u64),
    Str(Rc<str>),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::Float(f) => Some(MapKey::Float(f.to_bits())),
            Value::Obj(object) => match object.as_ref() {
                Object::Str(s) => Some(MapKey::Str(Rc::clone(s))),
                _ => None,
            },
            Value::Nil => None,
        }
    }
}

/// Human-readable rendering, used by `print` and diagnostics.
pub fn value_repr(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Nil => "nil".to_string(),
        Value::Obj(object) => match object.as_ref() {
            Object::Str(s) => s.to_string(),
            Object::Array(elements) => {
                let parts: Vec<String> = elements.borrow().iter().map(value_repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Object::Map(entries) => {
                let parts: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key_repr(key), value_repr(value)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Object::StructInstance(fields) => {
                let parts: Vec<String> = fields.borrow().iter().map(value_repr).collect();
                format!("{{{}}}", parts.join(", "))
            }
            Object::Function(function) => format!("<fn {}>", function.name),
            Object::Closure(_) => "<closure>".to_string(),
            Object::Native(native) => format!("<native {}>", native.name),
        },
    }
}

fn key_repr(key: &MapKey) -> String {
    match key {
        MapKey::Int(i) => i.to_string(),
        MapKey::Float(bits) => f64::from_bits(*bits).to_string(),
        MapKey::Str(s) => format!("'{s}'"),
    }
}
