use std::cell::RefCell;
use std::rc::Rc;

use super::Engine;
use crate::bytecode::{Chunk, Op};
use crate::value::{Closure, MapKey, Object, RuntimeError, UpvalueCell, Value};

fn read_u8(code: &[u8], ip: &mut usize) -> u8 {
    let value = code[*ip];
    *ip += 1;
    value
}

fn read_u16(code: &[u8], ip: &mut usize) -> u16 {
    let value = u16::from_le_bytes([code[*ip], code[*ip + 1]]);
    *ip += 2;
    value
}

fn read_i16(code: &[u8], ip: &mut usize) -> i16 {
    let value = i16::from_le_bytes([code[*ip], code[*ip + 1]]);
    *ip += 2;
    value
}

fn read_u32(code: &[u8], ip: &mut usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&code[*ip..*ip + 4]);
    *ip += 4;
    u32::from_le_bytes(bytes)
}

fn read_u64(code: &[u8], ip: &mut usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&code[*ip..*ip + 8]);
    *ip += 8;
    u64::from_le_bytes(bytes)
}

fn jump(ip: usize, distance: i16) -> usize {
    (ip as i64 + distance as i64) as usize
}

macro_rules! int_arith {
    ($self:ident, $op:tt) => {{
        let r = $self.pop_int()?;
        let l = $self.pop_int()?;
        $self.push(Value::Int(l $op r))?;
    }};
}

macro_rules! float_arith {
    ($self:ident, $op:tt) => {{
        let r = $self.pop_float()?;
        let l = $self.pop_float()?;
        $self.push(Value::Float(l $op r))?;
    }};
}

macro_rules! int_compare {
    ($self:ident, $op:tt) => {{
        let r = $self.pop_int()?;
        let l = $self.pop_int()?;
        $self.push(Value::Int((l $op r) as i64))?;
    }};
}

macro_rules! float_compare {
    ($self:ident, $op:tt) => {{
        let r = $self.pop_float()?;
        let l = $self.pop_float()?;
        $self.push(Value::Int((l $op r) as i64))?;
    }};
}

impl Engine {
    fn pop_int(&mut self) -> Result<i64, RuntimeError> {
        match self.pop()? {
            Value::Int(i) => Ok(i),
            other => Err(RuntimeError::Error(format!(
                "expected an int, found {}",
                other.type_name()
            ))),
        }
    }

    fn pop_float(&mut self) -> Result<f64, RuntimeError> {
        match self.pop()? {
            Value::Float(f) => Ok(f),
            other => Err(RuntimeError::Error(format!(
                "expected a float, found {}",
                other.type_name()
            ))),
        }
    }

    fn pop_object(&mut self) -> Result<Rc<Object>, RuntimeError> {
        match self.pop()? {
            Value::Obj(object) => Ok(object),
            other => Err(RuntimeError::Error(format!(
                "expected an object, found {}",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn run_chunk(
        &mut self,
        chunk: &Chunk,
        frame: usize,
        upvalues: &[UpvalueCell],
    ) -> Result<(), RuntimeError> {
        let code = &chunk.code;
        let mut ip = 0usize;

        while ip < code.len() {
            let byte = read_u8(code, &mut ip);
            let op = Op::from_byte(byte)
                .ok_or_else(|| RuntimeError::Error(format!("invalid opcode {byte:#04x}")))?;

            match op {
                Op::Int => {
                    let value = read_u64(code, &mut ip) as i64;
                    self.push(Value::Int(value))?;
                }
                Op::Float => {
                    let value = f64::from_bits(read_u64(code, &mut ip));
                    self.push(Value::Float(value))?;
                }
                Op::True => self.push(Value::Int(1))?,
                Op::False => self.push(Value::Int(0))?,
                Op::Nil => self.push(Value::Nil)?,
                Op::StringLiteral => {
                    let index = read_u64(code, &mut ip) as usize;
                    let _length = read_u32(code, &mut ip);
                    let text = Rc::clone(&chunk.strings[index]);
                    self.push(Value::Obj(Rc::new(Object::Str(text))))?;
                }
                Op::ArrayLiteral => {
                    let count = read_u8(code, &mut ip);
                    let mut elements = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        elements.push(self.pop()?);
                    }
                    self.push(Value::Obj(Rc::new(Object::Array(RefCell::new(elements)))))?;
                }
                Op::MapLiteral => {
                    let count = read_u8(code, &mut ip);
                    let mut entries = std::collections::HashMap::new();
                    for _ in 0..count {
                        let value = self.pop()?;
                        let key = self.pop()?;
                        let key = MapKey::from_value(&key).ok_or_else(|| {
                            RuntimeError::Error(format!(
                                "invalid map key of type {}",
                                key.type_name()
                            ))
                        })?;
                        entries.insert(key, value);
                    }
                    self.push(Value::Obj(Rc::new(Object::Map(RefCell::new(entries)))))?;
                }
                Op::EmptyString => {
                    self.push(Value::Obj(Rc::new(Object::Str(Rc::from("")))))?;
                }
                Op::EmptyArray => {
                    self.push(Value::Obj(Rc::new(Object::Array(RefCell::new(Vec::new())))))?;
                }
                Op::EmptyMap => {
                    self.push(Value::Obj(Rc::new(Object::Map(RefCell::new(
                        std::collections::HashMap::new(),
                    )))))?;
                }
                Op::Not => {
                    let value = self.pop()?;
                    self.push(Value::Int(if value.truthy() { 0 } else { 1 }))?;
                }
                Op::NegateI => {
                    let value = self.pop_int()?;
                    self.push(Value::Int(-value))?;
                }
                Op::NegateF => {
                    let value = self.pop_float()?;
                    self.push(Value::Float(-value))?;
                }
                Op::AddI => int_arith!(self, +),
                Op::SubI => int_arith!(self, -),
                Op::MulI => int_arith!(self, *),
                Op::DivI => {
                    let r = self.pop_int()?;
                    let l = self.pop_int()?;
                    if r == 0 {
                        return Err(RuntimeError::Error("division by zero".to_string()));
                    }
                    self.push(Value::Int(l / r))?;
                }
                Op::ModI => {
                    let r = self.pop_int()?;
                    let l = self.pop_int()?;
                    if r == 0 {
                        return Err(RuntimeError::Error("division by zero".to_string()));
                    }
                    self.push(Value::Int(l % r))?;
                }
                Op::AddF => float_arith!(self, +),
                Op::SubF => float_arith!(self, -),
                Op::MulF => float_arith!(self, *),
                Op::DivF => float_arith!(self, /),
                Op::LessI => int_compare!(self, <),
                Op::GreaterI => int_compare!(self, >),
                Op::EqualI => int_compare!(self, ==),
                Op::LessF => float_compare!(self, <),
                Op::GreaterF => float_compare!(self, >),
                Op::EqualF => float_compare!(self, ==),
                Op::Get => {
                    let index = read_u16(code, &mut ip) as usize;
                    let value = self.stack[frame + index].clone();
                    self.push(value)?;
                }
                Op::Set => {
                    let index = read_u16(code, &mut ip) as usize;
                    let value = self.pop()?;
                    self.stack[frame + index] = value;
                }
                Op::GlobalGet => {
                    let index = read_u16(code, &mut ip) as usize;
                    let value = self.stack[index].clone();
                    self.push(value)?;
                }
                Op::UpvalueGet => {
                    let index = read_u16(code, &mut ip) as usize;
                    let value = upvalues[index].borrow().clone();
                    self.push(value)?;
                }
                Op::UpvalueSet => {
                    let index = read_u16(code, &mut ip) as usize;
                    let value = self.pop()?;
                    *upvalues[index].borrow_mut() = value;
                }
                Op::IndexGet => {
                    let key = self.pop()?;
                    let object = self.pop_object()?;
                    let value = index_get(&object, &key)?;
                    self.push(value)?;
                }
                Op::IndexSet => {
                    let key = self.pop()?;
                    let object = self.pop_object()?;
                    let value = self.pop()?;
                    index_set(&object, &key, value)?;
                }
                Op::StructGet => {
                    let index = read_u16(code, &mut ip) as usize;
                    let object = self.pop_object()?;
                    let value = match object.as_ref() {
                        Object::StructInstance(fields) => fields.borrow()[index].clone(),
                        _ => {
                            return Err(RuntimeError::Error(
                                "member access on a non-struct value".to_string(),
                            ))
                        }
                    };
                    self.push(value)?;
                }
                Op::StructSet => {
                    let index = read_u16(code, &mut ip) as usize;
                    let object = self.pop_object()?;
                    let value = self.pop()?;
                    match object.as_ref() {
                        Object::StructInstance(fields) => fields.borrow_mut()[index] = value,
                        _ => {
                            return Err(RuntimeError::Error(
                                "member access on a non-struct value".to_string(),
                            ))
                        }
                    }
                }
                Op::Jmp => {
                    let distance = read_i16(code, &mut ip);
                    ip = jump(ip, distance);
                }
                Op::JmpZ => {
                    let condition = self.pop()?;
                    let distance = read_i16(code, &mut ip);
                    if !condition.truthy() {
                        ip = jump(ip, distance);
                    }
                }
                Op::And => {
                    let distance = read_i16(code, &mut ip);
                    if !self.peek(0).truthy() {
                        ip = jump(ip, distance);
                    } else {
                        self.pop()?;
                    }
                }
                Op::Or => {
                    let distance = read_i16(code, &mut ip);
                    if self.peek(0).truthy() {
                        ip = jump(ip, distance);
                    } else {
                        self.pop()?;
                    }
                }
                Op::Pop => {
                    self.pop()?;
                }
                Op::PopV => {
                    let count = read_u16(code, &mut ip) as usize;
                    let len = self.stack.len().saturating_sub(count);
                    self.stack.truncate(len);
                }
                Op::Call => {
                    let argc = read_u8(code, &mut ip);
                    self.call_value(argc)?;
                }
                Op::Return => {
                    let result = self.pop()?;
                    self.stack.truncate(frame);
                    self.push(result)?;
                    return Ok(());
                }
                Op::IntCast => {
                    let value = self.pop()?;
                    let converted = match value {
                        Value::Float(f) => Value::Int(f as i64),
                        Value::Int(i) => Value::Int(i),
                        other => {
                            return Err(RuntimeError::Error(format!(
                                "cannot cast {} to int",
                                other.type_name()
                            )))
                        }
                    };
                    self.push(converted)?;
                }
                Op::FloatCast => {
                    let value = self.pop()?;
                    let converted = match value {
                        Value::Int(i) => Value::Float(i as f64),
                        Value::Float(f) => Value::Float(f),
                        other => {
                            return Err(RuntimeError::Error(format!(
                                "cannot cast {} to float",
                                other.type_name()
                            )))
                        }
                    };
                    self.push(converted)?;
                }
                Op::Closure => {
                    let index = read_u64(code, &mut ip) as usize;
                    let proto = Rc::clone(&chunk.closures[index]);
                    let mut cells = Vec::with_capacity(proto.upvalues as usize);
                    for _ in 0..proto.upvalues {
                        let slot = read_u16(code, &mut ip) as usize;
                        let local = read_u8(code, &mut ip) != 0;
                        let cell = if local {
                            Rc::new(RefCell::new(self.stack[frame + slot].clone()))
                        } else {
                            Rc::clone(&upvalues[slot])
                        };
                        cells.push(cell);
                    }
                    self.push(Value::Obj(Rc::new(Object::Closure(Closure {
                        proto,
                        upvalues: cells,
                    }))))?;
                }
                Op::Constructor => {
                    let count = read_u8(code, &mut ip);
                    let mut fields = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        fields.push(self.pop()?);
                    }
                    fields.reverse();
                    self.push(Value::Obj(Rc::new(Object::StructInstance(RefCell::new(
                        fields,
                    )))))?;
                }
            }
        }

        Ok(())
    }

    /// Dispatch `CALL argc`: the callable sits on top of the arguments.
    fn call_value(&mut self, argc: u8) -> Result<(), RuntimeError> {
        let callee = self.pop()?;
        let object = match &callee {
            Value::Obj(object) => object,
            other => {
                return Err(RuntimeError::Error(format!(
                    "value of type {} is not callable",
                    other.type_name()
                )))
            }
        };

        let frame = self.stack.len() - argc as usize;
        match object.as_ref() {
            Object::Function(function) => self.run_chunk(&function.chunk, frame, &[]),
            Object::Closure(closure) => {
                // Clone the cells out so the closure object is not borrowed
                // across the nested dispatch.
                let cells = closure.upvalues.clone();
                let proto = Rc::clone(&closure.proto);
                self.run_chunk(&proto.chunk, frame, &cells)
            }
            Object::Native(native) => match native.fun {
                Some(fun) => fun(self, argc),
                None => Err(RuntimeError::Error(format!(
                    "native function '{}' is not bound",
                    native.name
                ))),
            },
            _ => Err(RuntimeError::Error(format!(
                "value of type {} is not callable",
                callee.type_name()
            ))),
        }
    }
}

fn index_get(object: &Object, key: &Value) -> Result<Value, RuntimeError> {
    match object {
        Object::Array(elements) => {
            let elements = elements.borrow();
            let index = array_index(key, elements.len())?;
            Ok(elements[index].clone())
        }
        Object::Map(entries) => {
            let map_key = MapKey::from_value(key).ok_or_else(|| {
                RuntimeError::Error(format!("invalid map key of type {}", key.type_name()))
            })?;
            entries
                .borrow()
                .get(&map_key)
                .cloned()
                .ok_or_else(|| RuntimeError::Error("key not found in map".to_string()))
        }
        Object::Str(_) => Err(RuntimeError::Error(
            "string indexing is not supported".to_string(),
        )),
        _ => Err(RuntimeError::Error(
            "value is not subscriptable".to_string(),
        )),
    }
}

fn index_set(object: &Object, key: &Value, value: Value) -> Result<(), RuntimeError> {
    match object {
        Object::Array(elements) => {
            let mut elements = elements.borrow_mut();
            let index = array_index(key, elements.len())?;
            elements[index] = value;
            Ok(())
        }
        Object::Map(entries) => {
            let map_key = MapKey::from_value(key).ok_or_else(|| {
                RuntimeError::Error(format!("invalid map key of type {}", key.type_name()))
            })?;
            entries.borrow_mut().insert(map_key, value);
            Ok(())
        }
        Object::Str(_) => Err(RuntimeError::Error(
            "<String> object does not support item assignment".to_string(),
        )),
        _ => Err(RuntimeError::Error(
            "value is not subscriptable".to_string(),
        )),
    }
}

fn array_index(key: &Value, len: usize) -> Result<usize, RuntimeError> {
    let index = match key {
        Value::Int(i) => *i,
        other => {
            return Err(RuntimeError::Error(format!(
                "array index must be an int, found {}",
                other.type_name()
            )))
        }
    };
    if index < 0 || index as usize >= len {
        return Err(RuntimeError::Error(format!(
            "out of bounds: indexing array of size {len} with index {index}"
        )));
    }
    Ok(index as usize)
}
