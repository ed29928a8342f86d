/// Bytecode chunks and the opcode set.
///
/// A chunk is an append-only byte buffer; multi-byte operands are
/// little-endian. Control flow offsets are signed 16-bit, relative to the
/// instruction following the jump payload. String constants and closure
/// prototypes live in per-chunk side tables referenced by index operands.
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Int,
    Float,
    StringLiteral,
    ArrayLiteral,
    MapLiteral,
    True,
    False,
    Nil,
    EmptyString,
    EmptyArray,
    EmptyMap,
    Not,
    NegateI,
    NegateF,
    AddI,
    SubI,
    MulI,
    DivI,
    ModI,
    AddF,
    SubF,
    MulF,
    DivF,
    LessI,
    GreaterI,
    EqualI,
    LessF,
    GreaterF,
    EqualF,
    Get,
    Set,
    UpvalueGet,
    UpvalueSet,
    GlobalGet,
    IndexGet,
    IndexSet,
    StructGet,
    StructSet,
    Jmp,
    JmpZ,
    And,
    Or,
    Pop,
    PopV,
    Call,
    Return,
    IntCast,
    FloatCast,
    Closure,
    Constructor,
}

impl Op {
    pub fn from_byte(byte: u8) -> Option<Op> {
        use Op::*;
        const TABLE: [Op; 50] = [
            Int,
            Float,
            StringLiteral,
            ArrayLiteral,
            MapLiteral,
            True,
            False,
            Nil,
            EmptyString,
            EmptyArray,
            EmptyMap,
            Not,
            NegateI,
            NegateF,
            AddI,
            SubI,
            MulI,
            DivI,
            ModI,
            AddF,
            SubF,
            MulF,
            DivF,
            LessI,
            GreaterI,
            EqualI,
            LessF,
            GreaterF,
            EqualF,
            Get,
            Set,
            UpvalueGet,
            UpvalueSet,
            GlobalGet,
            IndexGet,
            IndexSet,
            StructGet,
            StructSet,
            Jmp,
            JmpZ,
            And,
            Or,
            Pop,
            PopV,
            Call,
            Return,
            IntCast,
            FloatCast,
            Closure,
            Constructor,
        ];
        TABLE.get(byte as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Int => "INT",
            Op::Float => "FLOAT",
            Op::StringLiteral => "STRING_LITERAL",
            Op::ArrayLiteral => "ARRAY_LITERAL",
            Op::MapLiteral => "MAP_LITERAL",
            Op::True => "TRUE",
            Op::False => "FALSE",
            Op::Nil => "NIL",
            Op::EmptyString => "EMPTY_STRING",
            Op::EmptyArray => "EMPTY_ARRAY",
            Op::EmptyMap => "EMPTY_MAP",
            Op::Not => "NOT",
            Op::NegateI => "NEGATE_I",
            Op::NegateF => "NEGATE_F",
            Op::AddI => "ADD_I",
            Op::SubI => "SUB_I",
            Op::MulI => "MUL_I",
            Op::DivI => "DIV_I",
            Op::ModI => "MOD_I",
            Op::AddF => "ADD_F",
            Op::SubF => "SUB_F",
            Op::MulF => "MUL_F",
            Op::DivF => "DIV_F",
            Op::LessI => "LESS_I",
            Op::GreaterI => "GREATER_I",
            Op::EqualI => "EQUAL_I",
            Op::LessF => "LESS_F",
            Op::GreaterF => "GREATER_F",
            Op::EqualF => "EQUAL_F",
            Op::Get => "GET",
            Op::Set => "SET",
            Op::UpvalueGet => "UPVALUE_GET",
            Op::UpvalueSet => "UPVALUE_SET",
            Op::GlobalGet => "GLOBAL_GET",
            Op::IndexGet => "INDEX_GET",
            Op::IndexSet => "INDEX_SET",
            Op::StructGet => "STRUCT_GET",
            Op::StructSet => "STRUCT_SET",
            Op::Jmp => "JMP",
            Op::JmpZ => "JMP_Z",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Pop => "POP",
            Op::PopV => "POP_V",
            Op::Call => "CALL",
            Op::Return => "RETURN",
            Op::IntCast => "INT_CAST",
            Op::FloatCast => "FLOAT_CAST",
            Op::Closure => "CLOSURE",
            Op::Constructor => "CONSTRUCTOR",
        }
    }
}

/// Compiled body of one closure, referenced by `CLOSURE` operands.
#[derive(Debug, PartialEq)]
pub struct ClosureProto {
    pub chunk: Chunk,
    pub upvalues: u16,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub strings: Vec<Rc<str>>,
    pub closures: Vec<Rc<ClosureProto>>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn write_op(&mut self, op: Op) {
        self.code.push(op as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.code.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn add_string(&mut self, text: &str) -> u64 {
        self.strings.push(Rc::from(text));
        (self.strings.len() - 1) as u64
    }

    pub fn add_closure(&mut self, proto: ClosureProto) -> u64 {
        self.closures.push(Rc::new(proto));
        (self.closures.len() - 1) as u64
    }

    /// Emit a jump with a placeholder payload; returns the payload offset
    /// for later patching.
    pub fn write_jump(&mut self, op: Op) -> usize {
        self.write_op(op);
        self.write_u16(0xFFFF);
        self.code.len() - 2
    }

    /// Point the jump at `payload` past the bytes emitted since.
    pub fn patch_jump(&mut self, payload: usize) {
        let distance = (self.code.len() - payload - 2) as i16;
        self.code[payload..payload + 2].copy_from_slice(&distance.to_le_bytes());
    }

    /// Backward jump landing on the opcode at `target`.
    pub fn write_loop(&mut self, target: usize) {
        self.write_op(Op::Jmp);
        let after_payload = self.code.len() as i64 + 2;
        let distance = (target as i64 - after_payload) as i16;
        self.code.extend_from_slice(&distance.to_le_bytes());
    }
}

// ---------------------------------------------------------------------------
// Disassembler
// ---------------------------------------------------------------------------

fn read_u16(code: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([code[offset], code[offset + 1]])
}

fn read_i16(code: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([code[offset], code[offset + 1]])
}

fn read_u64(code: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&code[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Decode one instruction; returns its text and the offset of the next
/// instruction. `None` when the byte is not an opcode.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> Option<(String, usize)> {
    let code = &chunk.code;
    let op = Op::from_byte(code[offset])?;
    let mut text = format!("{offset:04} {}", op.name());
    let next = match op {
        Op::Int => {
            let value = read_u64(code, offset + 1) as i64;
            text.push_str(&format!(" {value}"));
            offset + 9
        }
        Op::Float => {
            let value = f64::from_bits(read_u64(code, offset + 1));
            text.push_str(&format!(" {value}"));
            offset + 9
        }
        Op::StringLiteral => {
            let index = read_u64(code, offset + 1) as usize;
            text.push_str(&format!(" '{}'", chunk.strings[index]));
            offset + 13
        }
        Op::ArrayLiteral | Op::MapLiteral | Op::Call | Op::Constructor => {
            text.push_str(&format!(" {}", code[offset + 1]));
            offset + 2
        }
        Op::Get
        | Op::Set
        | Op::UpvalueGet
        | Op::UpvalueSet
        | Op::GlobalGet
        | Op::StructGet
        | Op::StructSet
        | Op::PopV => {
            text.push_str(&format!(" {}", read_u16(code, offset + 1)));
            offset + 3
        }
        Op::Jmp | Op::JmpZ | Op::And | Op::Or => {
            let distance = read_i16(code, offset + 1);
            let target = (offset as i64 + 3 + distance as i64) as usize;
            text.push_str(&format!(" {distance} -> {target:04}"));
            offset + 3
        }
        Op::Closure => {
            let index = read_u64(code, offset + 1) as usize;
            let proto = &chunk.closures[index];
            text.push_str(&format!(" #{index}"));
            let mut cursor = offset + 9;
            for _ in 0..proto.upvalues {
                let slot = read_u16(code, cursor);
                let local = code[cursor + 2] != 0;
                text.push_str(&format!(" ({slot},{})", if local { "local" } else { "up" }));
                cursor += 3;
            }
            cursor
        }
        _ => offset + 1,
    };
    Some((text, next))
}

/// Full chunk listing, recursing into closure prototypes.
pub fn disassemble(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.code.len() {
        match disassemble_instruction(chunk, offset) {
            Some((text, next)) => {
                out.push_str(&text);
                out.push('\n');
                offset = next;
            }
            None => {
                out.push_str(&format!("{offset:04} <bad opcode {:#04x}>\n", chunk.code[offset]));
                offset += 1;
            }
        }
    }
    for (index, proto) in chunk.closures.iter().enumerate() {
        out.push('\n');
        out.push_str(&disassemble(&proto.chunk, &format!("{name}.closure#{index}")));
    }
    out
}
