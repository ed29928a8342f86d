/// Bytecode emitter: lowers the validated AST to one chunk per function
/// and packages every global as a runtime value.
///
/// Expressions compile left to right; the operator symbol's resolved type
/// selects the int or float instruction variant. `<=`, `>=` and `!=` lower
/// to the opposite comparison followed by `NOT`; `&&`/`||` lower to
/// short-circuit jumps. Every chunk is terminated with `NIL` + `RETURN` so
/// each straight-line path restores its frame and pushes one result.
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::bytecode::{Chunk, ClosureProto, Op};
use crate::lexer::TokenKind;
use crate::types::Type;
use crate::value::{Function, Native, NativeFn, Object, Value};

/// Compiled program: one runtime value per global symbol, in declaration
/// order (function, struct constructor, native stub, or nil for unions).
pub struct Package {
    pub globals: Vec<Value>,
    index: HashMap<String, usize>,
}

impl Package {
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slot(name).map(|slot| &self.globals[slot])
    }

    /// Attach a host implementation to a `...` declaration. Returns false
    /// when no native of that name exists in the package.
    pub fn bind_native(&mut self, name: &str, fun: NativeFn) -> bool {
        let Some(slot) = self.slot(name) else {
            return false;
        };
        let Value::Obj(object) = &self.globals[slot] else {
            return false;
        };
        let Object::Native(native) = object.as_ref() else {
            return false;
        };
        self.globals[slot] = Value::Obj(Rc::new(Object::Native(Native {
            name: native.name.clone(),
            fun: Some(fun),
        })));
        true
    }
}

pub fn compile(ast: &Ast, source: &str) -> Package {
    let compiler = Compiler { source };
    let mut globals = Vec::new();
    let mut index = HashMap::new();

    for stmt in &ast.head.statements {
        match stmt {
            Stmt::Fn(decl) => {
                let name = decl.symbol.token.text(source).to_string();
                let chunk = compiler.function_chunk(decl);
                index.insert(name.clone(), globals.len());
                globals.push(Value::Obj(Rc::new(Object::Function(Function {
                    name,
                    chunk,
                }))));
            }
            Stmt::Struct { symbol, members } => {
                let name = symbol.token.text(source).to_string();
                let chunk = compiler.constructor_chunk(members);
                index.insert(name.clone(), globals.len());
                globals.push(Value::Obj(Rc::new(Object::Function(Function {
                    name,
                    chunk,
                }))));
            }
            Stmt::NativeFn(decl) => {
                let name = decl.symbol.token.text(source).to_string();
                index.insert(name.clone(), globals.len());
                globals.push(Value::Obj(Rc::new(Object::Native(Native {
                    name,
                    fun: None,
                }))));
            }
            Stmt::Union { symbol, .. } => {
                // Unions have no runtime object but still occupy their
                // global slot so indices line up.
                let name = symbol.token.text(source).to_string();
                index.insert(name, globals.len());
                globals.push(Value::Nil);
            }
            _ => {}
        }
    }

    Package { globals, index }
}

struct Compiler<'s> {
    source: &'s str,
}

impl<'s> Compiler<'s> {
    fn function_chunk(&self, decl: &FnDecl) -> Chunk {
        let mut chunk = Chunk::new();
        if let Some(body) = &decl.body {
            self.write_stmt(&mut chunk, body);
        }
        // Fall-through return for void functions keeps every path's stack
        // effect at 1 - argc.
        chunk.write_op(Op::Nil);
        chunk.write_op(Op::Return);
        chunk
    }

    /// Struct constructor: push each member default, build the instance,
    /// return it.
    fn constructor_chunk(&self, members: &[VarDecl]) -> Chunk {
        let mut chunk = Chunk::new();
        for member in members {
            self.write_variable(&mut chunk, member);
        }
        chunk.write_op(Op::Constructor);
        chunk.write_u8(members.len() as u8);
        chunk.write_op(Op::Return);
        chunk
    }

    fn write_stmt(&self, chunk: &mut Chunk, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => self.write_variable(chunk, decl),
            Stmt::If {
                condition,
                then,
                otherwise,
            } => self.write_if(chunk, condition, then, otherwise.as_deref()),
            Stmt::While { condition, body } => self.write_while(chunk, condition, body),
            Stmt::Block(block) | Stmt::Scope(block) => self.write_block(chunk, block),
            Stmt::Assignment { target, value } => self.write_assignment(chunk, target, value),
            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.write_expr(chunk, expr),
                    None => chunk.write_op(Op::Nil),
                }
                chunk.write_op(Op::Return);
            }
            Stmt::Call(expr) => {
                self.write_expr(chunk, expr);
                chunk.write_op(Op::Pop);
            }
            Stmt::Closure(decl) => self.write_closure(chunk, decl),
            // Declarations are compiled from the top level, not inline.
            Stmt::Fn(_) | Stmt::NativeFn(_) | Stmt::Struct { .. } | Stmt::Union { .. } => {}
        }
    }

    /// A declaration's slot value: its initialiser, or the empty object /
    /// nil default for its type.
    fn write_variable(&self, chunk: &mut Chunk, decl: &VarDecl) {
        if let Some(value) = &decl.value {
            self.write_expr(chunk, value);
            return;
        }
        let default = match decl.symbol.ty.as_deref() {
            Some(Type::String) => Op::EmptyString,
            Some(Type::Array(_)) => Op::EmptyArray,
            Some(Type::Map(_, _)) => Op::EmptyMap,
            _ => Op::Nil,
        };
        chunk.write_op(default);
    }

    fn write_block(&self, chunk: &mut Chunk, block: &Block) {
        for stmt in &block.statements {
            self.write_stmt(chunk, stmt);
        }
        chunk.write_op(Op::PopV);
        chunk.write_u16(block.var_count);
    }

    fn write_if(&self, chunk: &mut Chunk, condition: &Expr, then: &Stmt, otherwise: Option<&Stmt>) {
        self.write_expr(chunk, condition);
        let skip_then = chunk.write_jump(Op::JmpZ);

        self.write_stmt(chunk, then);

        if let Some(otherwise) = otherwise {
            let skip_otherwise = chunk.write_jump(Op::Jmp);
            chunk.patch_jump(skip_then);
            self.write_stmt(chunk, otherwise);
            chunk.patch_jump(skip_otherwise);
        } else {
            chunk.patch_jump(skip_then);
        }
    }

    /// The condition is re-emitted after the body and the back jump lands
    /// on the `JMP_Z` test, preserving stack discipline around its pop.
    fn write_while(&self, chunk: &mut Chunk, condition: &Expr, body: &Stmt) {
        self.write_expr(chunk, condition);
        let exit = chunk.write_jump(Op::JmpZ);
        let test = exit - 1;

        self.write_stmt(chunk, body);

        self.write_expr(chunk, condition);
        chunk.write_loop(test);
        chunk.patch_jump(exit);
    }

    fn write_assignment(&self, chunk: &mut Chunk, target: &Expr, value: &Expr) {
        self.write_expr(chunk, value);

        match target {
            Expr::Primary(symbol) => {
                let op = if symbol.upvalue {
                    Op::UpvalueSet
                } else {
                    Op::Set
                };
                chunk.write_op(op);
                chunk.write_u16(symbol.index);
            }
            Expr::Subscript { object, index, .. } => {
                self.write_expr(chunk, object);
                self.write_expr(chunk, index);
                chunk.write_op(Op::IndexSet);
            }
            Expr::Access { object, member } => {
                self.write_expr(chunk, object);
                chunk.write_op(Op::StructSet);
                chunk.write_u16(member.index);
            }
            _ => {}
        }
    }

    fn write_closure(&self, chunk: &mut Chunk, decl: &ClosureDecl) {
        let inner = self.function_chunk(&decl.function);
        let proto = ClosureProto {
            chunk: inner,
            upvalues: decl.upvalues.len() as u16,
        };
        let index = chunk.add_closure(proto);

        chunk.write_op(Op::Closure);
        chunk.write_u64(index);
        for upvalue in &decl.upvalues {
            chunk.write_u16(upvalue.index);
            chunk.write_u8(upvalue.local as u8);
        }
    }

    fn write_expr(&self, chunk: &mut Chunk, expr: &Expr) {
        match expr {
            Expr::Literal { token, .. } => self.write_literal(chunk, token),
            Expr::Primary(symbol) => {
                let op = if symbol.is_global {
                    Op::GlobalGet
                } else if symbol.upvalue {
                    Op::UpvalueGet
                } else {
                    Op::Get
                };
                chunk.write_op(op);
                chunk.write_u16(symbol.index);
            }
            Expr::Unary { op, right } => {
                self.write_expr(chunk, right);
                match op.token.kind {
                    TokenKind::Bang => chunk.write_op(Op::Not),
                    TokenKind::Minus => {
                        chunk.write_op(variant(op, Op::NegateI, Op::NegateF));
                    }
                    _ => {}
                }
            }
            Expr::Binary {
                op, left, right, ..
            } => self.write_binary(chunk, op, left, right),
            Expr::Grouping(inner) => self.write_expr(chunk, inner),
            Expr::Call { callable, args, .. } => {
                for arg in args {
                    self.write_expr(chunk, arg);
                }
                self.write_expr(chunk, callable);
                chunk.write_op(Op::Call);
                chunk.write_u8(args.len() as u8);
            }
            Expr::Subscript { object, index, .. } => {
                self.write_expr(chunk, object);
                self.write_expr(chunk, index);
                chunk.write_op(Op::IndexGet);
            }
            Expr::Access { object, member } => {
                self.write_expr(chunk, object);
                chunk.write_op(Op::StructGet);
                chunk.write_u16(member.index);
            }
            Expr::ArrayLiteral { elements, .. } => {
                // Written last to first so popping at runtime restores the
                // source order.
                for element in elements.iter().rev() {
                    self.write_expr(chunk, element);
                }
                chunk.write_op(Op::ArrayLiteral);
                chunk.write_u8(elements.len() as u8);
            }
            Expr::MapLiteral { entries, .. } => {
                for (key, value) in entries.iter().rev() {
                    self.write_expr(chunk, key);
                    self.write_expr(chunk, value);
                }
                chunk.write_op(Op::MapLiteral);
                chunk.write_u8(entries.len() as u8);
            }
            Expr::Cast { to, inner } => {
                self.write_expr(chunk, inner);
                match to.as_ref() {
                    Type::Float => chunk.write_op(Op::FloatCast),
                    Type::Int => {
                        // bool -> int promotion is a representation no-op;
                        // only a float operand needs the conversion.
                        if matches!(inner.ty().map(|t| t.as_ref()), Some(Type::Float)) {
                            chunk.write_op(Op::IntCast);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn write_literal(&self, chunk: &mut Chunk, token: &crate::lexer::Token) {
        match token.kind {
            TokenKind::IntLiteral => {
                let value: i64 = token.text(self.source).parse().unwrap_or(0);
                chunk.write_op(Op::Int);
                chunk.write_i64(value);
            }
            TokenKind::FloatLiteral => {
                let value: f64 = token.text(self.source).parse().unwrap_or(0.0);
                chunk.write_op(Op::Float);
                chunk.write_f64(value);
            }
            TokenKind::StringLiteral => {
                let text = token.text(self.source);
                let body = &text[1..text.len() - 1]; // strip quotes
                let index = chunk.add_string(body);
                chunk.write_op(Op::StringLiteral);
                chunk.write_u64(index);
                chunk.write_u32(body.len() as u32);
            }
            TokenKind::True => chunk.write_op(Op::True),
            TokenKind::False => chunk.write_op(Op::False),
            _ => {}
        }
    }

    fn write_binary(&self, chunk: &mut Chunk, op: &OpSymbol, left: &Expr, right: &Expr) {
        // Short-circuit operators leave the deciding value on the stack.
        match op.token.kind {
            TokenKind::And => {
                self.write_expr(chunk, left);
                let end = chunk.write_jump(Op::And);
                self.write_expr(chunk, right);
                chunk.patch_jump(end);
                return;
            }
            TokenKind::Or => {
                self.write_expr(chunk, left);
                let end = chunk.write_jump(Op::Or);
                self.write_expr(chunk, right);
                chunk.patch_jump(end);
                return;
            }
            _ => {}
        }

        self.write_expr(chunk, left);
        self.write_expr(chunk, right);

        match op.token.kind {
            TokenKind::Plus => chunk.write_op(variant(op, Op::AddI, Op::AddF)),
            TokenKind::Minus => chunk.write_op(variant(op, Op::SubI, Op::SubF)),
            TokenKind::Star => chunk.write_op(variant(op, Op::MulI, Op::MulF)),
            TokenKind::Slash => chunk.write_op(variant(op, Op::DivI, Op::DivF)),
            TokenKind::DoubleSlash => chunk.write_op(Op::DivI),
            TokenKind::Percent => chunk.write_op(Op::ModI),
            TokenKind::Less => chunk.write_op(variant(op, Op::LessI, Op::LessF)),
            TokenKind::Greater => chunk.write_op(variant(op, Op::GreaterI, Op::GreaterF)),
            TokenKind::LessEqual => {
                chunk.write_op(variant(op, Op::GreaterI, Op::GreaterF));
                chunk.write_op(Op::Not);
            }
            TokenKind::GreaterEqual => {
                chunk.write_op(variant(op, Op::LessI, Op::LessF));
                chunk.write_op(Op::Not);
            }
            TokenKind::Equal => chunk.write_op(variant(op, Op::EqualI, Op::EqualF)),
            TokenKind::BangEqual => {
                chunk.write_op(variant(op, Op::EqualI, Op::EqualF));
                chunk.write_op(Op::Not);
            }
            _ => {}
        }
    }
}

/// Instruction variant keyed off the operator symbol's resolved type:
/// float gets the `_F` form, everything else (int, bool) the `_I` form.
fn variant(op: &OpSymbol, int_op: Op, float_op: Op) -> Op {
    match op.ty.as_deref() {
        Some(Type::Float) => float_op,
        _ => int_op,
    }
}
