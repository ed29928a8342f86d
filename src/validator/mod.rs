/// Semantic analysis: name resolution, type checking, implicit numeric
/// promotion, closure upvalue capture.
///
/// Two passes over the global block. Pass 1 registers every global symbol
/// so declaration order never matters for calls. Pass 2 analyses each
/// declaration, returning annotated nodes; a failed subtree is pruned and
/// the whole validation fails, but analysis continues so every error in
/// the program is reported.
use std::collections::HashMap;

use thiserror::Error;

use crate::ast::*;
use crate::lexer::{line_col, Token};
use crate::types::{is_any, is_invalid, rank, Type, TypeHandle, TypeRegistry};

#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("error[{line}:{col}]: {msg}")]
    Error {
        msg: String,
        line: usize,
        col: usize,
    },
}

/// A name bound in some scope.
#[derive(Debug, Clone)]
pub(super) struct Binding {
    pub(super) token: Token,
    pub(super) ty: TypeHandle,
    pub(super) index: u16,
    pub(super) assignable: bool,
}

/// Per-function analysis state: block scopes, the local slot counter, and
/// the upvalues this function captures (closures only).
pub(super) struct FnFrame {
    pub(super) scopes: Vec<HashMap<String, Binding>>,
    pub(super) count: u16,
    pub(super) upvalues: Vec<UpvalueSym>,
    pub(super) return_type: TypeHandle,
    /// Declaration token of the function, for diagnostics.
    pub(super) name_token: Option<Token>,
}

impl FnFrame {
    pub(super) fn new(return_type: TypeHandle, name_token: Option<Token>) -> Self {
        FnFrame {
            scopes: vec![HashMap::new()],
            count: 0,
            upvalues: Vec::new(),
            return_type,
            name_token,
        }
    }
}

/// How a value of one type fits a slot of another.
pub(super) enum Fit {
    Exact,
    Promote,
    Incompatible,
}

pub struct Validator<'s> {
    pub(super) source: &'s str,
    pub(super) registry: TypeRegistry,
    pub(super) errors: Vec<SemanticError>,
    /// frames[0] is the global scope; function analysis pushes frames.
    pub(super) frames: Vec<FnFrame>,
}

/// Validate a parsed program, returning the annotated AST or every
/// semantic error found.
pub fn validate(ast: Ast, source: &str) -> Result<Ast, Vec<SemanticError>> {
    let Ast { mut head, registry } = ast;
    let global_ret = registry.void();

    let mut validator = Validator {
        source,
        registry,
        errors: Vec::new(),
        frames: vec![FnFrame::new(global_ret, None)],
    };

    for stmt in &head.statements {
        validator.load_global(stmt);
    }

    let mut checked = Vec::with_capacity(head.statements.len());
    for stmt in head.statements {
        if let Some(stmt) = validator.analyze_global(stmt) {
            checked.push(stmt);
        }
    }
    head.statements = checked;

    if validator.errors.is_empty() {
        Ok(Ast {
            head,
            registry: validator.registry,
        })
    } else {
        Err(validator.errors)
    }
}

impl<'s> Validator<'s> {
    pub(super) fn error_at(&mut self, token: Token, msg: impl Into<String>) {
        let (line, col) = line_col(self.source, token.span.start as usize);
        self.errors.push(SemanticError::Error {
            msg: msg.into(),
            line,
            col,
        });
    }

    pub(super) fn current_frame(&mut self) -> &mut FnFrame {
        self.frames.last_mut().expect("at least the global frame")
    }

    pub(super) fn push_scope(&mut self) {
        self.current_frame().scopes.push(HashMap::new());
    }

    pub(super) fn pop_scope(&mut self) {
        self.current_frame().scopes.pop();
    }

    /// Find a binding in one frame's scope stack, innermost first.
    pub(super) fn find_local(&self, frame: usize, name: &str) -> Option<Binding> {
        self.frames[frame]
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    /// Find a binding anywhere on the scope chain, innermost frame first.
    pub(super) fn lookup_anywhere(&self, name: &str) -> Option<Binding> {
        (0..self.frames.len())
            .rev()
            .find_map(|frame| self.find_local(frame, name))
    }

    /// Bind a name in the innermost scope of the current frame. Matiria
    /// forbids shadowing, so any existing binding on the chain is a
    /// redefinition.
    pub(super) fn try_declare(
        &mut self,
        token: Token,
        ty: TypeHandle,
        assignable: bool,
    ) -> Result<u16, Binding> {
        let name = token.text(self.source).to_string();
        if let Some(previous) = self.lookup_anywhere(&name) {
            return Err(previous);
        }
        let frame = self.current_frame();
        let index = frame.count;
        frame.count += 1;
        frame.scopes.last_mut().expect("frame has a scope").insert(
            name,
            Binding {
                token,
                ty,
                index,
                assignable,
            },
        );
        Ok(index)
    }

    pub(super) fn declare(
        &mut self,
        token: Token,
        ty: TypeHandle,
        assignable: bool,
    ) -> Option<u16> {
        match self.try_declare(token, ty, assignable) {
            Ok(index) => Some(index),
            Err(previous) => {
                let (line, col) = line_col(self.source, previous.token.span.start as usize);
                self.error_at(
                    token,
                    format!("Redefinition of name (previously defined at {line}:{col})."),
                );
                None
            }
        }
    }

    /// Deep-resolve a declared type; unresolved user names are an error.
    pub(super) fn canonical(&mut self, ty: &TypeHandle, at: Token) -> TypeHandle {
        let canonical = self.registry.canonicalize(ty);
        if let Type::User(name) = canonical.as_ref() {
            self.error_at(at, format!("Unknown type '{name}'."));
            return self.registry.invalid();
        }
        canonical
    }

    /// Assignment compatibility: `to ← from` holds on canonical identity,
    /// when `to` is `any`, when `to` is a union containing `from`, or via
    /// numeric promotion (lower rank to higher).
    pub(super) fn fit(&self, to: &TypeHandle, from: &TypeHandle) -> Fit {
        if self.registry.same(to, from) {
            return Fit::Exact;
        }
        let to = self.registry.resolve(to);
        let from = self.registry.resolve(from);
        if is_invalid(&to) || is_invalid(&from) {
            return Fit::Incompatible;
        }
        if is_any(&to) {
            return Fit::Exact;
        }
        if let Type::Union { alts, .. } = to.as_ref() {
            if alts.iter().any(|alt| self.registry.same(alt, &from)) {
                return Fit::Exact;
            }
        }
        match (rank(&from), rank(&to)) {
            (Some(f), Some(t)) if f < t => Fit::Promote,
            _ => Fit::Incompatible,
        }
    }

    /// Fit an expression to an expected type, inserting a promotion cast
    /// when needed; reports `msg` when the types are incompatible.
    pub(super) fn coerce(&mut self, to: &TypeHandle, expr: Expr, msg: &str) -> Option<Expr> {
        let from = expr.ty().cloned()?;
        match self.fit(to, &from) {
            Fit::Exact => Some(expr),
            Fit::Promote => Some(Expr::Cast {
                to: self.registry.resolve(to),
                inner: Box::new(expr),
            }),
            Fit::Incompatible => {
                self.error_at(expr.blame_token(), msg);
                None
            }
        }
    }

    pub(super) fn is_condition_type(&self, ty: &TypeHandle) -> bool {
        matches!(
            self.registry.resolve(ty).as_ref(),
            Type::Bool | Type::Int | Type::Float
        )
    }
}

mod expr;
mod stmt;
