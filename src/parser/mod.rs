use thiserror::Error;

use crate::ast::*;
use crate::lexer::{line_col, Scanner, Token, TokenKind};
use crate::types::TypeRegistry;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("error[{line}:{col}]: {msg}")]
    Error {
        msg: String,
        line: usize,
        col: usize,
    },
}

pub struct Parser<'s> {
    source: &'s str,
    scanner: Scanner<'s>,
    token: Token,
    registry: TypeRegistry,
    errors: Vec<ParseError>,
    panic: bool,
}

mod core;
mod expr;
mod stmt;
mod types;
