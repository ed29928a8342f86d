/// Whole-pipeline helpers: source text in, compiled package out.
use thiserror::Error;

use crate::compiler::{self, Package};
use crate::parser::{ParseError, Parser};
use crate::validator::{self, SemanticError};

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{}", join_errors(.0))]
    Parse(Vec<ParseError>),
    #[error("{}", join_errors(.0))]
    Semantic(Vec<SemanticError>),
}

impl CompileError {
    /// Process exit code for the first failing phase: 1 for parse errors,
    /// 2 for semantic errors. Runtime failures exit 3, handled by the
    /// caller.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Parse(_) => 1,
            CompileError::Semantic(_) => 2,
        }
    }
}

/// Scan, parse, validate and compile a source file.
pub fn compile(source: &str) -> Result<Package, CompileError> {
    let parser = Parser::new(source);
    let ast = parser.parse().map_err(CompileError::Parse)?;
    let ast = validator::validate(ast, source).map_err(CompileError::Semantic)?;
    Ok(compiler::compile(&ast, source))
}
