use super::*;
use crate::types::TypeHandle;

impl<'s> Parser<'s> {
    /// Type expression: primitive keyword, `[T]` array, `[K, V]` map,
    /// `(T, …) -> R` function, or identifier naming a user type.
    pub(super) fn parse_type(&mut self) -> Option<TypeHandle> {
        match self.token.kind {
            TokenKind::Any
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Bool
            | TokenKind::String => {
                let token = self.advance();
                Some(self.registry.from_token(token.kind))
            }
            TokenKind::SqrL => {
                self.advance();
                let ty = self.array_or_map()?;
                self.consume(TokenKind::SqrR, "Expected ']'.")?;
                Some(ty)
            }
            TokenKind::ParenL => {
                self.advance();
                self.function_type()
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let name = self.text(token);
                Some(self.registry.user(name))
            }
            _ => {
                self.error("Expected a type expression.");
                None
            }
        }
    }

    fn array_or_map(&mut self) -> Option<TypeHandle> {
        let first = self.parse_type()?;
        if self.check(TokenKind::Comma) {
            self.advance();
            let value = self.parse_type()?;
            Some(self.registry.map(first, value))
        } else {
            Some(self.registry.array(first))
        }
    }

    fn function_type(&mut self) -> Option<TypeHandle> {
        let mut params = Vec::new();
        if self.check(TokenKind::ParenR) {
            self.advance();
        } else {
            loop {
                params.push(self.parse_type()?);
                if self.check(TokenKind::ParenR) {
                    self.advance();
                    break;
                }
                self.consume(TokenKind::Comma, "Expected ','.")?;
                if params.len() == 255 {
                    self.error("Exceeded maximum number of parameters (255).");
                    return None;
                }
            }
        }

        let ret = if self.check(TokenKind::Arrow) {
            self.advance();
            self.parse_type()?
        } else {
            self.registry.void()
        };

        Some(self.registry.function(ret, params))
    }
}
