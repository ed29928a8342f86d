use super::*;

impl<'s> Parser<'s> {
    pub fn new(source: &'s str) -> Self {
        let mut parser = Parser {
            source,
            scanner: Scanner::new(source),
            token: Token {
                kind: TokenKind::Eof,
                span: crate::lexer::Span { start: 0, len: 0 },
            },
            registry: TypeRegistry::new(),
            errors: Vec::new(),
            panic: false,
        };
        // Prime the first token, reporting leading invalid input.
        parser.advance();
        parser
    }

    pub(super) fn error(&mut self, msg: impl Into<String>) {
        if !self.panic {
            let (line, col) = line_col(self.source, self.token.span.start as usize);
            self.errors.push(ParseError::Error {
                msg: msg.into(),
                line,
                col,
            });
        }
        self.panic = true;
    }

    pub(super) fn text(&self, token: Token) -> &'s str {
        token.text(self.source)
    }

    /// Consume the current token, skipping comments and reporting invalid
    /// tokens. Returns the consumed token.
    pub(super) fn advance(&mut self) -> Token {
        let previous = self.token;
        loop {
            self.token = self.scanner.next_token();
            match self.token.kind {
                TokenKind::Comment => continue,
                TokenKind::Invalid => {
                    self.error("Invalid token.");
                    continue;
                }
                _ => break,
            }
        }
        previous
    }

    /// Look one meaningful token past the current one without consuming.
    pub(super) fn peek(&self) -> Token {
        let mut lookahead = self.scanner.clone();
        loop {
            let token = lookahead.next_token();
            if !matches!(token.kind, TokenKind::Comment | TokenKind::Invalid) {
                return token;
            }
        }
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.token.kind == kind
    }

    pub(super) fn consume(&mut self, kind: TokenKind, msg: &str) -> Option<Token> {
        if self.token.kind == kind {
            Some(self.advance())
        } else {
            self.error(msg);
            None
        }
    }

    /// Skip forward to the next statement boundary after a parse error.
    pub(super) fn synchronize(&mut self) {
        if !self.panic {
            return;
        }
        self.panic = false;
        while !self.check(TokenKind::Eof) {
            match self.token.kind {
                TokenKind::Int
                | TokenKind::Float
                | TokenKind::Bool
                | TokenKind::String
                | TokenKind::Type
                | TokenKind::Fn
                | TokenKind::If
                | TokenKind::While
                | TokenKind::CurlyL
                | TokenKind::CurlyR => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    pub fn parse(mut self) -> Result<Ast, Vec<ParseError>> {
        let mut statements = Vec::new();

        while !self.check(TokenKind::Eof) {
            if let Some(stmt) = self.global_declaration() {
                statements.push(stmt);
            }
            self.synchronize();
        }

        if self.errors.is_empty() {
            Ok(Ast {
                head: Block {
                    statements,
                    var_count: 0,
                },
                registry: self.registry,
            })
        } else {
            Err(self.errors)
        }
    }

    pub(super) fn global_declaration(&mut self) -> Option<Stmt> {
        match self.token.kind {
            TokenKind::Fn => self.func_decl(),
            TokenKind::Type => self.type_decl(),
            _ => {
                self.error("Expected a 'fn' or 'type' declaration.");
                self.advance();
                None
            }
        }
    }
}
