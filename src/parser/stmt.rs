use super::*;

impl<'s> Parser<'s> {
    /// A declaration or statement inside a function body. A bare identifier
    /// followed by another identifier starts a variable declaration; a `fn`
    /// inside a body declares a closure.
    pub(super) fn declaration(&mut self) -> Option<Stmt> {
        match self.token.kind {
            TokenKind::Identifier => {
                if self.peek().kind == TokenKind::Identifier {
                    self.variable()
                } else {
                    self.statement()
                }
            }
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Bool
            | TokenKind::String
            | TokenKind::SqrL
            | TokenKind::ParenL => self.variable(),
            TokenKind::Any => {
                self.error("'Any' is only allowed as a parameter to native functions.");
                self.advance();
                None
            }
            TokenKind::Fn => self.closure(),
            _ => self.statement(),
        }
    }

    fn statement(&mut self) -> Option<Stmt> {
        match self.token.kind {
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::CurlyL => self.scope(),
            TokenKind::Return => self.return_stmt(),
            _ => self.expr_stmt(),
        }
    }

    /// Expression statements must have an effect: either a call, or an
    /// assignable expression followed by `:=`.
    fn expr_stmt(&mut self) -> Option<Stmt> {
        let expr = self.expression()?;
        let node = match expr {
            Expr::Primary(_) | Expr::Subscript { .. } | Expr::Access { .. } => {
                self.consume(TokenKind::Assign, "Expected ':='.")?;
                let value = self.expression()?;
                Some(Stmt::Assignment {
                    target: expr,
                    value,
                })
            }
            Expr::Call { .. } => Some(Stmt::Call(expr)),
            _ => {
                self.error("Expression has no effect.");
                None
            }
        };
        self.consume(TokenKind::Semicolon, "Expected ';'.")?;
        node
    }

    fn block(&mut self) -> Option<Stmt> {
        self.consume(TokenKind::CurlyL, "Expected '{'.")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::CurlyR) && !self.check(TokenKind::Eof) {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
            self.synchronize();
        }
        self.consume(TokenKind::CurlyR, "Expected '}'.")?;
        Some(Stmt::Block(Block {
            statements,
            var_count: 0,
        }))
    }

    fn scope(&mut self) -> Option<Stmt> {
        match self.block()? {
            Stmt::Block(block) => Some(Stmt::Scope(block)),
            _ => None,
        }
    }

    /// `if`/`while` bodies: either a block, or a single statement wrapped
    /// in a scope so any local it declares is popped.
    fn branch_body(&mut self) -> Option<Stmt> {
        if self.check(TokenKind::CurlyL) {
            self.block()
        } else {
            let stmt = self.declaration()?;
            Some(Stmt::Scope(Block {
                statements: vec![stmt],
                var_count: 0,
            }))
        }
    }

    fn if_stmt(&mut self) -> Option<Stmt> {
        self.advance();
        let condition = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':'.")?;
        let then = self.branch_body()?;

        let otherwise = if self.check(TokenKind::Else) {
            self.advance();
            Some(Box::new(self.branch_body()?))
        } else {
            None
        };

        Some(Stmt::If {
            condition,
            then: Box::new(then),
            otherwise,
        })
    }

    fn while_stmt(&mut self) -> Option<Stmt> {
        self.advance();
        let condition = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':'.")?;
        let body = self.branch_body()?;
        Some(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    fn return_stmt(&mut self) -> Option<Stmt> {
        self.advance();
        if self.check(TokenKind::Semicolon) {
            self.advance();
            return Some(Stmt::Return {
                value: None,
                ty: None,
            });
        }
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';'.")?;
        Some(Stmt::Return {
            value: Some(value),
            ty: None,
        })
    }

    /// `TYPE name [:= expr]` without the terminator; shared between local
    /// variables and struct members.
    fn declarator(&mut self) -> Option<VarDecl> {
        let ty = self.parse_type()?;
        let name = self.consume(TokenKind::Identifier, "Expected identifier.")?;
        let value = if self.check(TokenKind::Assign) {
            self.advance();
            Some(self.expression()?)
        } else {
            None
        };
        Some(VarDecl {
            symbol: Symbol::typed(name, ty),
            value,
        })
    }

    fn variable(&mut self) -> Option<Stmt> {
        let decl = self.declarator()?;
        self.consume(TokenKind::Semicolon, "Expected ';' or ':='.")?;
        Some(Stmt::Var(decl))
    }

    pub(super) fn func_decl(&mut self) -> Option<Stmt> {
        self.advance();

        let name = self.consume(TokenKind::Identifier, "Expected identifier.")?;
        self.consume(TokenKind::ParenL, "Expected '('.")?;

        let mut params = Vec::new();
        if self.check(TokenKind::ParenR) {
            self.advance();
        } else {
            loop {
                let ty = self.parse_type()?;
                let pname = self.consume(TokenKind::Identifier, "Expected identifier.")?;
                params.push(VarDecl {
                    symbol: Symbol::typed(pname, ty),
                    value: None,
                });
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
        let param_types = params
            .iter()
            .map(|p| p.symbol.ty.clone().expect("parameter type is parsed"))
            .collect();
        let fn_type = self.registry.function(ret, param_types);

        let symbol = Symbol::typed(name, fn_type);

        if self.check(TokenKind::Ellipsis) {
            self.advance();
            return Some(Stmt::NativeFn(FnDecl {
                symbol,
                params,
                body: None,
            }));
        }

        let body = if self.check(TokenKind::Equal) {
            // `= expr;` is sugar for `{ return expr; }`
            self.advance();
            let value = self.expression()?;
            self.consume(TokenKind::Semicolon, "Expected ';'.")?;
            Stmt::Return {
                value: Some(value),
                ty: None,
            }
        } else {
            self.block()?
        };

        Some(Stmt::Fn(FnDecl {
            symbol,
            params,
            body: Some(Box::new(body)),
        }))
    }

    fn closure(&mut self) -> Option<Stmt> {
        match self.func_decl()? {
            Stmt::Fn(function) => Some(Stmt::Closure(ClosureDecl {
                function,
                upvalues: Vec::new(),
            })),
            Stmt::NativeFn(_) => {
                self.error("Closures cannot be native functions.");
                None
            }
            _ => None,
        }
    }

    pub(super) fn type_decl(&mut self) -> Option<Stmt> {
        self.advance();
        let name = self.consume(TokenKind::Identifier, "Expected identifier.")?;
        self.consume(TokenKind::Assign, "Expected ':='.")?;

        if self.check(TokenKind::SqrL) {
            self.union_decl(name)
        } else if self.check(TokenKind::CurlyL) {
            self.struct_decl(name)
        } else {
            self.error("Expected either '[' or '{'.");
            None
        }
    }

    fn union_decl(&mut self, name: Token) -> Option<Stmt> {
        self.advance();
        let mut alts = Vec::new();
        loop {
            alts.push(self.parse_type()?);
            if self.check(TokenKind::SqrR) {
                self.advance();
                break;
            }
            self.consume(TokenKind::Pipe, "Expected '|'.")?;
            if alts.len() == 255 {
                self.error("Exceeded maximum number of alternatives (255).");
                return None;
            }
        }

        let union_name = self.text(name);
        let ty = self.registry.union_type(union_name, alts.clone());
        Some(Stmt::Union {
            symbol: Symbol::typed(name, ty),
            alts,
        })
    }

    fn struct_decl(&mut self, name: Token) -> Option<Stmt> {
        self.advance();
        let mut members = Vec::new();
        loop {
            members.push(self.declarator()?);
            if self.check(TokenKind::CurlyR) {
                self.advance();
                break;
            }
            self.consume(TokenKind::Comma, "Expected ','.")?;
            if members.len() == 255 {
                self.error("Exceeded maximum number of members (255).");
                return None;
            }
        }

        let struct_name = self.text(name).to_string();
        let member_types = members
            .iter()
            .map(|m| {
                (
                    self.text(m.symbol.token).to_string(),
                    m.symbol.ty.clone().expect("member type is parsed"),
                )
            })
            .collect();
        let ty = self.registry.struct_type(&struct_name, member_types);

        Some(Stmt::Struct {
            symbol: Symbol::typed(name, ty),
            members,
        })
    }
}
