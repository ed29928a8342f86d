use super::*;

/// Pratt precedence levels, weakest first. Binary operators parse their
/// right side one level stronger (left associativity); unary recurses at
/// its own level (right associativity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    None,
    Logic,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Sub,
    Access,
    Primary,
}

impl Precedence {
    pub(super) fn stronger(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Logic,
            Precedence::Logic => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Sub,
            Precedence::Sub => Precedence::Access,
            Precedence::Access | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// Infix binding power of a token kind; `None` when the token is not an
/// infix operator.
fn infix_precedence(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::And | TokenKind::Or => Precedence::Logic,
        TokenKind::Equal | TokenKind::BangEqual => Precedence::Equality,
        TokenKind::Less
        | TokenKind::LessEqual
        | TokenKind::Greater
        | TokenKind::GreaterEqual => Precedence::Comparison,
        TokenKind::Plus | TokenKind::Minus => Precedence::Term,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent | TokenKind::DoubleSlash => {
            Precedence::Factor
        }
        TokenKind::ParenL => Precedence::Call,
        TokenKind::SqrL => Precedence::Sub,
        TokenKind::Dot => Precedence::Access,
        _ => Precedence::None,
    }
}

impl<'s> Parser<'s> {
    pub(super) fn expression(&mut self) -> Option<Expr> {
        self.parse_precedence(Precedence::Logic)
    }

    fn parse_precedence(&mut self, precedence: Precedence) -> Option<Expr> {
        let token = self.advance();
        let mut node = self.prefix(token)?;

        loop {
            let infix = infix_precedence(self.token.kind);
            if infix == Precedence::None || precedence > infix {
                break;
            }
            let token = self.advance();
            node = self.infix(token, node)?;
        }

        Some(node)
    }

    fn prefix(&mut self, token: Token) -> Option<Expr> {
        match token.kind {
            TokenKind::Minus | TokenKind::Bang => self.unary(token),
            TokenKind::ParenL => self.grouping(),
            TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::True
            | TokenKind::False => Some(Expr::Literal { token, ty: None }),
            TokenKind::Identifier => Some(Expr::Primary(Symbol::new(token))),
            TokenKind::SqrL => self.array_literal(),
            TokenKind::CurlyL => self.map_literal(),
            _ => {
                self.error("Expected expression.");
                None
            }
        }
    }

    fn infix(&mut self, token: Token, left: Expr) -> Option<Expr> {
        match token.kind {
            TokenKind::ParenL => self.call(left),
            TokenKind::SqrL => self.subscript(left),
            TokenKind::Dot => self.access(left),
            _ => self.binary(token, left),
        }
    }

    fn unary(&mut self, op: Token) -> Option<Expr> {
        let right = self.parse_precedence(Precedence::Unary)?;
        Some(Expr::Unary {
            op: OpSymbol {
                token: op,
                ty: None,
            },
            right: Box::new(right),
        })
    }

    fn binary(&mut self, op: Token, left: Expr) -> Option<Expr> {
        let right = self.parse_precedence(infix_precedence(op.kind).stronger())?;
        Some(Expr::Binary {
            op: OpSymbol {
                token: op,
                ty: None,
            },
            left: Box::new(left),
            right: Box::new(right),
            ty: None,
        })
    }

    fn grouping(&mut self) -> Option<Expr> {
        let inner = self.expression()?;
        self.consume(TokenKind::ParenR, "Expected ')'.")?;
        Some(Expr::Grouping(Box::new(inner)))
    }

    fn array_literal(&mut self) -> Option<Expr> {
        let mut elements = Vec::new();
        loop {
            elements.push(self.expression()?);
            if self.check(TokenKind::SqrR) {
                self.advance();
                break;
            }
            self.consume(TokenKind::Comma, "Expected ','.")?;
            if elements.len() == 255 {
                self.error("Exceeded maximum number of elements (255).");
                return None;
            }
        }
        Some(Expr::ArrayLiteral { elements, ty: None })
    }

    fn map_literal(&mut self) -> Option<Expr> {
        let mut entries = Vec::new();
        loop {
            let key = self.expression()?;
            self.consume(TokenKind::Colon, "Expected ':'.")?;
            let value = self.expression()?;
            entries.push((key, value));
            if self.check(TokenKind::CurlyR) {
                self.advance();
                break;
            }
            self.consume(TokenKind::Comma, "Expected ','.")?;
            if entries.len() == 255 {
                self.error("Exceeded maximum number of entries (255).");
                return None;
            }
        }
        Some(Expr::MapLiteral { entries, ty: None })
    }

    fn call(&mut self, callable: Expr) -> Option<Expr> {
        let mut args = Vec::new();
        if self.check(TokenKind::ParenR) {
            self.advance();
        } else {
            loop {
                args.push(self.expression()?);
                if self.check(TokenKind::ParenR) {
                    self.advance();
                    break;
                }
                self.consume(TokenKind::Comma, "Expected ','.")?;
                if args.len() == 255 {
                    self.error("Exceeded maximum number of arguments (255).");
                    return None;
                }
            }
        }
        Some(Expr::Call {
            callable: Box::new(callable),
            args,
            ty: None,
        })
    }

    fn subscript(&mut self, object: Expr) -> Option<Expr> {
        let index = self.expression()?;
        self.consume(TokenKind::SqrR, "Expected ']'.")?;
        Some(Expr::Subscript {
            object: Box::new(object),
            index: Box::new(index),
            ty: None,
        })
    }

    fn access(&mut self, object: Expr) -> Option<Expr> {
        let member = self.consume(TokenKind::Identifier, "Expected member name after '.'.")?;
        Some(Expr::Access {
            object: Box::new(object),
            member: Symbol::new(member),
        })
    }
}
