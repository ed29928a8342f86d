use super::*;
use crate::lexer::TokenKind;
use crate::types::display;

impl<'s> Validator<'s> {
    pub(super) fn analyze_expr(&mut self, expr: Expr) -> Option<Expr> {
        match expr {
            Expr::Literal { token, .. } => Some(Expr::Literal {
                token,
                ty: Some(self.registry.from_token(token.kind)),
            }),
            Expr::Primary(symbol) => self.analyze_primary(symbol),
            Expr::Unary { op, right } => self.analyze_unary(op, *right),
            Expr::Binary {
                op, left, right, ..
            } => self.analyze_binary(op, *left, *right),
            Expr::Grouping(inner) => {
                let inner = self.analyze_expr(*inner)?;
                Some(Expr::Grouping(Box::new(inner)))
            }
            Expr::Call {
                callable, args, ..
            } => self.analyze_call(*callable, args),
            Expr::Subscript { object, index, .. } => self.analyze_subscript(*object, *index),
            Expr::Access { object, member } => self.analyze_access(*object, member),
            Expr::ArrayLiteral { elements, .. } => self.analyze_array_literal(elements),
            Expr::MapLiteral { entries, .. } => self.analyze_map_literal(entries),
            // Already-annotated promotion; re-validation keeps it in place.
            Expr::Cast { to, inner } => {
                let inner = self.analyze_expr(*inner)?;
                Some(Expr::Cast {
                    to,
                    inner: Box::new(inner),
                })
            }
        }
    }

    fn analyze_primary(&mut self, mut symbol: Symbol) -> Option<Expr> {
        let name = symbol.token.text(self.source).to_string();
        let current = self.frames.len() - 1;

        // Local of the current function
        if let Some(binding) = self.find_local(current, &name) {
            symbol.ty = Some(binding.ty);
            symbol.index = binding.index;
            symbol.assignable = binding.assignable;
            return Some(Expr::Primary(symbol));
        }

        // Local of an enclosing function: only reachable through a closure,
        // which captures it as an upvalue.
        if current > 1 {
            if let Some((slot, ty, assignable)) = self.capture(current, &name, symbol.token) {
                symbol.upvalue = true;
                symbol.index = slot;
                symbol.ty = Some(ty);
                symbol.assignable = assignable;
                return Some(Expr::Primary(symbol));
            }
        }

        // Global
        if let Some(binding) = self.find_local(0, &name) {
            symbol.is_global = true;
            symbol.ty = Some(binding.ty);
            symbol.index = binding.index;
            symbol.assignable = binding.assignable;
            return Some(Expr::Primary(symbol));
        }

        self.error_at(symbol.token, "Undeclared variable.");
        None
    }

    /// Resolve `name` as an upvalue of `frame`, registering capture slots
    /// down the chain. A hit in the immediately enclosing function is a
    /// `local` capture; a hit further out chains through the intermediate
    /// closures with `local = false`.
    fn capture(
        &mut self,
        frame: usize,
        name: &str,
        token: Token,
    ) -> Option<(u16, TypeHandle, bool)> {
        if frame <= 1 {
            return None;
        }
        let parent = frame - 1;
        if let Some(binding) = self.find_local(parent, name) {
            let slot = self.add_upvalue(frame, token, binding.index, true);
            return Some((slot, binding.ty, binding.assignable));
        }
        let (parent_slot, ty, assignable) = self.capture(parent, name, token)?;
        let slot = self.add_upvalue(frame, token, parent_slot, false);
        Some((slot, ty, assignable))
    }

    fn add_upvalue(&mut self, frame: usize, token: Token, index: u16, local: bool) -> u16 {
        let source = self.source;
        let name = token.text(source);
        let upvalues = &mut self.frames[frame].upvalues;
        if let Some(existing) = upvalues.iter().position(|u| u.token.text(source) == name) {
            return existing as u16;
        }
        upvalues.push(UpvalueSym {
            token,
            index,
            local,
        });
        (upvalues.len() - 1) as u16
    }

    fn analyze_unary(&mut self, mut op: OpSymbol, right: Expr) -> Option<Expr> {
        let right = self.analyze_expr(right)?;
        let operand = right.ty().cloned()?;

        match op.token.kind {
            TokenKind::Bang => {
                if !self.is_condition_type(&operand) {
                    self.error_at(op.token, "Invalid operand to '!'.");
                    return None;
                }
                op.ty = Some(self.registry.bool_type());
            }
            TokenKind::Minus => {
                let resolved = self.registry.resolve(&operand);
                if !matches!(resolved.as_ref(), Type::Int | Type::Float) {
                    self.error_at(op.token, "Invalid operand to unary '-'.");
                    return None;
                }
                op.ty = Some(resolved);
            }
            _ => {
                self.error_at(op.token, "Invalid unary operator.");
                return None;
            }
        }

        Some(Expr::Unary {
            op,
            right: Box::new(right),
        })
    }

    fn analyze_binary(&mut self, mut op: OpSymbol, left: Expr, right: Expr) -> Option<Expr> {
        let left = self.analyze_expr(left)?;
        let right = self.analyze_expr(right)?;
        let lt = left.ty().cloned()?;
        let rt = right.ty().cloned()?;

        use TokenKind::*;
        let (left, right, node_ty, op_ty) = match op.token.kind {
            And | Or => {
                if !self.is_condition_type(&lt) || !self.is_condition_type(&rt) {
                    self.error_at(op.token, "Invalid operands to logical operator.");
                    return None;
                }
                let b = self.registry.bool_type();
                (left, right, b.clone(), b)
            }
            Percent | DoubleSlash => {
                let int = self.registry.int();
                let lr = rank(&self.registry.resolve(&lt));
                let rr = rank(&self.registry.resolve(&rt));
                match (lr, rr) {
                    (Some(l), Some(r)) if l <= 1 && r <= 1 => {}
                    _ => {
                        self.error_at(op.token, "Operator requires integer operands.");
                        return None;
                    }
                }
                let left = self.promote(left, &int);
                let right = self.promote(right, &int);
                (left, right, int.clone(), int)
            }
            Plus | Minus | Star | Slash => {
                let result = self.numeric_result(&lt, &rt, op.token)?;
                let left = self.promote(left, &result);
                let right = self.promote(right, &result);
                (left, right, result.clone(), result)
            }
            Equal | BangEqual | Less | LessEqual | Greater | GreaterEqual => {
                let variant = self.numeric_result(&lt, &rt, op.token)?;
                let left = self.promote(left, &variant);
                let right = self.promote(right, &variant);
                (left, right, self.registry.bool_type(), variant)
            }
            _ => {
                self.error_at(op.token, "Invalid binary operator.");
                return None;
            }
        };

        op.ty = Some(op_ty);
        Some(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty: Some(node_ty),
        })
    }

    /// Result type of an arithmetic or relational operation: the
    /// higher-ranked operand type. Non-numeric operands are an error.
    fn numeric_result(&mut self, lt: &TypeHandle, rt: &TypeHandle, at: Token) -> Option<TypeHandle> {
        let lr = self.registry.resolve(lt);
        let rr = self.registry.resolve(rt);
        match (rank(&lr), rank(&rr)) {
            (Some(l), Some(r)) => Some(if l >= r { lr } else { rr }),
            _ => {
                self.error_at(at, "Invalid operation between objects of different types.");
                None
            }
        }
    }

    /// Wrap `expr` in a promotion cast when its type is below `to`.
    fn promote(&mut self, expr: Expr, to: &TypeHandle) -> Expr {
        let from = match expr.ty() {
            Some(t) => self.registry.resolve(t),
            None => return expr,
        };
        let to = self.registry.resolve(to);
        match (rank(&from), rank(&to)) {
            (Some(f), Some(t)) if f < t => Expr::Cast {
                to,
                inner: Box::new(expr),
            },
            _ => expr,
        }
    }

    fn analyze_call(&mut self, callable: Expr, args: Vec<Expr>) -> Option<Expr> {
        let callable = self.analyze_expr(callable)?;
        let callable_ty = self.registry.resolve(callable.ty()?);

        let (ret, params) = match callable_ty.as_ref() {
            Type::Function { ret, params } => (ret.clone(), params.clone()),
            _ => {
                self.error_at(callable.blame_token(), "Expression is not callable.");
                return None;
            }
        };

        if args.len() < params.len() {
            self.error_at(callable.blame_token(), "Expected more arguments.");
            return None;
        }
        if args.len() > params.len() {
            self.error_at(callable.blame_token(), "Too many arguments.");
            return None;
        }

        let mut checked = Vec::with_capacity(args.len());
        for (arg, param) in args.into_iter().zip(params.iter()) {
            let arg = self.analyze_expr(arg)?;
            let arg = self.coerce(param, arg, "Wrong type of argument.")?;
            checked.push(arg);
        }

        Some(Expr::Call {
            callable: Box::new(callable),
            args: checked,
            ty: Some(ret),
        })
    }

    fn analyze_subscript(&mut self, object: Expr, index: Expr) -> Option<Expr> {
        let object = self.analyze_expr(object)?;
        let index = self.analyze_expr(index)?;
        let object_ty = self.registry.resolve(object.ty()?);
        let index_ty = index.ty().cloned()?;

        let result = match object_ty.as_ref() {
            Type::Array(element) => {
                if !self.registry.same(&index_ty, &self.registry.int()) {
                    self.error_at(index.blame_token(), "Index has to be an integral expression.");
                    return None;
                }
                element.clone()
            }
            Type::Map(key, value) => {
                if !self.registry.same(&index_ty, key) {
                    self.error_at(index.blame_token(), "Index doesn't match key type.");
                    return None;
                }
                value.clone()
            }
            // Strings type-check like arrays of one-character strings; the
            // operation itself is rejected by the object dispatch at runtime.
            Type::String => {
                if !self.registry.same(&index_ty, &self.registry.int()) {
                    self.error_at(index.blame_token(), "Index has to be an integral expression.");
                    return None;
                }
                self.registry.string()
            }
            _ => {
                self.error_at(object.blame_token(), "Expression is not subscriptable.");
                return None;
            }
        };

        Some(Expr::Subscript {
            object: Box::new(object),
            index: Box::new(index),
            ty: Some(result),
        })
    }

    fn analyze_access(&mut self, object: Expr, mut member: Symbol) -> Option<Expr> {
        let object = self.analyze_expr(object)?;
        let object_ty = self.registry.resolve(object.ty()?);

        let members = match object_ty.as_ref() {
            Type::Struct { members, .. } => members.clone(),
            _ => {
                self.error_at(object.blame_token(), "Expression is not accessible.");
                return None;
            }
        };

        let name = member.token.text(self.source);
        for (position, (member_name, member_ty)) in members.iter().enumerate() {
            if member_name == name {
                member.index = position as u16;
                member.ty = Some(self.canonical(&member_ty.clone(), member.token));
                member.assignable = true;
                return Some(Expr::Access {
                    object: Box::new(object),
                    member,
                });
            }
        }

        self.error_at(
            member.token,
            format!("No member '{}' in '{}'.", name, display(&object_ty)),
        );
        None
    }

    fn analyze_array_literal(&mut self, elements: Vec<Expr>) -> Option<Expr> {
        let mut checked = Vec::with_capacity(elements.len());
        let mut element_ty: Option<TypeHandle> = None;

        for element in elements {
            let element = self.analyze_expr(element)?;
            let ty = element.ty().cloned()?;
            match &element_ty {
                None => element_ty = Some(ty),
                Some(first) => {
                    if !self.registry.same(first, &ty) {
                        self.error_at(
                            element.blame_token(),
                            "Array literal must contain expressions of the same type.",
                        );
                        return None;
                    }
                }
            }
            checked.push(element);
        }

        let element_ty = element_ty?;
        let ty = self.registry.array(element_ty);
        Some(Expr::ArrayLiteral {
            elements: checked,
            ty: Some(ty),
        })
    }

    fn analyze_map_literal(&mut self, entries: Vec<(Expr, Expr)>) -> Option<Expr> {
        let mut checked = Vec::with_capacity(entries.len());
        let mut key_ty: Option<TypeHandle> = None;
        let mut value_ty: Option<TypeHandle> = None;

        for (key, value) in entries {
            let key = self.analyze_expr(key)?;
            let value = self.analyze_expr(value)?;
            let kt = key.ty().cloned()?;
            let vt = value.ty().cloned()?;

            match &key_ty {
                None => {
                    if !matches!(
                        self.registry.resolve(&kt).as_ref(),
                        Type::Int | Type::Float | Type::Bool | Type::String
                    ) {
                        self.error_at(key.blame_token(), "Invalid map key type.");
                        return None;
                    }
                    key_ty = Some(kt);
                }
                Some(first) => {
                    if !self.registry.same(first, &kt) {
                        self.error_at(
                            key.blame_token(),
                            "Map literal must contain expressions of the same type.",
                        );
                        return None;
                    }
                }
            }
            match &value_ty {
                None => value_ty = Some(vt),
                Some(first) => {
                    if !self.registry.same(first, &vt) {
                        self.error_at(
                            value.blame_token(),
                            "Map literal must contain expressions of the same type.",
                        );
                        return None;
                    }
                }
            }
            checked.push((key, value));
        }

        let ty = self.registry.map(key_ty?, value_ty?);
        Some(Expr::MapLiteral {
            entries: checked,
            ty: Some(ty),
        })
    }
}
