use super::*;
use crate::types::display;

impl<'s> Validator<'s> {
    /// Pass 1: register every global name so later declarations can be
    /// referenced before their definition.
    pub(super) fn load_global(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Fn(decl) => {
                let ty = self.canonical(
                    &decl.symbol.ty.clone().expect("function type is parsed"),
                    decl.symbol.token,
                );
                let _ = self.declare(decl.symbol.token, ty, false);
            }
            Stmt::NativeFn(decl) => {
                let ty = self.canonical(
                    &decl.symbol.ty.clone().expect("function type is parsed"),
                    decl.symbol.token,
                );
                if let Err(previous) = self.try_declare(decl.symbol.token, ty, false) {
                    let (line, col) =
                        crate::lexer::line_col(self.source, previous.token.span.start as usize);
                    self.error_at(
                        decl.symbol.token,
                        format!(
                            "Redefinition of name: native functions cannot be overloaded \
                             (previously defined at {line}:{col})."
                        ),
                    );
                }
            }
            Stmt::Struct { symbol, .. } | Stmt::Union { symbol, .. } => {
                let ty = symbol.ty.clone().expect("type is registered at parse");
                let _ = self.declare(symbol.token, ty, false);
            }
            _ => {}
        }
    }

    /// Pass 2: analyse one global declaration.
    pub(super) fn analyze_global(&mut self, stmt: Stmt) -> Option<Stmt> {
        match stmt {
            Stmt::Fn(decl) => self.analyze_fn(decl).map(Stmt::Fn),
            Stmt::NativeFn(decl) => self.analyze_native(decl).map(Stmt::NativeFn),
            Stmt::Struct { symbol, members } => self.analyze_struct(symbol, members),
            Stmt::Union { symbol, alts } => self.analyze_union(symbol, alts),
            other => Some(other),
        }
    }

    /// Fill a global declaration's own symbol from its pass-1 binding.
    fn annotate_global_symbol(&mut self, symbol: &mut Symbol) {
        let name = symbol.token.text(self.source);
        if let Some(binding) = self.find_local(0, name) {
            symbol.index = binding.index;
            symbol.ty = Some(binding.ty);
            symbol.is_global = true;
        }
    }

    fn analyze_fn(&mut self, mut decl: FnDecl) -> Option<FnDecl> {
        self.annotate_global_symbol(&mut decl.symbol);
        let return_type = self.function_return(&decl.symbol);

        self.frames
            .push(FnFrame::new(return_type, Some(decl.symbol.token)));
        let ok = self.analyze_fn_inner(&mut decl);
        self.frames.pop();

        if ok {
            Some(decl)
        } else {
            None
        }
    }

    fn function_return(&mut self, symbol: &Symbol) -> TypeHandle {
        match symbol.ty.as_deref() {
            Some(Type::Function { ret, .. }) => ret.clone(),
            _ => self.registry.invalid(),
        }
    }

    /// Shared by plain functions and closure bodies; the caller sets up
    /// the frame. Arguments occupy slots 0..argc-1, locals follow.
    pub(super) fn analyze_fn_inner(&mut self, decl: &mut FnDecl) -> bool {
        let mut ok = true;

        for param in &mut decl.params {
            ok &= self.analyze_param(param);
        }

        let body = match decl.body.take() {
            Some(body) => body,
            None => return false,
        };
        match self.analyze_stmt(*body) {
            Some(checked) => {
                let returns = match &checked {
                    Stmt::Block(block) => {
                        matches!(block.statements.last(), Some(Stmt::Return { .. }))
                    }
                    Stmt::Return { .. } => true,
                    _ => false,
                };
                let ret = self.current_frame().return_type.clone();
                if !matches!(ret.as_ref(), Type::Void) && !returns && ok {
                    self.error_at(
                        decl.symbol.token,
                        "Non-void function doesn't return anything.",
                    );
                    ok = false;
                }
                decl.body = Some(Box::new(checked));
            }
            None => ok = false,
        }

        ok
    }

    fn analyze_param(&mut self, param: &mut VarDecl) -> bool {
        let declared = param.symbol.ty.clone().expect("parameter type is parsed");
        let ty = self.canonical(&declared, param.symbol.token);
        if is_any(&self.registry.resolve(&ty)) {
            self.error_at(
                param.symbol.token,
                "'Any' is only allowed as a parameter to native functions.",
            );
            return false;
        }
        match self.declare(param.symbol.token, ty.clone(), true) {
            Some(index) => {
                param.symbol.ty = Some(ty);
                param.symbol.index = index;
                param.symbol.assignable = true;
                true
            }
            None => false,
        }
    }

    fn analyze_native(&mut self, mut decl: FnDecl) -> Option<FnDecl> {
        self.annotate_global_symbol(&mut decl.symbol);
        // Native signatures may use Any; nothing else to check without a body.
        for param in &mut decl.params {
            let declared = param.symbol.ty.clone().expect("parameter type is parsed");
            param.symbol.ty = Some(self.canonical(&declared, param.symbol.token));
        }
        Some(decl)
    }

    fn analyze_struct(&mut self, mut symbol: Symbol, members: Vec<VarDecl>) -> Option<Stmt> {
        self.annotate_global_symbol(&mut symbol);

        // Members validate in an isolated scope; their indices are
        // positional within the struct.
        let void = self.registry.void();
        self.frames.push(FnFrame::new(void, Some(symbol.token)));
        let mut ok = true;
        let mut checked = Vec::with_capacity(members.len());
        for member in members {
            match self.analyze_variable(member) {
                Some(member) => checked.push(member),
                None => ok = false,
            }
        }
        self.frames.pop();

        if ok {
            Some(Stmt::Struct {
                symbol,
                members: checked,
            })
        } else {
            None
        }
    }

    fn analyze_union(&mut self, mut symbol: Symbol, alts: Vec<TypeHandle>) -> Option<Stmt> {
        self.annotate_global_symbol(&mut symbol);
        let mut ok = true;
        let mut checked = Vec::with_capacity(alts.len());
        for alt in &alts {
            let canonical = self.canonical(alt, symbol.token);
            ok &= !is_invalid(&canonical);
            checked.push(canonical);
        }
        if ok {
            Some(Stmt::Union {
                symbol,
                alts: checked,
            })
        } else {
            None
        }
    }

    pub(super) fn analyze_stmt(&mut self, stmt: Stmt) -> Option<Stmt> {
        match stmt {
            Stmt::Block(block) => self.analyze_block(block).map(Stmt::Block),
            Stmt::Scope(block) => self.analyze_scope(block).map(Stmt::Scope),
            Stmt::If {
                condition,
                then,
                otherwise,
            } => self.analyze_if(condition, *then, otherwise),
            Stmt::While { condition, body } => self.analyze_while(condition, *body),
            Stmt::Assignment { target, value } => self.analyze_assignment(target, value),
            Stmt::Return { value, .. } => self.analyze_return(value),
            Stmt::Call(expr) => {
                let expr = self.analyze_expr(expr)?;
                Some(Stmt::Call(expr))
            }
            Stmt::Var(decl) => self.analyze_variable(decl).map(Stmt::Var),
            Stmt::Closure(decl) => self.analyze_closure(decl),
            other => {
                // Function and type declarations cannot appear here; the
                // parser already rejects them inside bodies.
                Some(other)
            }
        }
    }

    /// Analyse a block in the current scope. `var_count` is the slot
    /// counter delta across the block, which excludes nested scopes.
    fn analyze_block(&mut self, mut block: Block) -> Option<Block> {
        let start = self.current_frame().count;
        let mut ok = true;
        let mut checked = Vec::with_capacity(block.statements.len());

        for stmt in block.statements {
            match self.analyze_stmt(stmt) {
                Some(stmt) => checked.push(stmt),
                None => ok = false,
            }
        }

        block.statements = checked;
        block.var_count = self.current_frame().count - start;
        if ok {
            Some(block)
        } else {
            None
        }
    }

    /// A lexical scope: locals are visible only inside, and sibling scopes
    /// reuse their slots.
    fn analyze_scope(&mut self, block: Block) -> Option<Block> {
        self.push_scope();
        let saved = self.current_frame().count;
        let result = self.analyze_block(block);
        self.current_frame().count = saved;
        self.pop_scope();
        result
    }

    fn analyze_branch(&mut self, stmt: Stmt) -> Option<Stmt> {
        self.push_scope();
        let saved = self.current_frame().count;
        let result = self.analyze_stmt(stmt);
        self.current_frame().count = saved;
        self.pop_scope();
        result
    }

    fn analyze_variable(&mut self, mut decl: VarDecl) -> Option<VarDecl> {
        let mut ok = true;

        // The initialiser is analysed before the name is bound, so it
        // cannot reference the variable being declared.
        let mut value_ty = None;
        if let Some(expr) = decl.value.take() {
            match self.analyze_expr(expr) {
                Some(expr) => {
                    value_ty = expr.ty().cloned();
                    decl.value = Some(expr);
                }
                None => ok = false,
            }
        }

        let declared = decl
            .symbol
            .ty
            .clone()
            .map(|ty| self.canonical(&ty, decl.symbol.token));

        let ty = match declared {
            Some(ty) => ty,
            None => match value_ty.clone() {
                Some(inferred) if !is_invalid(&self.registry.resolve(&inferred)) => inferred,
                _ => {
                    if ok {
                        self.error_at(
                            decl.symbol.token,
                            "Cannot infer a type for this declaration.",
                        );
                    }
                    ok = false;
                    self.registry.invalid()
                }
            },
        };

        if is_any(&self.registry.resolve(&ty)) {
            self.error_at(
                decl.symbol.token,
                "'Any' is only allowed as a parameter to native functions.",
            );
            ok = false;
        }
        if is_invalid(&self.registry.resolve(&ty)) {
            ok = false;
        }

        if decl.value.is_none() && ok {
            // A struct variable without an initialiser is constructed with
            // its default members.
            let resolved = self.registry.resolve(&ty);
            if let Type::Struct { name, .. } = resolved.as_ref() {
                let name = name.clone();
                match self.constructor_call(&name, decl.symbol.token) {
                    Some(call) => decl.value = Some(call),
                    None => ok = false,
                }
            }
        } else if decl.value.is_some() && value_ty.is_some() {
            let value = decl.value.take().expect("initialiser present");
            match self.coerce(&ty, value, "Invalid assignment to variable of different type.") {
                Some(value) => decl.value = Some(value),
                None => ok = false,
            }
        }

        decl.symbol.ty = Some(ty.clone());
        decl.symbol.assignable = true;
        match self.declare(decl.symbol.token, ty, true) {
            Some(index) => decl.symbol.index = index,
            None => ok = false,
        }

        if ok {
            Some(decl)
        } else {
            None
        }
    }

    /// Synthesize the `Name()` constructor call used to default-construct
    /// struct variables; the callable is the struct's global symbol.
    fn constructor_call(&mut self, name: &str, at: Token) -> Option<Expr> {
        let binding = match self.find_local(0, name) {
            Some(binding) => binding,
            None => {
                self.error_at(at, format!("Unknown type '{name}'."));
                return None;
            }
        };

        let callable = Symbol {
            token: binding.token,
            ty: Some(binding.ty.clone()),
            index: binding.index,
            is_global: true,
            upvalue: false,
            assignable: false,
        };
        Some(Expr::Call {
            callable: Box::new(Expr::Primary(callable)),
            args: Vec::new(),
            ty: Some(binding.ty),
        })
    }

    fn analyze_assignment(&mut self, target: Expr, value: Expr) -> Option<Stmt> {
        if let Expr::Primary(symbol) = &target {
            let name = symbol.token.text(self.source);
            if self.lookup_anywhere(name).is_none() {
                // Assignment to an undeclared name declares it with the
                // initialiser's type.
                let decl = VarDecl {
                    symbol: Symbol::new(symbol.token),
                    value: Some(value),
                };
                return self.analyze_variable(decl).map(Stmt::Var);
            }
        }

        let target = self.analyze_expr(target)?;
        if let Expr::Primary(symbol) = &target {
            if !symbol.assignable {
                self.error_at(symbol.token, "Expression is not assignable.");
                return None;
            }
        }

        let to = target.ty().cloned()?;
        let value = self.analyze_expr(value)?;
        let value = self.coerce(
            &to,
            value,
            "Invalid assignment to variable of different type.",
        )?;

        Some(Stmt::Assignment { target, value })
    }

    fn analyze_if(
        &mut self,
        condition: Expr,
        then: Stmt,
        otherwise: Option<Box<Stmt>>,
    ) -> Option<Stmt> {
        let condition = self.analyze_expr(condition)?;
        let mut ok = true;
        if !self.is_condition_type(condition.ty()?) {
            self.error_at(condition.blame_token(), "Expression doesn't return Bool.");
            ok = false;
        }

        let then = match self.analyze_branch(then) {
            Some(stmt) => Some(Box::new(stmt)),
            None => {
                ok = false;
                None
            }
        };
        let otherwise = match otherwise {
            Some(stmt) => match self.analyze_branch(*stmt) {
                Some(stmt) => Some(Box::new(stmt)),
                None => {
                    ok = false;
                    None
                }
            },
            None => None,
        };

        if ok {
            Some(Stmt::If {
                condition,
                then: then.expect("branch validated"),
                otherwise,
            })
        } else {
            None
        }
    }

    fn analyze_while(&mut self, condition: Expr, body: Stmt) -> Option<Stmt> {
        let condition = self.analyze_expr(condition)?;
        let mut ok = true;
        if !self.is_condition_type(condition.ty()?) {
            self.error_at(condition.blame_token(), "Expression doesn't return Bool.");
            ok = false;
        }

        let body = self.analyze_branch(body);
        match (ok, body) {
            (true, Some(body)) => Some(Stmt::While {
                condition,
                body: Box::new(body),
            }),
            _ => None,
        }
    }

    fn analyze_return(&mut self, value: Option<Expr>) -> Option<Stmt> {
        let expected = self.current_frame().return_type.clone();

        let value = match value {
            None => {
                if !matches!(expected.as_ref(), Type::Void) {
                    // A bare `return;` can only leave a void function.
                    let token = self.current_return_blame();
                    self.error_at(
                        token,
                        format!(
                            "Function must return a value of type {}.",
                            display(&expected)
                        ),
                    );
                    return None;
                }
                None
            }
            Some(expr) => {
                let expr = self.analyze_expr(expr)?;
                let ty = expr.ty().cloned()?;
                if !self.registry.same(&ty, &expected) {
                    self.error_at(expr.blame_token(), "Incompatible return type.");
                    return None;
                }
                Some(expr)
            }
        };

        Some(Stmt::Return {
            value,
            ty: Some(expected),
        })
    }

    fn current_return_blame(&self) -> Token {
        // Bare returns have no expression to blame; point at the enclosing
        // function's declaration.
        self.frames
            .last()
            .and_then(|frame| frame.name_token)
            .unwrap_or(Token {
                kind: crate::lexer::TokenKind::Return,
                span: crate::lexer::Span { start: 0, len: 0 },
            })
    }

    fn analyze_closure(&mut self, mut decl: ClosureDecl) -> Option<Stmt> {
        let declared = decl
            .function
            .symbol
            .ty
            .clone()
            .expect("function type is parsed");
        let fn_ty = self.canonical(&declared, decl.function.symbol.token);

        let index = self.declare(decl.function.symbol.token, fn_ty.clone(), false)?;
        decl.function.symbol.index = index;
        decl.function.symbol.ty = Some(fn_ty.clone());

        let return_type = match fn_ty.as_ref() {
            Type::Function { ret, .. } => ret.clone(),
            _ => self.registry.invalid(),
        };

        self.frames
            .push(FnFrame::new(return_type, Some(decl.function.symbol.token)));
        let ok = self.analyze_fn_inner(&mut decl.function);
        let frame = self.frames.pop().expect("closure frame");
        decl.upvalues = frame.upvalues;

        if ok {
            Some(Stmt::Closure(decl))
        } else {
            None
        }
    }
}
