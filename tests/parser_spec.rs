/// Spec tests for the Matiria parser: declaration grammar, statement
/// forms, Pratt precedence shapes, and panic-mode error recovery.
use matiria::ast::{Ast, Block, Expr, Stmt};
use matiria::lexer::TokenKind;
use matiria::parser::{ParseError, Parser};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse(source: &str) -> Ast {
    Parser::new(source).parse().expect("source should parse")
}

fn parse_errors(source: &str) -> Vec<ParseError> {
    Parser::new(source)
        .parse()
        .err()
        .expect("source should fail to parse")
}

/// The body block of the first function declaration.
fn first_fn_body(ast: &Ast) -> &Block {
    for stmt in &ast.head.statements {
        if let Stmt::Fn(decl) = stmt {
            match decl.body.as_deref() {
                Some(Stmt::Block(block)) => return block,
                other => panic!("expected a block body, got {other:?}"),
            }
        }
    }
    panic!("no function declaration found");
}

/// Expression of the first statement in `main`'s body, which the tests
/// write as a single `return <expr>;`.
fn main_return_expr(source: &str) -> Expr {
    let ast = parse(source);
    let body = first_fn_body(&ast);
    match body.statements.first() {
        Some(Stmt::Return {
            value: Some(expr), ..
        }) => expr.clone(),
        other => panic!("expected a return statement, got {other:?}"),
    }
}

fn expr(source_expr: &str) -> Expr {
    main_return_expr(&format!("fn main() -> Int {{ return {source_expr}; }}"))
}

fn op_kind(e: &Expr) -> TokenKind {
    match e {
        Expr::Binary { op, .. } => op.token.kind,
        Expr::Unary { op, .. } => op.token.kind,
        other => panic!("expected an operator expression, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Global declarations
// ---------------------------------------------------------------------------

#[test]
fn function_declaration() {
    let ast = parse("fn main() -> Int { return 0; }");
    assert_eq!(ast.head.statements.len(), 1);
    assert!(matches!(ast.head.statements[0], Stmt::Fn(_)));
}

#[test]
fn function_without_return_type() {
    let ast = parse("fn main() { }");
    assert!(matches!(ast.head.statements[0], Stmt::Fn(_)));
}

#[test]
fn function_with_parameters() {
    let ast = parse("fn add(Int a, Int b) -> Int { return a; }");
    match &ast.head.statements[0] {
        Stmt::Fn(decl) => assert_eq!(decl.params.len(), 2),
        other => panic!("expected a function, got {other:?}"),
    }
}

#[test]
fn expression_bodied_function_is_sugar_for_return() {
    let ast = parse("fn two() -> Int = 2;");
    match &ast.head.statements[0] {
        Stmt::Fn(decl) => {
            assert!(matches!(
                decl.body.as_deref(),
                Some(Stmt::Return { value: Some(_), .. })
            ));
        }
        other => panic!("expected a function, got {other:?}"),
    }
}

#[test]
fn native_function_has_no_body() {
    let ast = parse("fn print(Any value) ...");
    match &ast.head.statements[0] {
        Stmt::NativeFn(decl) => assert!(decl.body.is_none()),
        other => panic!("expected a native declaration, got {other:?}"),
    }
}

#[test]
fn union_type_declaration() {
    let ast = parse("type Number := [Int | Float]");
    match &ast.head.statements[0] {
        Stmt::Union { alts, .. } => assert_eq!(alts.len(), 2),
        other => panic!("expected a union, got {other:?}"),
    }
}

#[test]
fn struct_type_declaration() {
    let ast = parse("type Pair := { Int a, Int b }");
    match &ast.head.statements[0] {
        Stmt::Struct { members, .. } => assert_eq!(members.len(), 2),
        other => panic!("expected a struct, got {other:?}"),
    }
}

#[test]
fn struct_member_with_default() {
    let ast = parse("type Point := { Int x := 1, Int y }");
    match &ast.head.statements[0] {
        Stmt::Struct { members, .. } => {
            assert!(members[0].value.is_some());
            assert!(members[1].value.is_none());
        }
        other => panic!("expected a struct, got {other:?}"),
    }
}

#[test]
fn statement_at_global_scope_is_an_error() {
    parse_errors("x := 1;");
}

#[test]
fn empty_type_declaration_is_an_error() {
    parse_errors("type T := ;");
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[test]
fn variable_declaration_with_initialiser() {
    let ast = parse("fn main() { Int x := 3; }");
    let body = first_fn_body(&ast);
    match &body.statements[0] {
        Stmt::Var(decl) => assert!(decl.value.is_some()),
        other => panic!("expected a declaration, got {other:?}"),
    }
}

#[test]
fn variable_declaration_without_initialiser() {
    let ast = parse("fn main() { [Int] xs; }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::Var(decl) if decl.value.is_none()));
}

#[test]
fn bare_identifier_assignment() {
    let ast = parse("fn main() { x := 1; }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::Assignment { .. }));
}

#[test]
fn subscript_assignment() {
    let ast = parse("fn main() { xs[0] := 1; }");
    let body = first_fn_body(&ast);
    match &body.statements[0] {
        Stmt::Assignment { target, .. } => assert!(matches!(target, Expr::Subscript { .. })),
        other => panic!("expected an assignment, got {other:?}"),
    }
}

#[test]
fn member_assignment() {
    let ast = parse("fn main() { p.a := 1; }");
    let body = first_fn_body(&ast);
    match &body.statements[0] {
        Stmt::Assignment { target, .. } => assert!(matches!(target, Expr::Access { .. })),
        other => panic!("expected an assignment, got {other:?}"),
    }
}

#[test]
fn call_statement() {
    let ast = parse("fn main() { go(); }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::Call(_)));
}

#[test]
fn expression_without_effect_is_an_error() {
    parse_errors("fn main() { 1 + 2; }");
}

#[test]
fn if_with_block() {
    let ast = parse("fn main() { if 1: { go(); } }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::If { .. }));
}

#[test]
fn if_single_statement_body_is_scoped() {
    let ast = parse("fn main() { if 1: go(); }");
    let body = first_fn_body(&ast);
    match &body.statements[0] {
        Stmt::If { then, .. } => assert!(matches!(then.as_ref(), Stmt::Scope(_))),
        other => panic!("expected an if, got {other:?}"),
    }
}

#[test]
fn if_else() {
    let ast = parse("fn main() { if 1: go(); else stop(); }");
    let body = first_fn_body(&ast);
    match &body.statements[0] {
        Stmt::If { otherwise, .. } => assert!(otherwise.is_some()),
        other => panic!("expected an if, got {other:?}"),
    }
}

#[test]
fn while_statement() {
    let ast = parse("fn main() { while 1: go(); }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::While { .. }));
}

#[test]
fn nested_scope() {
    let ast = parse("fn main() { { go(); } }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::Scope(_)));
}

#[test]
fn bare_return() {
    let ast = parse("fn main() { return; }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::Return { value: None, .. }));
}

#[test]
fn closure_inside_a_body() {
    let ast = parse("fn outer() { fn inner() -> Int = 1; }");
    let body = first_fn_body(&ast);
    assert!(matches!(&body.statements[0], Stmt::Closure(_)));
}

#[test]
fn native_closure_is_an_error() {
    parse_errors("fn outer() { fn inner() ... }");
}

// ---------------------------------------------------------------------------
// Expression precedence
// ---------------------------------------------------------------------------

#[test]
fn factor_binds_tighter_than_term() {
    // 3 + 4 * 2 parses as 3 + (4 * 2)
    let e = expr("3 + 4 * 2");
    assert_eq!(op_kind(&e), TokenKind::Plus);
    match &e {
        Expr::Binary { right, .. } => assert_eq!(op_kind(right), TokenKind::Star),
        _ => unreachable!(),
    }
}

#[test]
fn term_is_left_associative() {
    // 1 - 2 - 3 parses as (1 - 2) - 3
    let e = expr("1 - 2 - 3");
    assert_eq!(op_kind(&e), TokenKind::Minus);
    match &e {
        Expr::Binary { left, right, .. } => {
            assert_eq!(op_kind(left), TokenKind::Minus);
            assert!(matches!(right.as_ref(), Expr::Literal { .. }));
        }
        _ => unreachable!(),
    }
}

#[test]
fn comparison_binds_looser_than_term() {
    // a + 1 < b parses as (a + 1) < b
    let e = expr("a + 1 < b");
    assert_eq!(op_kind(&e), TokenKind::Less);
}

#[test]
fn equality_binds_looser_than_comparison() {
    // a < b = c < d parses as (a < b) = (c < d)
    let e = expr("a < b = c < d");
    assert_eq!(op_kind(&e), TokenKind::Equal);
}

#[test]
fn logic_is_the_weakest() {
    // a = b && c = d parses as (a = b) && (c = d)
    let e = expr("a = b && c = d");
    assert_eq!(op_kind(&e), TokenKind::And);
}

#[test]
fn grouping_overrides_precedence() {
    // (3 + 4) * 2
    let e = expr("(3 + 4) * 2");
    assert_eq!(op_kind(&e), TokenKind::Star);
    match &e {
        Expr::Binary { left, .. } => assert!(matches!(left.as_ref(), Expr::Grouping(_))),
        _ => unreachable!(),
    }
}

#[test]
fn unary_binds_tighter_than_factor() {
    // -a * b parses as (-a) * b
    let e = expr("-a * b");
    assert_eq!(op_kind(&e), TokenKind::Star);
    match &e {
        Expr::Binary { left, .. } => assert_eq!(op_kind(left), TokenKind::Minus),
        _ => unreachable!(),
    }
}

#[test]
fn unary_is_right_associative() {
    let e = expr("!!a");
    assert_eq!(op_kind(&e), TokenKind::Bang);
    match &e {
        Expr::Unary { right, .. } => assert_eq!(op_kind(right), TokenKind::Bang),
        _ => unreachable!(),
    }
}

#[test]
fn call_is_postfix() {
    let e = expr("f(1, 2)");
    match &e {
        Expr::Call { args, .. } => assert_eq!(args.len(), 2),
        other => panic!("expected a call, got {other:?}"),
    }
}

#[test]
fn call_chains() {
    let e = expr("f(1)(2)");
    match &e {
        Expr::Call { callable, .. } => assert!(matches!(callable.as_ref(), Expr::Call { .. })),
        other => panic!("expected a call, got {other:?}"),
    }
}

#[test]
fn subscript_is_postfix() {
    let e = expr("xs[0]");
    assert!(matches!(e, Expr::Subscript { .. }));
}

#[test]
fn access_chains_left() {
    let e = expr("a.b.c");
    match &e {
        Expr::Access { object, .. } => assert!(matches!(object.as_ref(), Expr::Access { .. })),
        other => panic!("expected an access, got {other:?}"),
    }
}

#[test]
fn array_literal() {
    let e = expr("[1, 2, 3]");
    match &e {
        Expr::ArrayLiteral { elements, .. } => assert_eq!(elements.len(), 3),
        other => panic!("expected an array literal, got {other:?}"),
    }
}

#[test]
fn map_literal() {
    let e = expr("{1: 2, 3: 4}");
    match &e {
        Expr::MapLiteral { entries, .. } => assert_eq!(entries.len(), 2),
        other => panic!("expected a map literal, got {other:?}"),
    }
}

#[test]
fn empty_array_literal_is_an_error() {
    parse_errors("fn main() { return []; }");
}

// ---------------------------------------------------------------------------
// Error recovery
// ---------------------------------------------------------------------------

#[test]
fn missing_semicolon_is_reported() {
    let errors = parse_errors("fn main() { Int x := 1 }");
    assert!(!errors.is_empty());
}

#[test]
fn recovery_reports_errors_in_separate_functions() {
    // An error in the first function must not hide one in the second.
    let errors = parse_errors(
        "fn first() { Int x := ; }\n\
         fn second() { Int y := ; }",
    );
    assert!(errors.len() >= 2, "expected both errors, got {errors:?}");
}

#[test]
fn cascading_errors_are_suppressed_within_a_statement() {
    // One malformed statement produces one diagnostic, not a cascade.
    let errors = parse_errors("fn main() { Int x := + + + ; }");
    assert_eq!(errors.len(), 1, "got {errors:?}");
}

#[test]
fn error_carries_location() {
    let errors = parse_errors("fn main() {\n  Int x := ;\n}");
    let message = errors[0].to_string();
    assert!(message.contains("error[2:"), "got: {message}");
}

#[test]
fn invalid_token_is_reported() {
    let errors = parse_errors("fn main() { Int x := 1 @ 2; }");
    assert!(!errors.is_empty());
}
