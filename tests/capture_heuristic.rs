//! Property and end-to-end tests for the expression heuristic
//!
//! The classifier is a heuristic, not a parser; these tests pin down its
//! behavior on the shapes users actually type, plus generated inputs.

use cadenza::repl::capture::{CAPTURE_FUNCTION, SnippetKind, classify, transform};
use cadenza::repl::{Repl, ReplConfig};
use cadenza::script;
use proptest::prelude::*;

fn repl() -> Repl {
    let mut repl = Repl::new(script::factory());
    repl.initialize(ReplConfig::default()).unwrap();
    repl
}

#[test]
fn end_to_end_declaration_then_expression() {
    let mut repl = repl();

    let decl = repl.evaluate("let x = 42");
    assert!(decl.success);
    assert!(decl.value.is_none(), "declarations capture nothing");

    let expr = repl.evaluate("x + 1");
    assert_eq!(expr.value.as_deref(), Some("43"));
    assert_eq!(expr.type_name.as_deref(), Some("Int"));
}

#[test]
fn capture_slot_does_not_leak_between_evaluations() {
    let mut repl = repl();
    assert_eq!(repl.evaluate("1 + 1").value.as_deref(), Some("2"));
    // The next (valueless) evaluation must not see the stale 2.
    let decl = repl.evaluate("let y = 9");
    assert!(decl.value.is_none());
}

#[test]
fn classifier_table() {
    let expressions = [
        "1 + 2",
        "3.14 * 2.0",
        "true && false",
        "a == b",
        "x <= 3",
        "print(\"hello\")",
        "42",
        "\"literal\"",
        "return",
        "\"a = b\"",
    ];
    for snippet in expressions {
        assert_eq!(
            classify(snippet),
            SnippetKind::Expression,
            "expected expression: {snippet}"
        );
    }

    let statements = [
        "let x = 42",
        "var name = \"cadenza\"",
        "x = x + 1",
        "x += 1",
        "type Celsius = Int",
        "extern clock",
        "foo",
        "foo()",
        "f(x = 5)",
    ];
    for snippet in statements {
        assert_eq!(
            classify(snippet),
            SnippetKind::Statement,
            "expected statement: {snippet}"
        );
    }
}

proptest! {
    /// Anything of the form `let <ident> = <int>` is a declaration.
    #[test]
    fn let_bindings_always_classify_as_statements(
        name in "[a-z][a-z0-9_]{0,8}",
        value in any::<i32>(),
    ) {
        let snippet = format!("let {} = {}", name, value);
        prop_assert_eq!(classify(&snippet), SnippetKind::Statement);
        // Statements pass through the transform untouched.
        let transformed = transform(&snippet);
        prop_assert_eq!(transformed.as_ref(), snippet.as_str());
    }

    /// Binary arithmetic over identifiers and literals is an expression.
    #[test]
    fn arithmetic_always_classifies_as_expression(
        lhs in "[a-z][a-z0-9]{0,4}",
        op in proptest::sample::select(vec!["+", "-", "*", "/", "%", "<", ">", "==", "!="]),
        rhs in any::<u16>(),
    ) {
        let snippet = format!("{} {} {}", lhs, op, rhs);
        prop_assert_eq!(classify(&snippet), SnippetKind::Expression);
    }

    /// The rewrite always targets the capture callback and keeps the
    /// original snippet intact inside one extra layer of parens.
    #[test]
    fn transform_wraps_expressions_exactly_once(
        lhs in any::<u8>(),
        rhs in any::<u8>(),
    ) {
        let snippet = format!("{} + {}", lhs, rhs);
        let rewritten = transform(&snippet);
        let expected = format!("{}(({}))", CAPTURE_FUNCTION, snippet);
        prop_assert_eq!(rewritten.as_ref(), expected.as_str());
    }

    /// Every rewrite of a well-formed arithmetic snippet still compiles
    /// and captures an integer value.
    #[test]
    fn rewritten_arithmetic_evaluates(lhs in 0i64..1000, rhs in 1i64..1000) {
        let mut repl = repl();
        let result = repl.evaluate(&format!("{} + {}", lhs, rhs));
        prop_assert!(result.success);
        prop_assert_eq!(result.value, Some((lhs + rhs).to_string()));
    }
}
