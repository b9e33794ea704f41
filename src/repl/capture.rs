//! Value capture: expression classification, rewrite, and the side channel
//!
//! A snippet that looks like an expression is rewritten to pass its result
//! to a runtime-support callback declared by the bootstrap unit. The
//! callback stores the value in a [`CaptureSlot`] the orchestrator reads
//! back after execution.
//!
//! Classification is a heuristic, not a parser: it scans outside string
//! literals and bracket nesting, which is enough to keep `==` from reading
//! as an assignment and `"a = b"` from reading as a declaration.

use parking_lot::Mutex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

use super::service::RuntimeFn;

/// Name of the runtime-support callback expressions are rewritten to call
///
/// Every [`FrontendService`](super::service::FrontendService) must declare
/// this symbol in its runtime-support preamble.
pub const CAPTURE_FUNCTION: &str = "__repl_set_value";

/// Functions whose call marks a snippet as an expression
const PRINT_LIKE: &[&str] = &["print", "println"];

/// Heuristic classification of one snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetKind {
    /// Produces a value worth capturing
    Expression,
    /// Declaration or statement; passes through unchanged
    Statement,
}

/// Classify a snippet as expression or statement
///
/// A snippet is an expression when it contains no top-level assignment and
/// shows at least one expression signal: an arithmetic/comparison/logical
/// operator, a print-like call, a leading numeric or string literal, or a
/// `return`/boolean literal token.
pub fn classify(snippet: &str) -> SnippetKind {
    let scan = Scan::of(snippet);
    if scan.top_level_assignment {
        return SnippetKind::Statement;
    }
    let leading_literal = matches!(
        snippet.trim_start().chars().next(),
        Some(c) if c.is_ascii_digit() || c == '"'
    );
    if scan.operator
        || scan.print_call
        || leading_literal
        || scan.keyword_token
    {
        SnippetKind::Expression
    } else {
        SnippetKind::Statement
    }
}

/// Rewrite a snippet so its value lands in the capture slot
///
/// Expressions become a call to [`CAPTURE_FUNCTION`] with the original
/// snippet parenthesized; statements pass through unchanged.
pub fn transform(snippet: &str) -> Cow<'_, str> {
    match classify(snippet) {
        SnippetKind::Expression => {
            Cow::Owned(format!("{}(({}))", CAPTURE_FUNCTION, snippet.trim()))
        }
        SnippetKind::Statement => Cow::Borrowed(snippet),
    }
}

/// Signals gathered in one pass over the snippet
#[derive(Default)]
struct Scan {
    top_level_assignment: bool,
    operator: bool,
    print_call: bool,
    keyword_token: bool,
}

impl Scan {
    fn of(snippet: &str) -> Self {
        let bytes = snippet.as_bytes();
        let mut scan = Scan::default();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut word_start: Option<usize> = None;
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];

            if in_string {
                match b {
                    b'\\' => i += 1,
                    b'"' => in_string = false,
                    _ => {}
                }
                i += 1;
                continue;
            }

            if b.is_ascii_alphanumeric() || b == b'_' {
                if word_start.is_none() {
                    word_start = Some(i);
                }
                i += 1;
                continue;
            }

            if let Some(start) = word_start.take() {
                scan.finish_word(&snippet[start..i], &bytes[i..]);
            }

            match b {
                b'"' => in_string = true,
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'=' => {
                    let prev = i.checked_sub(1).map(|p| bytes[p]);
                    let next = bytes.get(i + 1).copied();
                    if next == Some(b'=') {
                        // comparison; consume both characters
                        scan.operator = true;
                        i += 1;
                    } else if matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) {
                        scan.operator = true;
                    } else if depth == 0 {
                        // plain or compound assignment
                        scan.top_level_assignment = true;
                    }
                }
                b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'!' | b'&' | b'|' => {
                    // compound assignment is classified at the `=` itself
                    if bytes.get(i + 1).copied() != Some(b'=') || depth > 0 {
                        scan.operator = true;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        if let Some(start) = word_start {
            scan.finish_word(&snippet[start..], &[]);
        }
        scan
    }

    fn finish_word(&mut self, word: &str, rest: &[u8]) {
        match word {
            "return" | "true" | "false" => self.keyword_token = true,
            w if PRINT_LIKE.contains(&w) => {
                let next = rest.iter().find(|b| !b.is_ascii_whitespace());
                if next == Some(&b'(') {
                    self.print_call = true;
                }
            }
            _ => {}
        }
    }
}

/// A value stored by the capture callback
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedValue {
    /// The captured payload
    pub value: Value,
    /// Type name inferred from the payload
    pub type_name: String,
}

impl CapturedValue {
    /// Wrap a payload, inferring its type name
    pub fn new(value: Value) -> Self {
        let type_name = type_name_of(&value).to_string();
        Self { value, type_name }
    }

    /// Human-readable rendering of the payload
    pub fn render(&self) -> String {
        match &self.value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

fn type_name_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "Unit",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_f64() => "Double",
        Value::Number(_) => "Int",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Well-known mutable slot the capture callback writes into
///
/// Cloning shares the slot; the orchestrator keeps one end and installs the
/// other in the backend's runtime-symbol table.
#[derive(Clone, Default)]
pub struct CaptureSlot {
    inner: Arc<Mutex<Option<CapturedValue>>>,
}

impl CaptureSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any stale value before a new execution
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }

    /// Take the captured value, leaving the slot empty
    pub fn take(&self) -> Option<CapturedValue> {
        self.inner.lock().take()
    }

    /// Build the runtime callback that stores into this slot
    ///
    /// The callback takes the evaluated expression as its sole argument and
    /// returns null, so the rewritten snippet itself evaluates to nothing.
    pub fn runtime_fn(&self) -> RuntimeFn {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |args: &[Value]| {
            let value = args.first().cloned().unwrap_or(Value::Null);
            *inner.lock() = Some(CapturedValue::new(value));
            Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declarations_are_statements() {
        assert_eq!(classify("let x = 42"), SnippetKind::Statement);
        assert_eq!(classify("var name = \"cadenza\""), SnippetKind::Statement);
        assert_eq!(classify("x = x + 1"), SnippetKind::Statement);
        assert_eq!(classify("x += 1"), SnippetKind::Statement);
    }

    #[test]
    fn arithmetic_and_logic_are_expressions() {
        assert_eq!(classify("1 + 2"), SnippetKind::Expression);
        assert_eq!(classify("3.14 * 2.0"), SnippetKind::Expression);
        assert_eq!(classify("true && false"), SnippetKind::Expression);
        assert_eq!(classify("a == b"), SnippetKind::Expression);
        assert_eq!(classify("a != b"), SnippetKind::Expression);
    }

    #[test]
    fn comparison_equals_is_not_assignment() {
        assert_eq!(classify("x <= 3"), SnippetKind::Expression);
        assert_eq!(classify("x >= 3"), SnippetKind::Expression);
    }

    #[test]
    fn assignment_inside_string_is_ignored() {
        assert_eq!(classify("\"a = b\""), SnippetKind::Expression);
    }

    #[test]
    fn assignment_inside_parens_is_not_top_level() {
        // No expression signal either, so it stays a statement.
        assert_eq!(classify("f(x = 5)"), SnippetKind::Statement);
    }

    #[test]
    fn print_calls_are_expressions() {
        assert_eq!(classify("print(\"hello\")"), SnippetKind::Expression);
        assert_eq!(classify("println (x)"), SnippetKind::Expression);
        // Not a call, and `printer` is a different word entirely.
        assert_eq!(classify("printer"), SnippetKind::Statement);
    }

    #[test]
    fn leading_literals_and_keywords_are_expressions() {
        assert_eq!(classify("42"), SnippetKind::Expression);
        assert_eq!(classify("\"text\""), SnippetKind::Expression);
        assert_eq!(classify("true"), SnippetKind::Expression);
        assert_eq!(classify("return"), SnippetKind::Expression);
    }

    #[test]
    fn bare_identifiers_are_statements() {
        assert_eq!(classify("foo"), SnippetKind::Statement);
        assert_eq!(classify("foo()"), SnippetKind::Statement);
    }

    #[test]
    fn transform_wraps_expressions_only() {
        assert_eq!(
            transform("1 + 2"),
            format!("{}((1 + 2))", CAPTURE_FUNCTION)
        );
        assert_eq!(transform("let x = 1"), "let x = 1");
    }

    #[test]
    fn slot_roundtrip_and_clear() {
        let slot = CaptureSlot::new();
        let func = slot.runtime_fn();

        assert!(slot.take().is_none());
        func(&[json!(15)]);
        let captured = slot.take().expect("value captured");
        assert_eq!(captured.render(), "15");
        assert_eq!(captured.type_name, "Int");
        assert!(slot.take().is_none(), "take drains the slot");

        func(&[json!("keep")]);
        slot.clear();
        assert!(slot.take().is_none());
    }

    #[test]
    fn captured_type_names() {
        assert_eq!(CapturedValue::new(json!(1)).type_name, "Int");
        assert_eq!(CapturedValue::new(json!(1.5)).type_name, "Double");
        assert_eq!(CapturedValue::new(json!(true)).type_name, "Bool");
        assert_eq!(CapturedValue::new(json!("s")).type_name, "String");
        assert_eq!(CapturedValue::new(Value::Null).type_name, "Unit");
    }
}
