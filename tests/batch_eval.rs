//! Integration tests for batch evaluation and failure policy
//!
//! A batch stops at the first failure; entries after it are never compiled.
//! Units that fail after compilation stay on record, inert.

use cadenza::repl::{BATCH_STOPPED, Repl, ReplConfig};
use cadenza::script;

fn repl() -> Repl {
    let mut repl = Repl::new(script::factory());
    repl.initialize(ReplConfig::default()).unwrap();
    repl
}

#[test]
fn batch_short_circuits_after_first_failure() {
    let mut repl = repl();
    let results = repl.evaluate_multiple(&["let a = 1", "bogus!!", "a"]);

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(!results[2].success);
    assert_eq!(results[2].error.as_deref(), Some(BATCH_STOPPED));

    // The third entry was never compiled or executed.
    assert_eq!(repl.stats().total_expressions, 2);
}

#[test]
fn clean_batch_runs_to_completion() {
    let mut repl = repl();
    let results = repl.evaluate_multiple(&["let a = 2", "let b = 3", "a * b"]);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[2].value.as_deref(), Some("6"));
}

#[test]
fn empty_batch_yields_no_results() {
    let mut repl = repl();
    let results = repl.evaluate_multiple::<&str>(&[]);
    assert!(results.is_empty());
}

#[test]
fn batch_on_uninitialized_repl_short_circuits_immediately() {
    let mut repl = Repl::new(script::factory());
    let results = repl.evaluate_multiple(&["1 + 1", "2 + 2"]);
    assert!(!results[0].success);
    assert_eq!(results[1].error.as_deref(), Some(BATCH_STOPPED));
}

#[test]
fn runtime_failure_keeps_the_unit_on_record() {
    let mut repl = repl();
    let result = repl.evaluate("let x = 1 / 0");
    assert!(!result.success);
    assert!(result.error.unwrap().contains("division by zero"));

    let stats = repl.stats();
    // The front end accepted the unit; only execution trapped.
    assert_eq!(stats.successful_compilations, 1);
    assert_eq!(stats.failed_compilations, 0);

    // The unit is on record and undoable like any other.
    assert_eq!(repl.undoable_count(), 1);
    repl.undo(1).unwrap();
    assert_eq!(repl.undoable_count(), 0);

    // The session keeps working afterwards.
    assert_eq!(repl.evaluate("6 * 7").value.as_deref(), Some("42"));
}

#[test]
fn partial_execution_leaves_earlier_bindings_intact() {
    let mut repl = repl();
    repl.evaluate("let a = 1");
    // The unit traps mid-way; `a` from the earlier unit is untouched.
    assert!(!repl.evaluate("let b = a / 0").success);
    assert_eq!(repl.evaluate("a + 0").value.as_deref(), Some("1"));
}
