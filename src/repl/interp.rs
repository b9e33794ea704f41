//! Session orchestrator: the public REPL façade
//!
//! Owns the front-end driver and execution session behind an opaque engine,
//! injects the runtime-support bootstrap unit before any user input, and
//! wires expression results through the capture slot. The public surface
//! exposes no compiler or linker types; services enter only through the
//! [`ServiceFactory`] seam.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use super::ReplConfig;
use super::capture::{self, CAPTURE_FUNCTION, CaptureSlot};
use super::driver::IncrementalDriver;
use super::error::{ReplError, Result};
use super::service::ServiceFactory;
use super::session::ExecutionSession;
use super::unit::{UnitId, UnitKind};

/// Placeholder message for batch entries skipped after an earlier failure
pub const BATCH_STOPPED: &str = "stopped due to previous failure";

const NOT_INITIALIZED: &str = "REPL not initialized";

/// Result of evaluating one snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Whether the snippet compiled, linked, and ran
    pub success: bool,
    /// Rendered value captured from an expression, if any
    pub value: Option<String>,
    /// Type name of the captured value, if any
    pub type_name: Option<String>,
    /// Error message when `success` is false
    pub error: Option<String>,
}

impl EvaluationResult {
    /// Successful evaluation that captured a value
    pub fn with_value(value: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            success: true,
            value: Some(value.into()),
            type_name: Some(type_name.into()),
            error: None,
        }
    }

    /// Successful evaluation with nothing to report (declaration/statement)
    pub fn empty() -> Self {
        Self {
            success: true,
            value: None,
            type_name: None,
            error: None,
        }
    }

    /// Failed evaluation
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            type_name: None,
            error: Some(message.into()),
        }
    }
}

/// Cumulative session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplStats {
    /// Snippets submitted through `evaluate`
    pub total_expressions: u64,
    /// Snippets the front end accepted
    pub successful_compilations: u64,
    /// Snippets the front end rejected
    pub failed_compilations: u64,
    /// Wall-clock milliseconds spent compiling
    pub total_compilation_time_ms: f64,
    /// Wall-clock milliseconds spent linking and executing
    pub total_execution_time_ms: f64,
}

/// The live engine behind an initialized REPL
///
/// Dropped wholesale on `reset`, which also retires its fragment-name seed.
struct Interpreter {
    driver: IncrementalDriver,
    session: ExecutionSession,
    capture: CaptureSlot,
}

impl Interpreter {
    /// Build a fresh engine: connect services, install the capture
    /// callback, then compile and run the bootstrap unit.
    fn bootstrap(factory: &dyn ServiceFactory, config: &ReplConfig) -> Result<Self> {
        let pair = factory
            .connect(config)
            .map_err(|err| ReplError::Service(err.to_string()))?;

        let driver = IncrementalDriver::new(pair.frontend);
        let mut session = ExecutionSession::new(pair.backend);
        let capture = CaptureSlot::new();
        session.define_runtime_fn(CAPTURE_FUNCTION, capture.runtime_fn());

        let mut engine = Self {
            driver,
            session,
            capture,
        };

        let preamble = engine.driver.runtime_support_source();
        let unit = engine
            .driver
            .compile(&preamble, UnitKind::Bootstrap)
            .map_err(|err| ReplError::Bootstrap(err.to_string()))?;
        engine
            .link_and_execute(unit)
            .map_err(|err| ReplError::Bootstrap(err.to_string()))?;

        engine.driver.log_mut().mark_user_code_start();
        info!(
            bootstrap_units = engine.driver.log().bootstrap_len(),
            "runtime support ready"
        );
        Ok(engine)
    }

    /// Move a unit's module into the session and run its entry point
    fn link_and_execute(&mut self, unit: UnitId) -> Result<()> {
        let module = self
            .driver
            .log_mut()
            .unit_mut(unit)
            .and_then(|u| u.take_module());
        self.session.add_module(unit, module)?;
        self.session.execute(unit)?;
        Ok(())
    }
}

/// Single-session REPL orchestrator
///
/// All state is owned exclusively by one instance; nothing here is
/// thread-safe. `evaluate` blocks the caller until compilation, linking,
/// and execution complete; a caller wanting a deadline must enforce it
/// externally.
pub struct Repl {
    factory: Box<dyn ServiceFactory>,
    config: Option<ReplConfig>,
    engine: Option<Interpreter>,
    last_error: String,
    stats: ReplStats,
}

impl Repl {
    /// Create an uninitialized REPL over a service factory
    pub fn new(factory: Box<dyn ServiceFactory>) -> Self {
        Self {
            factory,
            config: None,
            engine: None,
            last_error: String::new(),
            stats: ReplStats::default(),
        }
    }

    /// Connect services and run the bootstrap unit
    ///
    /// This is the only unrecoverable failure point in the kernel: if the
    /// bootstrap unit cannot be compiled and linked, the REPL stays
    /// uninitialized.
    pub fn initialize(&mut self, config: ReplConfig) -> Result<()> {
        let engine = match Interpreter::bootstrap(self.factory.as_ref(), &config) {
            Ok(engine) => engine,
            Err(err) => {
                self.last_error = err.to_string();
                return Err(err);
            }
        };
        self.config = Some(config);
        self.engine = Some(engine);
        Ok(())
    }

    /// Whether `initialize` has succeeded
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Compile, link, and execute one snippet
    ///
    /// Expressions are rewritten through the capture transform so their
    /// value lands in the result; declarations and statements run for their
    /// effect only. Failures are reported in the result, never panicked.
    pub fn evaluate(&mut self, expression: &str) -> EvaluationResult {
        let Some(engine) = self.engine.as_mut() else {
            self.last_error = NOT_INITIALIZED.to_string();
            return EvaluationResult::failure(NOT_INITIALIZED);
        };

        self.stats.total_expressions += 1;
        let rewritten = capture::transform(expression);

        let compile_start = Instant::now();
        let compiled = engine.driver.compile(&rewritten, UnitKind::Snippet);
        self.stats.total_compilation_time_ms += elapsed_ms(compile_start);

        let unit = match compiled {
            Ok(unit) => {
                self.stats.successful_compilations += 1;
                unit
            }
            Err(err) => {
                self.stats.failed_compilations += 1;
                self.last_error = err.to_string();
                return EvaluationResult::failure(err.to_string());
            }
        };

        engine.capture.clear();
        let exec_start = Instant::now();
        let ran = engine.link_and_execute(unit);
        self.stats.total_execution_time_ms += elapsed_ms(exec_start);

        match ran {
            Ok(()) => match engine.capture.take() {
                Some(captured) => {
                    EvaluationResult::with_value(captured.render(), captured.type_name)
                }
                None => EvaluationResult::empty(),
            },
            Err(err) => {
                // The unit stays on record. A link failure leaves it with no
                // resource handle; an execution failure leaves its module
                // linked with whatever state it bound before trapping. Undo
                // bookkeeping handles both the same way.
                warn!(unit = %unit, %err, "unit failed after compilation; kept on record");
                self.last_error = err.to_string();
                EvaluationResult::failure(err.to_string())
            }
        }
    }

    /// Evaluate a batch, stopping at the first failure
    ///
    /// Once one evaluation fails, the remaining entries are never compiled;
    /// their results carry the [`BATCH_STOPPED`] placeholder.
    pub fn evaluate_multiple<S: AsRef<str>>(&mut self, expressions: &[S]) -> Vec<EvaluationResult> {
        let mut results = Vec::with_capacity(expressions.len());
        let mut stopped = false;
        for expression in expressions {
            if stopped {
                results.push(EvaluationResult::failure(BATCH_STOPPED));
                continue;
            }
            let result = self.evaluate(expression.as_ref());
            stopped = !result.success;
            results.push(result);
        }
        results
    }

    /// Register auxiliary source without executing it
    ///
    /// The source is checked into the front end's shared context so later
    /// snippets can reference its declarations; nothing is linked or run.
    /// The unit participates in imports and undo like any snippet.
    pub fn add_source_file(&mut self, source: &str, filename: &str) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(ReplError::NotInitialized)?;
        let kind = UnitKind::SourceFile {
            filename: filename.to_string(),
        };
        if let Err(err) = engine.driver.compile(source, kind) {
            self.last_error = err.to_string();
            return Err(err.into());
        }
        Ok(())
    }

    /// Undo the most recent `n` user units
    ///
    /// Later units may import earlier ones, so teardown runs strictly from
    /// the tail: unlink the unit's module, then release its fragment, then
    /// drop it from the log. Bootstrap units are never undone; asking for
    /// more than the user-unit count fails without changing anything.
    pub fn undo(&mut self, n: usize) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(ReplError::NotInitialized)?;
        let available = engine.driver.log().user_len();
        if n > available {
            let err = ReplError::TooManyUndos {
                requested: n,
                available,
            };
            self.last_error = err.to_string();
            return Err(err);
        }
        for _ in 0..n {
            let Some(unit) = engine.driver.log().last().map(|u| u.id()) else {
                break;
            };
            engine.session.remove_module(unit)?;
            engine.driver.discard_tail();
        }
        Ok(())
    }

    /// Tear down the whole session and rebuild it from the factory
    ///
    /// All prior units, bootstrap included, become unreachable; the new
    /// engine gets a fresh fragment-name seed and a fresh bootstrap unit.
    /// Stats and the last error are cleared.
    pub fn reset(&mut self) -> Result<()> {
        let config = self.config.clone().ok_or(ReplError::NotInitialized)?;
        // Drop the old engine first so its modules unlink before the new
        // backend comes up.
        self.engine = None;
        let engine = match Interpreter::bootstrap(self.factory.as_ref(), &config) {
            Ok(engine) => engine,
            Err(err) => {
                self.last_error = err.to_string();
                return Err(err);
            }
        };
        self.engine = Some(engine);
        self.stats = ReplStats::default();
        self.last_error.clear();
        info!("session reset");
        Ok(())
    }

    /// Most recent error message, if any
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Cumulative session counters
    pub fn stats(&self) -> ReplStats {
        self.stats
    }

    /// Number of accepted units, bootstrap included
    pub fn unit_count(&self) -> usize {
        self.engine.as_ref().map_or(0, |e| e.driver.log().len())
    }

    /// Number of units currently eligible for undo
    pub fn undoable_count(&self) -> usize {
        self.engine.as_ref().map_or(0, |e| e.driver.log().user_len())
    }
}

/// Probe whether the external front-end/codegen service is usable
///
/// Builds a throwaway engine and performs the bootstrap dry-run compile;
/// nothing is retained on success or failure.
pub fn is_available(factory: &dyn ServiceFactory) -> bool {
    Interpreter::bootstrap(factory, &ReplConfig::default()).is_ok()
}

/// Evaluate a single expression in a temporary one-off session
///
/// Convenience for callers that do not need incremental state: the session
/// is built, bootstrapped, used once, and dropped.
pub fn evaluate_once(factory: Box<dyn ServiceFactory>, expression: &str) -> EvaluationResult {
    let mut repl = Repl::new(factory);
    if let Err(err) = repl.initialize(ReplConfig::default()) {
        return EvaluationResult::failure(format!("failed to initialize session: {}", err));
    }
    repl.evaluate(expression)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::service::ServicePair;

    fn failing_factory() -> Box<dyn ServiceFactory> {
        Box::new(|_config: &ReplConfig| -> anyhow::Result<ServicePair> {
            anyhow::bail!("service offline")
        })
    }

    #[test]
    fn evaluate_before_initialize_reports_not_initialized() {
        let mut repl = Repl::new(failing_factory());
        let result = repl.evaluate("1 + 1");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(NOT_INITIALIZED));
        assert_eq!(repl.last_error(), NOT_INITIALIZED);
        // Local precondition failures never reach the stats counters.
        assert_eq!(repl.stats().total_expressions, 0);
    }

    #[test]
    fn undo_and_reset_require_initialization() {
        let mut repl = Repl::new(failing_factory());
        assert!(matches!(repl.undo(1), Err(ReplError::NotInitialized)));
        assert!(matches!(repl.reset(), Err(ReplError::NotInitialized)));
    }

    #[test]
    fn factory_failure_surfaces_as_service_error() {
        let mut repl = Repl::new(failing_factory());
        let err = repl.initialize(ReplConfig::default()).unwrap_err();
        assert!(matches!(err, ReplError::Service(_)));
        assert!(!repl.is_initialized());
        assert!(repl.last_error().contains("service offline"));
    }

    #[test]
    fn is_available_reports_factory_failures() {
        assert!(!is_available(&|_config: &ReplConfig| -> anyhow::Result<ServicePair> {
            anyhow::bail!("service offline")
        }));
    }
}
