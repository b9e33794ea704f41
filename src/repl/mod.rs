//! REPL kernel: incremental compile-link-execute-undo over external services
//!
//! This module provides the public [`Repl`] orchestrator and the seams it
//! drives: the incremental front-end driver, the JIT execution session, the
//! value-capture transform, and the append-only unit log.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Submodules
pub mod boot;
pub mod capture;
pub mod driver;
pub mod error;
pub mod interp;
pub mod service;
pub mod session;
pub mod unit;

/// Configuration for one REPL session
///
/// The kernel records these fields and hands them to the service factory
/// verbatim; `timeout_ms` in particular is not enforced here: the kernel
/// has no cancellation, so callers wanting a deadline run the orchestrator
/// on a worker thread and abandon it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Ask the codegen service for optimized code
    pub optimizations_enabled: bool,

    /// Ask the codegen service to emit debug info
    pub debug_info_enabled: bool,

    /// Advisory per-evaluation deadline in milliseconds
    pub timeout_ms: u64,

    /// Path to the language's standard library
    pub stdlib_path: PathBuf,

    /// Additional module search paths
    pub module_search_paths: Vec<PathBuf>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            optimizations_enabled: true,
            debug_info_enabled: false,
            timeout_ms: 5000,
            stdlib_path: PathBuf::new(),
            module_search_paths: Vec::new(),
        }
    }
}

// Re-export commonly used types
pub use capture::{CAPTURE_FUNCTION, CapturedValue, SnippetKind};
pub use error::{CompileError, ExecError, LinkError, ReplError};
pub use interp::{BATCH_STOPPED, EvaluationResult, Repl, ReplStats, evaluate_once, is_available};
pub use service::{
    CheckRequest, FragmentId, FrontendService, JitBackend, ModuleHandle, ObjectModule, RuntimeFn,
    ServiceFactory, ServicePair,
};
pub use session::ENTRY_SYMBOL;
pub use unit::{CompilationUnit, FragmentName, UnitId, UnitKind};
