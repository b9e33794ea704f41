//! Error types for the REPL kernel
//!
//! Domain errors use thiserror; every compile/link/execute failure is
//! captured as a result value and surfaced to the caller, never as a
//! process-level failure.

use thiserror::Error;

/// Top-level kernel error
#[derive(Debug, Error)]
pub enum ReplError {
    /// Front-end compilation errors (parse, sema, codegen)
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Module add/remove errors from the JIT linker
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Entry-point invocation errors
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Undo request exceeded the number of undoable user units
    #[error("Cannot undo {requested} unit(s): only {available} user unit(s) on record")]
    TooManyUndos {
        /// Number of units the caller asked to undo
        requested: usize,
        /// Number of user units currently undoable
        available: usize,
    },

    /// An operation was called before `initialize` succeeded
    #[error("REPL not initialized")]
    NotInitialized,

    /// The bootstrap (runtime-support) unit failed to compile or link
    ///
    /// This is the only unrecoverable condition in the kernel: without the
    /// bootstrap declarations no later unit can capture values.
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    /// Service construction failed in the factory
    #[error("Service unavailable: {0}")]
    Service(String),
}

/// Front-end compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed source text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Name or type errors, including references to undone identifiers
    #[error("Semantic error: {0}")]
    Sema(String),

    /// The codegen service failed to lower a checked fragment
    #[error("Codegen error: {0}")]
    Codegen(String),
}

/// Convenience result alias for front-end operations
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// JIT linker errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// The backend rejected a module handle it did not issue
    #[error("Unknown module handle {0}")]
    UnknownModule(u64),

    /// The module payload did not originate from the paired front end
    #[error("Foreign module payload: {0}")]
    ForeignModule(String),

    /// Backend-specific link failure (duplicate symbols, allocation, ...)
    #[error("Linker rejected module: {0}")]
    Backend(String),
}

/// Convenience result alias for linker operations
pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Entry-point execution errors
#[derive(Debug, Error)]
pub enum ExecError {
    /// Session-wide static initializers failed to run
    #[error("Static initializers failed: {0}")]
    InitFailed(String),

    /// The entry function was found but trapped while running
    #[error("Entry point failed: {0}")]
    EntryFailed(String),
}

/// Convenience result alias for execution operations
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Result type using ReplError
pub type Result<T> = std::result::Result<T, ReplError>;
