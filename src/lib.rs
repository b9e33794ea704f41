//! Cadenza – an incremental compile-link-execute kernel for REPL sessions
//!
//! This crate implements the execution core of a read-eval-print loop for a
//! compiled language:
//! - Each accepted snippet becomes an isolated, immutable compilation unit
//! - Every unit imports all previously accepted units, so later snippets can
//!   reference earlier declarations and variables
//! - Compiled modules are linked into a live just-in-time session and run
//!   through a well-known entry symbol
//! - The most recent N user units can be undone; bootstrap units cannot
//! - Expression results are surfaced through a runtime capture callback
//!
//! The language front end and native code generator are external
//! collaborators reached through the [`repl::FrontendService`] and
//! [`repl::JitBackend`] trait seams. The [`script`] module ships a small
//! in-process reference service used by the test suite.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// REPL kernel modules: units, driver, session, capture, orchestrator
pub mod repl;

/// Reference in-process front-end/codegen service for a small script language
pub mod script;

// Re-export key types for convenience
pub use repl::{EvaluationResult, Repl, ReplConfig, ReplStats};

/// Current version of the Cadenza kernel
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
