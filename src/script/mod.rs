//! Reference front-end/codegen service for a small script language.
//!
//! This module exists so the kernel can be driven end to end without a
//! native toolchain: the integration tests, the capture-heuristic suite,
//! and the availability probe all run against it. It implements both trait
//! seams the way a real service would: an immutable shared context of
//! checked fragments on the front-end side, and an ordered link list with
//! newest-first symbol resolution on the backend side.
//!
//! The language itself is deliberately tiny: `let`/assignment/`type`/
//! `extern` statements and expressions over integers, floats, booleans,
//! and strings, with calls dispatched through the runtime-symbol table.
//!
//! ```
//! use cadenza::repl::{Repl, ReplConfig};
//!
//! let mut repl = Repl::new(cadenza::script::factory());
//! repl.initialize(ReplConfig::default()).unwrap();
//!
//! repl.evaluate("let a = 5");
//! repl.evaluate("let b = 10");
//! let result = repl.evaluate("a + b");
//! assert_eq!(result.value.as_deref(), Some("15"));
//! ```

/// Abstract syntax tree for the script language.
pub mod ast;
/// In-memory JIT linker stand-in.
pub mod backend;
/// Front end: parsing, name resolution, lowering.
pub mod frontend;
/// Lexer and parser.
pub mod parser;
/// Runtime values.
pub mod value;

pub use backend::ScriptJit;
pub use frontend::ScriptFrontend;
pub use value::ScriptValue;

use crate::repl::{ReplConfig, ServiceFactory, ServicePair};

/// Build a fresh script front end + backend pair.
pub fn service() -> ServicePair {
    ServicePair {
        frontend: Box::new(ScriptFrontend::new()),
        backend: Box::new(ScriptJit::new()),
    }
}

/// Service factory handing out independent script service pairs.
pub fn factory() -> Box<dyn ServiceFactory> {
    Box::new(|_config: &ReplConfig| -> anyhow::Result<ServicePair> { Ok(service()) })
}
