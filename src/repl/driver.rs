//! Incremental front-end driver
//!
//! Wraps the external front-end/codegen service: each submission becomes a
//! fresh named fragment importing every previously accepted fragment, so
//! references to earlier declarations resolve without ever reopening a
//! checked fragment. Accepted units accumulate in the unit log; failures
//! leave the log untouched.

use tracing::debug;

use super::error::CompileResult;
use super::service::{CheckRequest, FrontendService};
use super::unit::{CompilationUnit, UnitId, UnitKind, UnitLog};

/// Drives the front end one submission at a time
pub struct IncrementalDriver {
    frontend: Box<dyn FrontendService>,
    log: UnitLog,
}

impl IncrementalDriver {
    /// Wrap a front-end service with an empty unit log
    pub fn new(frontend: Box<dyn FrontendService>) -> Self {
        Self {
            frontend,
            log: UnitLog::new(),
        }
    }

    /// Runtime-support declarations for the bootstrap unit
    pub fn runtime_support_source(&self) -> String {
        self.frontend.runtime_support_source()
    }

    /// Compile one snippet into a new compilation unit
    ///
    /// The unit is appended to the log only when both check and lower
    /// succeed; a lower failure releases the checked fragment so the shared
    /// front-end context does not leak. `lower` returning no module is a
    /// legitimate outcome for declaration-only snippets.
    pub fn compile(
        &mut self,
        source: &str,
        kind: UnitKind,
    ) -> CompileResult<UnitId> {
        let (id, name) = self.log.allocate();
        let imports = self.log.fragment_ids();
        let filename = match &kind {
            UnitKind::SourceFile { filename } => Some(filename.as_str()),
            _ => None,
        };

        debug!(unit = %id, fragment = %name, imports = imports.len(), "checking snippet");
        let fragment = self.frontend.check(CheckRequest {
            fragment: &name,
            source,
            imports: &imports,
            filename,
        })?;

        let module = match self.frontend.lower(fragment) {
            Ok(module) => module,
            Err(err) => {
                self.frontend.release(fragment);
                return Err(err);
            }
        };
        debug!(unit = %id, has_module = module.is_some(), "fragment lowered");

        self.log
            .push(CompilationUnit::new(id, kind, name, source, fragment, module));
        Ok(id)
    }

    /// Remove the newest unit and release its fragment from the front end
    ///
    /// Returns the discarded unit, or `None` at the bootstrap cursor. The
    /// caller must have unlinked the unit's module first: later units import
    /// earlier ones, so teardown runs strictly newest-first.
    pub fn discard_tail(&mut self) -> Option<CompilationUnit> {
        let unit = self.log.pop_tail()?;
        self.frontend.release(unit.fragment());
        debug!(unit = %unit.id(), fragment = %unit.name(), "fragment released");
        Some(unit)
    }

    /// Borrow the unit log
    pub fn log(&self) -> &UnitLog {
        &self.log
    }

    /// Mutably borrow the unit log
    pub fn log_mut(&mut self) -> &mut UnitLog {
        &mut self.log
    }
}
