//! Execution session over the JIT linker
//!
//! Owns the backend, tracks one resource handle per linked unit, and
//! invokes the well-known entry symbol after each addition. Units without
//! a module (declaration-only, or kept inert after a link failure) simply
//! have no handle and execute as no-ops.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::boot;
use super::error::{ExecResult, LinkResult};
use super::service::{JitBackend, ModuleHandle, ObjectModule, RuntimeFn};
use super::unit::UnitId;

/// Fixed entry symbol looked up after each module addition
pub const ENTRY_SYMBOL: &str = "jit_main";

/// Live just-in-time linking context for one engine generation
pub struct ExecutionSession {
    backend: Box<dyn JitBackend>,
    handles: HashMap<UnitId, ModuleHandle>,
    initializers_ran: bool,
}

impl ExecutionSession {
    /// Wrap a backend, running process-wide preparation if needed
    pub fn new(mut backend: Box<dyn JitBackend>) -> Self {
        boot::prepare_process(backend.as_mut());
        Self {
            backend,
            handles: HashMap::new(),
            initializers_ran: false,
        }
    }

    /// Install a host function in the backend's runtime-symbol table
    pub fn define_runtime_fn(&mut self, name: &str, func: RuntimeFn) {
        self.backend.define_runtime_fn(name, func);
    }

    /// Link a unit's module under a fresh resource handle
    ///
    /// `None` means the unit has no executable body; that is a successful
    /// no-op and the unit simply never receives a handle.
    pub fn add_module(&mut self, unit: UnitId, module: Option<ObjectModule>) -> LinkResult<()> {
        let Some(module) = module else {
            debug!(unit = %unit, "no module to link");
            return Ok(());
        };
        let handle = self.backend.add_module(module)?;
        debug!(unit = %unit, ?handle, "module linked");
        self.handles.insert(unit, handle);
        Ok(())
    }

    /// Unlink a unit's module and free its allocations
    ///
    /// Idempotent: a unit with no handle (never linked, or already removed)
    /// succeeds trivially.
    pub fn remove_module(&mut self, unit: UnitId) -> LinkResult<()> {
        match self.handles.remove(&unit) {
            Some(handle) => {
                self.backend.remove_module(handle)?;
                debug!(unit = %unit, ?handle, "module unlinked");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Run the just-linked unit's entry point, if it has one
    ///
    /// The first execution of a session also runs global/static
    /// initializers for everything linked so far. Entry lookup is scoped to
    /// the unit's own handle, so a declaration-only unit never re-runs an
    /// older unit's entry; a missing entry symbol is not an error.
    pub fn execute(&mut self, unit: UnitId) -> ExecResult<()> {
        if !self.initializers_ran {
            self.backend.run_static_initializers()?;
            self.initializers_ran = true;
        }
        let Some(&handle) = self.handles.get(&unit) else {
            return Ok(());
        };
        let found = self.backend.invoke_entry(handle, ENTRY_SYMBOL)?;
        if !found {
            debug!(unit = %unit, symbol = ENTRY_SYMBOL, "no entry point; nothing to run");
        }
        Ok(())
    }

    /// Whether a unit currently holds linked code
    pub fn is_linked(&self, unit: UnitId) -> bool {
        self.handles.contains_key(&unit)
    }

    /// Number of units with live resource handles
    pub fn linked_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for ExecutionSession {
    fn drop(&mut self) {
        // Unlink in any order: handles are independent at the linker level.
        for (unit, handle) in self.handles.drain() {
            if let Err(err) = self.backend.remove_module(handle) {
                warn!(unit = %unit, %err, "failed to unlink module during teardown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::error::{ExecError, LinkError};
    use crate::repl::unit::compute_fragment_name;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeJit {
        next_handle: u64,
        live: Vec<ModuleHandle>,
        init_runs: Arc<AtomicUsize>,
        entry_runs: Arc<AtomicUsize>,
        reject_add: bool,
    }

    impl JitBackend for FakeJit {
        fn prepare(&mut self) {}

        fn define_runtime_fn(&mut self, _name: &str, _func: RuntimeFn) {}

        fn add_module(&mut self, _module: ObjectModule) -> LinkResult<ModuleHandle> {
            if self.reject_add {
                return Err(LinkError::Backend("scripted rejection".into()));
            }
            let handle = ModuleHandle(self.next_handle);
            self.next_handle += 1;
            self.live.push(handle);
            Ok(handle)
        }

        fn remove_module(&mut self, handle: ModuleHandle) -> LinkResult<()> {
            let before = self.live.len();
            self.live.retain(|h| *h != handle);
            if self.live.len() == before {
                return Err(LinkError::UnknownModule(handle.0));
            }
            Ok(())
        }

        fn run_static_initializers(&mut self) -> ExecResult<()> {
            self.init_runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn invoke_entry(&mut self, _handle: ModuleHandle, symbol: &str) -> ExecResult<bool> {
            if symbol != ENTRY_SYMBOL {
                return Ok(false);
            }
            self.entry_runs.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn module_for(unit: UnitId) -> ObjectModule {
        let name = compute_fragment_name(&uuid::Uuid::nil(), unit.0);
        ObjectModule::new(name, unit.0)
    }

    #[test]
    fn add_without_module_is_a_noop_success() {
        let mut session = ExecutionSession::new(Box::new(FakeJit::default()));
        session.add_module(UnitId(0), None).unwrap();
        assert!(!session.is_linked(UnitId(0)));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut session = ExecutionSession::new(Box::new(FakeJit::default()));
        let unit = UnitId(0);
        session.add_module(unit, Some(module_for(unit))).unwrap();

        session.remove_module(unit).unwrap();
        // Second removal finds no handle and must not reach the backend,
        // which would reject the stale handle.
        session.remove_module(unit).unwrap();
        assert!(!session.is_linked(unit));
    }

    #[test]
    fn initializers_run_once_per_session() {
        let init_runs = Arc::new(AtomicUsize::new(0));
        let jit = FakeJit {
            init_runs: Arc::clone(&init_runs),
            ..FakeJit::default()
        };
        let mut session = ExecutionSession::new(Box::new(jit));

        let unit = UnitId(0);
        session.add_module(unit, Some(module_for(unit))).unwrap();
        session.execute(unit).unwrap();
        session.execute(unit).unwrap();
        assert_eq!(init_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn executing_an_unlinked_unit_does_nothing() {
        let entry_runs = Arc::new(AtomicUsize::new(0));
        let jit = FakeJit {
            entry_runs: Arc::clone(&entry_runs),
            ..FakeJit::default()
        };
        let mut session = ExecutionSession::new(Box::new(jit));

        session.add_module(UnitId(3), None).unwrap();
        session.execute(UnitId(3)).unwrap();
        assert_eq!(entry_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn link_failure_leaves_no_handle_behind() {
        let jit = FakeJit {
            reject_add: true,
            ..FakeJit::default()
        };
        let mut session = ExecutionSession::new(Box::new(jit));
        let unit = UnitId(0);

        session.add_module(unit, Some(module_for(unit))).unwrap_err();
        assert!(!session.is_linked(unit));
        // The failed unit still executes as a no-op.
        session.execute(unit).unwrap();
    }
}
