//! Trait seams for the external front-end/codegen service and JIT linker
//!
//! The kernel never parses, checks, or lowers source itself; it drives an
//! implementation of [`FrontendService`] incrementally and hands the
//! resulting modules to a [`JitBackend`]. Both halves are constructed
//! together by a [`ServiceFactory`] so `reset` can rebuild them from
//! scratch.

use std::any::Any;
use std::sync::Arc;

use super::error::{CompileResult, ExecResult, LinkResult};
use super::unit::FragmentName;
use crate::repl::ReplConfig;

/// Opaque handle to a checked program fragment
///
/// The fragment itself lives in the front end's shared context; the kernel
/// only threads handles through import lists and releases them on undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentId(pub u64);

/// Backend-issued token for one linked module's allocations
///
/// Removing the handle unlinks and frees the module's code and data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// An owned compiled module ready for linking
///
/// The payload is produced by one service implementation and consumed by
/// its paired backend; the kernel treats it as opaque. Ownership transfers
/// exactly once, from the compilation unit into the linker.
pub struct ObjectModule {
    name: FragmentName,
    payload: Box<dyn Any + Send>,
}

impl ObjectModule {
    /// Wrap a service-specific payload under a fragment name
    pub fn new(name: FragmentName, payload: impl Any + Send) -> Self {
        Self {
            name,
            payload: Box::new(payload),
        }
    }

    /// Fragment name this module was lowered from
    pub fn name(&self) -> &FragmentName {
        &self.name
    }

    /// Consume the module, yielding the service-specific payload
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }
}

impl std::fmt::Debug for ObjectModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectModule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One compile request handed to the front end
#[derive(Debug)]
pub struct CheckRequest<'a> {
    /// Name to register the new fragment under
    pub fragment: &'a FragmentName,
    /// Source text of the snippet
    pub source: &'a str,
    /// Every previously accepted fragment, in submission order
    ///
    /// The service resolves references against these plus its own core
    /// library, which is always imported implicitly.
    pub imports: &'a [FragmentId],
    /// Filename for diagnostics, if the source came from a file
    pub filename: Option<&'a str>,
}

/// Host function installed in the backend's runtime-symbol table
///
/// `serde_json::Value` is the type-erased value currency crossing the
/// kernel/service seam.
pub type RuntimeFn = Arc<dyn Fn(&[serde_json::Value]) -> serde_json::Value + Send + Sync>;

/// External front-end/codegen service contract
///
/// Implementations keep a shared context of checked fragments. The kernel
/// creates one fresh fragment per submission and declares imports on it
/// rather than reopening previously checked fragments, so implementations
/// never need to support in-place extension.
pub trait FrontendService: Send {
    /// Source of the runtime-support declarations compiled as the bootstrap
    /// unit before any user input
    ///
    /// Must declare the capture callback named by
    /// [`CAPTURE_FUNCTION`](super::capture::CAPTURE_FUNCTION) so rewritten
    /// expressions resolve.
    fn runtime_support_source(&self) -> String;

    /// Parse, resolve, and type-check one snippet against its imports
    ///
    /// On success the fragment joins the shared context under the requested
    /// name and is referenced by later units until released.
    fn check(&mut self, request: CheckRequest<'_>) -> CompileResult<FragmentId>;

    /// Lower a checked fragment to a loadable module
    ///
    /// Returns `Ok(None)` for fragments that only affect the declaration
    /// namespace and have no executable body.
    fn lower(&mut self, fragment: FragmentId) -> CompileResult<Option<ObjectModule>>;

    /// Drop a fragment from the shared context
    ///
    /// Called during undo, newest first, so a released fragment is never
    /// still imported by a live one.
    fn release(&mut self, fragment: FragmentId);
}

/// Just-in-time linker contract
///
/// Symbol resolution order is fixed: the session's own modules newest
/// first, then the runtime-symbol table, then backend builtins, so later
/// re-declarations shadow earlier ones predictably.
pub trait JitBackend: Send {
    /// Process-wide target preparation
    ///
    /// The kernel guards this behind a global once-flag; implementations
    /// may assume it runs at most once per process.
    fn prepare(&mut self);

    /// Install a host function in the runtime-symbol table
    fn define_runtime_fn(&mut self, name: &str, func: RuntimeFn);

    /// Link a module, returning the resource handle scoping its allocations
    fn add_module(&mut self, module: ObjectModule) -> LinkResult<ModuleHandle>;

    /// Unlink a module and free everything under its handle
    fn remove_module(&mut self, handle: ModuleHandle) -> LinkResult<()>;

    /// Run global/static initializers for everything linked so far
    ///
    /// Invoked once per session, on the first execution.
    fn run_static_initializers(&mut self) -> ExecResult<()>;

    /// Invoke `symbol` in the module under `handle` with no arguments
    ///
    /// Returns `Ok(false)` when the module defines no such symbol; that is
    /// not an error.
    fn invoke_entry(&mut self, handle: ModuleHandle, symbol: &str) -> ExecResult<bool>;
}

/// A matched front end + backend pair produced by a factory
pub struct ServicePair {
    /// The front-end/codegen half
    pub frontend: Box<dyn FrontendService>,
    /// The JIT linker half
    pub backend: Box<dyn JitBackend>,
}

/// Constructor for service pairs
///
/// `reset` rebuilds the whole engine through this seam, so the factory must
/// be able to produce fresh, independent pairs repeatedly.
pub trait ServiceFactory: Send {
    /// Build a fresh front end + backend pair for the given configuration
    fn connect(&self, config: &ReplConfig) -> anyhow::Result<ServicePair>;
}

impl<F> ServiceFactory for F
where
    F: Fn(&ReplConfig) -> anyhow::Result<ServicePair> + Send,
{
    fn connect(&self, config: &ReplConfig) -> anyhow::Result<ServicePair> {
        self(config)
    }
}
