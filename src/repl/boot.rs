//! Process-wide one-time backend preparation
//!
//! The underlying codegen/target subsystem must be booted exactly once per
//! process, however many orchestrator instances exist and however often
//! they are reset. The flag lives behind a lazily-initialized,
//! mutex-guarded accessor rather than a bare global.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::service::JitBackend;

static BACKEND_BOOTED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// Run the backend's process-wide preparation if it has not run yet
///
/// Holding the lock across `prepare` means a second orchestrator
/// constructed concurrently blocks until preparation finishes instead of
/// observing a half-booted target subsystem.
pub(crate) fn prepare_process(backend: &mut dyn JitBackend) {
    let mut booted = BACKEND_BOOTED.lock();
    if !*booted {
        backend.prepare();
        *booted = true;
    }
}
