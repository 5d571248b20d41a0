//! Worker slots, process launching, liveness tracking and termination.

mod launcher;
mod reaper;
mod table;
mod termination;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use self::launcher::SpawnError;
pub(crate) use self::launcher::{ProcessLauncher, SystemLauncher, WorkerCommand};
#[cfg(not(unix))]
pub(crate) use self::reaper::POLL_INTERVAL;
pub(crate) use self::reaper::LivenessReaper;
pub(crate) use self::table::{WorkerProcess, WorkerTable};
pub(crate) use self::termination::{TerminationSchedule, terminate_all};

pub(crate) const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::workers");

/// Worker table shared between the dispatcher and the reaper.
pub(crate) type SharedTable<P> = Arc<Mutex<WorkerTable<P>>>;

/// Locks the table, recovering the data if a holder panicked.
pub(crate) fn lock_table<P>(workers: &Mutex<WorkerTable<P>>) -> MutexGuard<'_, WorkerTable<P>> {
    workers.lock().unwrap_or_else(PoisonError::into_inner)
}
