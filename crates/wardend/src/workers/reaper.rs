//! Detects worker exits and frees their slots.
//!
//! On Unix the signal thread posts a child-exit event and the dispatcher loop
//! calls [`LivenessReaper::reap`]. Elsewhere a background thread runs the same
//! pass on a fixed interval. Either way the reaper only touches the worker
//! table and the died flag; pending clients are answered by the dispatcher.

use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(any(test, not(unix)))]
use std::thread;
#[cfg(any(test, not(unix)))]
use std::time::Duration;

use tracing::{debug, info};

use super::{SharedTable, WORKER_TARGET, WorkerProcess, WorkerTable, lock_table};

/// Interval of the polling reaper.
#[cfg(any(test, not(unix)))]
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(125);

/// A worker found to have exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExitedWorker {
    pub(crate) slot: usize,
    pub(crate) pid: u32,
    pub(crate) status: Option<ExitStatus>,
    /// A client was still waiting for this worker to verify.
    pub(crate) orphaned: bool,
}

/// Frees the slots of exited workers.
#[derive(Debug)]
pub(crate) struct LivenessReaper<P> {
    workers: SharedTable<P>,
    died: Arc<AtomicBool>,
}

impl<P> Clone for LivenessReaper<P> {
    fn clone(&self) -> Self {
        Self {
            workers: Arc::clone(&self.workers),
            died: Arc::clone(&self.died),
        }
    }
}

impl<P> LivenessReaper<P> {
    pub(crate) const fn new(workers: SharedTable<P>, died: Arc<AtomicBool>) -> Self {
        Self { workers, died }
    }

    /// Runs one reaping pass and raises the died flag for orphaned clients.
    pub(crate) fn reap(&self) -> Vec<ExitedWorker> {
        let exited = {
            let mut table = lock_table(&self.workers);
            reap_table(&mut table)
        };
        if exited.iter().any(|worker| worker.orphaned) {
            self.died.store(true, Ordering::SeqCst);
        }
        for worker in &exited {
            info!(
                target: WORKER_TARGET,
                slot = worker.slot,
                pid = worker.pid,
                status = ?worker.status,
                orphaned = worker.orphaned,
                "worker exited"
            );
        }
        exited
    }
}

impl<P: Send + 'static> LivenessReaper<P> {
    /// Reaps on a fixed interval until `shutdown` is raised.
    #[cfg(any(test, not(unix)))]
    pub(crate) fn spawn_polling(
        self,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            debug!(target: WORKER_TARGET, "polling reaper started");
            while !shutdown.load(Ordering::SeqCst) {
                self.reap();
                thread::sleep(interval);
            }
        })
    }
}

/// Frees every slot whose spawned worker has exited.
pub(crate) fn reap_table<P>(table: &mut WorkerTable<P>) -> Vec<ExitedWorker> {
    let mut exited = Vec::new();
    for (slot, entry) in table.occupied_mut() {
        let Some(WorkerProcess::Spawned(child)) = entry.process.as_mut() else {
            continue;
        };
        let pid = child.id();
        let status = match child.try_wait() {
            Ok(None) => continue,
            Ok(Some(status)) => Some(status),
            Err(error) => {
                debug!(
                    target: WORKER_TARGET,
                    slot,
                    pid,
                    error = %error,
                    "worker status unavailable; treating as exited"
                );
                None
            }
        };
        exited.push(ExitedWorker {
            slot,
            pid,
            status,
            orphaned: entry.pending.is_some(),
        });
    }
    for worker in &exited {
        table.free(worker.slot);
    }
    exited
}
