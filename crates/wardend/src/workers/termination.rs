//! Stops every live worker when the dispatcher shuts down.

use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::{SharedTable, WORKER_TARGET, WorkerProcess, WorkerTable, lock_table};

/// Timing of the termination sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TerminationSchedule {
    /// Interval between liveness checks.
    pub(crate) poll: Duration,
    /// Elapsed time after which the polite request is repeated.
    pub(crate) resend_after: Duration,
    /// Elapsed time after which stragglers are killed.
    pub(crate) grace: Duration,
}

impl Default for TerminationSchedule {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(1),
            resend_after: Duration::from_secs(20),
            grace: Duration::from_secs(30),
        }
    }
}

/// Asks every spawned worker to stop, then kills those that do not.
///
/// Returns the number of workers that had to be killed.
pub(crate) fn terminate_all<P>(workers: &SharedTable<P>, schedule: TerminationSchedule) -> usize {
    let started = Instant::now();
    let signalled = signal_all(workers);
    if signalled == 0 {
        return 0;
    }
    info!(
        target: WORKER_TARGET,
        workers = signalled,
        "requested worker termination"
    );
    let mut resent = false;
    while started.elapsed() < schedule.grace {
        if remaining(workers) == 0 {
            return 0;
        }
        if !resent && started.elapsed() >= schedule.resend_after {
            signal_all(workers);
            resent = true;
        }
        thread::sleep(schedule.poll);
    }
    kill_remaining(workers)
}

fn signal_all<P>(workers: &SharedTable<P>) -> usize {
    let mut table = lock_table(workers);
    let mut count = 0;
    for (slot, entry) in table.occupied_mut() {
        if let Some(WorkerProcess::Spawned(child)) = entry.process.as_mut() {
            request_stop(slot, child);
            count += 1;
        }
    }
    count
}

fn remaining<P>(workers: &SharedTable<P>) -> usize {
    let mut table = lock_table(workers);
    super::reaper::reap_table(&mut table);
    spawned_count(&mut table)
}

fn spawned_count<P>(table: &mut WorkerTable<P>) -> usize {
    table
        .occupied_mut()
        .filter(|(_, slot)| matches!(slot.process, Some(WorkerProcess::Spawned(_))))
        .count()
}

fn kill_remaining<P>(workers: &SharedTable<P>) -> usize {
    let mut table = lock_table(workers);
    let mut killed = Vec::new();
    for (slot, entry) in table.occupied_mut() {
        if let Some(WorkerProcess::Spawned(child)) = entry.process.as_mut() {
            warn!(
                target: WORKER_TARGET,
                slot,
                pid = child.id(),
                "worker ignored termination request; killing"
            );
            if let Err(error) = child.kill() {
                warn!(target: WORKER_TARGET, slot, error = %error, "failed to kill worker");
            }
            let _status = child.wait();
            killed.push(slot);
        }
    }
    for slot in &killed {
        table.free(*slot);
    }
    killed.len()
}

#[cfg(unix)]
fn request_stop(slot: usize, child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(errno) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!(
            target: WORKER_TARGET,
            slot,
            pid = raw,
            error = %errno,
            "failed to signal worker"
        );
    }
}

#[cfg(not(unix))]
fn request_stop(slot: usize, child: &mut Child) {
    if let Err(error) = child.kill() {
        warn!(target: WORKER_TARGET, slot, error = %error, "failed to stop worker");
    }
}
