//! Test double for [`HealthReporter`] that records lifecycle events.

use std::path::Path;
use std::sync::Mutex;

use warden_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    WorkerLaunched {
        slot: usize,
        pid: u32,
        owner: String,
    },
    WorkerExited {
        slot: usize,
        pid: u32,
        orphaned: bool,
    },
    LogRotated,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Process ids of every launched worker, in launch order.
    #[must_use]
    pub fn launched_pids(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::WorkerLaunched { pid, .. } => Some(pid),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn worker_launched(&self, slot: usize, pid: u32, owner: &str) {
        self.record(HealthEvent::WorkerLaunched {
            slot,
            pid,
            owner: owner.to_owned(),
        });
    }

    fn worker_exited(&self, slot: usize, pid: u32, orphaned: bool) {
        self.record(HealthEvent::WorkerExited {
            slot,
            pid,
            orphaned,
        });
    }

    fn log_rotated(&self, _archive: Option<&Path>) {
        self.record(HealthEvent::LogRotated);
    }
}
