//! Structured health reporting for dispatcher lifecycle events.

use std::path::Path;
use std::sync::Arc;

use crate::bootstrap::BootstrapError;

use warden_config::Config;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked after a worker process has been started for a client.
    fn worker_launched(&self, slot: usize, pid: u32, owner: &str);

    /// Invoked when a worker exit has been observed.
    fn worker_exited(&self, slot: usize, pid: u32, orphaned: bool);

    /// Invoked after `NEWLOG` archived the permanent log.
    fn log_rotated(&self, archive: Option<&Path>);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn worker_launched(&self, slot: usize, pid: u32, owner: &str) {
        (**self).worker_launched(slot, pid, owner);
    }

    fn worker_exited(&self, slot: usize, pid: u32, orphaned: bool) {
        (**self).worker_exited(slot, pid, orphaned);
    }

    fn log_rotated(&self, archive: Option<&Path>) {
        (**self).log_rotated(archive);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting dispatcher bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            host = %config.listen_host(),
            plain_port = config.plain_port,
            tls_port = config.tls_port,
            encryption = %config.encryption(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "dispatcher bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "dispatcher bootstrap failed"
        );
    }

    fn worker_launched(&self, slot: usize, pid: u32, owner: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_launched",
            slot,
            pid,
            owner,
            "worker launched"
        );
    }

    fn worker_exited(&self, slot: usize, pid: u32, orphaned: bool) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_exited",
            slot,
            pid,
            orphaned,
            "worker exited"
        );
    }

    fn log_rotated(&self, archive: Option<&Path>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "log_rotated",
            archive = ?archive,
            "audit log rotated"
        );
    }
}
