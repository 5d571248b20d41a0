//! Runs the full launch sequence on a background thread.

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use serde_json::Value;
use warden_config::RuntimePaths;

use crate::dispatch::SupervisorEvent;
use crate::health::HealthReporter;
use crate::process::{
    DaemonizeError, Daemonizer, LaunchError, LaunchMode, LaunchPlan, ProcessControl, ServiceDeps,
    ShutdownError, SignalSource, run_daemon_with,
};
use crate::workers::TerminationSchedule;

use super::{LauncherMode, RecordingHealthReporter, RecordingLauncher, TestConfigLoader};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Daemoniser that only counts invocations.
#[derive(Debug, Clone, Default)]
pub struct TestDaemonizer {
    calls: Arc<AtomicUsize>,
}

impl TestDaemonizer {
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Daemonizer for TestDaemonizer {
    fn daemonize(&self, _paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Signal source the test drives by hand.
#[derive(Debug, Clone, Default)]
pub struct TestSignals {
    sender: Arc<Mutex<Option<Sender<SupervisorEvent>>>>,
}

impl TestSignals {
    fn send(&self, event: SupervisorEvent) {
        if let Some(sender) = self.sender.lock().expect("signal mutex poisoned").as_ref() {
            let _ = sender.send(event);
        }
    }

    /// Delivers a termination request as `SIGTERM` would.
    pub fn terminate(&self) {
        self.send(SupervisorEvent::Terminate(15));
    }

    /// Announces a child state change as `SIGCHLD` would.
    pub fn child_exited(&self) {
        self.send(SupervisorEvent::ChildExited);
    }
}

impl SignalSource for TestSignals {
    fn subscribe(&self, events: Sender<SupervisorEvent>) -> Result<(), ShutdownError> {
        *self.sender.lock().expect("signal mutex poisoned") = Some(events);
        Ok(())
    }
}

/// A dispatcher started through [`run_daemon_with`] with test doubles.
pub struct DaemonHarness {
    pub loader: TestConfigLoader,
    pub reporter: Arc<RecordingHealthReporter>,
    pub launcher: RecordingLauncher,
    pub daemonizer: TestDaemonizer,
    pub signals: TestSignals,
    handle: Option<JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
}

impl DaemonHarness {
    #[must_use]
    pub fn new(loader: TestConfigLoader, mode: LauncherMode) -> Self {
        Self {
            loader,
            reporter: Arc::new(RecordingHealthReporter::default()),
            launcher: RecordingLauncher::new(mode),
            daemonizer: TestDaemonizer::default(),
            signals: TestSignals::default(),
            handle: None,
            result: None,
        }
    }

    fn plan(
        &self,
        mode: LaunchMode,
    ) -> LaunchPlan<TestConfigLoader, TestDaemonizer, TestSignals> {
        LaunchPlan {
            process: ProcessControl {
                mode,
                daemonizer: self.daemonizer.clone(),
                signals: self.signals.clone(),
                termination: TerminationSchedule {
                    poll: Duration::from_millis(10),
                    resend_after: Duration::from_millis(200),
                    grace: Duration::from_secs(1),
                },
            },
            services: ServiceDeps {
                loader: self.loader.clone(),
                reporter: Arc::clone(&self.reporter) as Arc<dyn HealthReporter>,
                launcher: Some(Box::new(self.launcher.clone())),
            },
        }
    }

    /// Starts the dispatcher on a background thread.
    pub fn start(&mut self, mode: LaunchMode) -> Result<(), String> {
        if self.handle.is_some() {
            return Err("dispatcher already started".to_owned());
        }
        let plan = self.plan(mode);
        self.handle = Some(thread::spawn(move || run_daemon_with(plan)));
        Ok(())
    }

    /// Runs a second launch on the calling thread and records its outcome.
    pub fn run_inline(&mut self, mode: LaunchMode) {
        self.result = Some(run_daemon_with(self.plan(mode)));
    }

    /// Waits until the health snapshot reports `ready`.
    pub fn wait_until_ready(&self) -> Result<(), String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if self.health_status().as_deref() == Some("ready") {
                return Ok(());
            }
            if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
                return Err("dispatcher exited before becoming ready".to_owned());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err("timed out waiting for the ready health snapshot".to_owned())
    }

    /// Waits for the dispatcher thread to finish and records its outcome.
    pub fn join(&mut self) -> Result<(), String> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "dispatcher not started".to_owned())?;
        let result = handle
            .join()
            .map_err(|_| "dispatcher thread panicked".to_owned())?;
        self.result = Some(result);
        Ok(())
    }

    /// Requests termination and waits for the dispatcher to exit.
    pub fn stop(&mut self) -> Result<(), String> {
        self.signals.terminate();
        self.join()
    }

    #[must_use]
    pub fn address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.loader.config().plain_port))
    }

    #[must_use]
    pub fn result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn runtime_file(&self, name: &str) -> PathBuf {
        self.loader.runtime_dir().join(name)
    }

    /// Status recorded in the health snapshot, if one is present.
    #[must_use]
    pub fn health_status(&self) -> Option<String> {
        let bytes = fs::read(self.runtime_file("wardend.health")).ok()?;
        let snapshot: Value = serde_json::from_slice(&bytes).ok()?;
        snapshot
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Polls `condition` until it holds or the timeout elapses.
    pub fn wait_for(&self, mut condition: impl FnMut(&Self) -> bool) -> Result<(), String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if condition(self) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err("timed out waiting for the dispatcher".to_owned())
    }
}

impl Drop for DaemonHarness {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.signals.terminate();
            let _ = handle.join();
        }
    }
}
