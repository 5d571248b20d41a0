//! Shared doubles and harnesses for the behavioural suites.

mod client;
mod config_loader;
mod daemon;
mod launcher;
mod reporter;

pub use client::{call, read_reply, submit};
pub use config_loader::{ADMIN_PASSWORD, FailingConfigLoader, TestConfigLoader};
pub use daemon::DaemonHarness;
pub use launcher::{LauncherMode, RecordingLauncher};
pub use reporter::{HealthEvent, RecordingHealthReporter};
