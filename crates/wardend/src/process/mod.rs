//! Process lifecycle: singleton guard, daemonisation, signal forwarding and
//! the launch sequence that wires the dispatcher together.

mod daemonizer;
mod errors;
mod files;
mod guard;
mod launch;
mod signals;

pub use self::daemonizer::DaemonizeError;
pub use self::errors::LaunchError;
pub use self::launch::{LaunchMode, run_daemon};
pub use self::signals::ShutdownError;

#[cfg(test)]
pub(crate) use self::daemonizer::Daemonizer;
#[cfg(test)]
pub(crate) use self::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};
#[cfg(test)]
pub(crate) use self::signals::SignalSource;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Keeps the dispatcher attached to the terminal when set.
pub(crate) const FOREGROUND_ENV_VAR: &str = "WARDEN_FOREGROUND";
