//! The Warden dispatcher.
//!
//! `wardend` listens on a plain and an optional TLS port, admits clients,
//! launches one worker process per client session and keeps a table of the
//! workers it supervises. Workers call back with `VERIFY` to collect the
//! admission token and, for port-zero sessions, to have their own port relayed
//! to the waiting client. A password-protected control plane shuts the
//! dispatcher down, lists the sessions, controls the durable audit log and runs
//! the maintenance utility.
//!
//! Startup follows a fixed sequence: configuration is loaded and validated,
//! telemetry is installed, the singleton lock is taken in the runtime
//! directory, the process optionally detaches, and finally the listeners are
//! bound and handed to the single-threaded [`dispatch`] loop. Every stage is
//! reported through a [`HealthReporter`].

mod admin;
mod audit;
mod bootstrap;
mod dispatch;
mod health;
mod process;
mod protocol;
mod telemetry;
mod token;
mod transport;
mod workers;

pub use admin::{AdminError, UtilityError};
pub use audit::AuditLogError;
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use dispatch::DispatchError;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{DaemonizeError, LaunchError, LaunchMode, ShutdownError, run_daemon};
pub use protocol::CodecError;
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ListenerError, TlsError};
pub use workers::SpawnError;

#[cfg(test)]
mod tests;
