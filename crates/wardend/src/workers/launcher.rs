//! Builds worker command lines and starts worker processes.

use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::info;

use warden_wire::quote_token;

use super::{WORKER_TARGET, WorkerProcess};

/// Arguments handed to a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WorkerCommand {
    /// Address of the client the worker will serve.
    pub(crate) peer: IpAddr,
    /// Port the worker connects to or listens on.
    pub(crate) port: u16,
    /// Configuration file the worker reads.
    pub(crate) config_path: String,
    /// Plain listener port the worker calls back on.
    pub(crate) callback_port: u16,
    /// Zero-based slot index; the worker receives it one-based.
    pub(crate) slot: usize,
    /// The client arrived over TLS.
    pub(crate) tls: bool,
    /// The port was assigned from the worker range rather than the client.
    pub(crate) assigned_port: bool,
    /// The client asked for a graphical worker.
    pub(crate) gui: bool,
    /// Product subtype captured from the last family `HELLO`.
    pub(crate) subtype: Option<String>,
    /// Mirror file the worker appends audit records to.
    pub(crate) mirror: Option<PathBuf>,
    /// Debug level forwarded to the worker; zero forwards nothing.
    pub(crate) debug_level: u8,
}

impl WorkerCommand {
    /// Renders the argument vector, excluding the program name.
    pub(crate) fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.peer.to_string(),
            self.port.to_string(),
            self.config_path.clone(),
            format!("{}:{}", self.callback_port, self.slot + 1),
        ];
        if self.tls {
            args.push("-ssl".to_owned());
        }
        if self.assigned_port {
            args.push("-sport".to_owned());
        }
        if self.gui {
            args.push("-gui".to_owned());
        }
        if let Some(subtype) = &self.subtype {
            args.push(format!("-subtype={subtype}"));
        }
        if let Some(mirror) = &self.mirror {
            args.push(format!("-l={}", mirror.display()));
        }
        if self.debug_level > 0 {
            args.push(format!("-d{}", self.debug_level));
        }
        args
    }
}

/// Renders a command line for logs, quoting arguments that contain spaces.
pub(crate) fn command_line(binary: &Path, args: &[String]) -> String {
    let mut line = quoted(&binary.display().to_string());
    for arg in args {
        line.push(' ');
        line.push_str(&quoted(arg));
    }
    line
}

fn quoted(value: &str) -> String {
    if value.is_empty() || value.contains([' ', '"', '\\']) {
        String::from_utf8_lossy(&quote_token(value.as_bytes())).into_owned()
    } else {
        value.to_owned()
    }
}

/// Starts worker processes.
pub(crate) trait ProcessLauncher: Send {
    /// Starts `binary` with `args` inside `working_dir`.
    fn spawn(
        &self,
        binary: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> Result<WorkerProcess, SpawnError>;
}

/// Failure to start a worker.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The worker executable could not be started.
    #[error("failed to start worker '{binary}': {source}")]
    Spawn {
        /// Worker executable.
        binary: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Launcher backed by [`std::process::Command`].
///
/// In manual mode nothing is started; the command line is logged so an
/// operator can run the worker by hand under a debugger.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SystemLauncher {
    manual: bool,
}

impl SystemLauncher {
    pub(crate) const fn new(manual: bool) -> Self {
        Self { manual }
    }
}

impl ProcessLauncher for SystemLauncher {
    fn spawn(
        &self,
        binary: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> Result<WorkerProcess, SpawnError> {
        if self.manual {
            info!(
                target: WORKER_TARGET,
                "EXEC: \"{}\"",
                command_line(binary, args)
            );
            return Ok(WorkerProcess::Manual);
        }
        let child = Command::new(binary)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SpawnError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;
        info!(
            target: WORKER_TARGET,
            pid = child.id(),
            binary = %binary.display(),
            "worker process started"
        );
        Ok(WorkerProcess::Spawned(child))
    }
}
