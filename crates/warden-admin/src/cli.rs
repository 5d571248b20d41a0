//! Command-line argument definitions for `warden-admin`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use warden_wire::{DEFAULT_PLAIN_PORT, DEFAULT_TLS_PORT};

/// Administration client for a running Warden dispatcher.
#[derive(Parser, Debug)]
#[command(name = "warden-admin", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Host name or address of the dispatcher.
    #[arg(long, default_value = "localhost")]
    pub(crate) host: String,
    /// Dispatcher port; defaults to the plain or TLS port.
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Administrative (or show) password.
    #[arg(long, default_value = "")]
    pub(crate) password: String,
    /// Connects to the TLS listener.
    #[arg(long)]
    pub(crate) tls: bool,
    /// PEM bundle of certificate authorities trusted for `--tls`.
    #[arg(long, value_name = "PATH", requires = "tls")]
    pub(crate) ca_file: Option<PathBuf>,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: AdminCommand,
}

impl Cli {
    pub(crate) fn port(&self) -> u16 {
        self.port.unwrap_or(if self.tls {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PLAIN_PORT
        })
    }
}

/// Operations understood by the dispatcher control plane.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum AdminCommand {
    /// Stops the dispatcher and its workers.
    Shutdown,
    /// Lists the owners of the active sessions.
    Users,
    /// Archives the audit log and starts a fresh one.
    Newlog,
    /// Resumes copying audit records into the permanent log.
    Startlog,
    /// Pauses copying audit records into the permanent log.
    Stoplog,
    /// Runs a maintenance utility on the dispatcher host.
    Utility {
        /// Utility name followed by its arguments.
        #[arg(
            value_name = "COMMAND",
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        command_line: Vec<String>,
    },
}
