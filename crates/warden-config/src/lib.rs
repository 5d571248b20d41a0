//! Shared configuration for the Warden dispatcher and its admin client.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, an optional
//! TOML file named by `--config-path`, `WARDEN_*` environment variables and
//! finally command-line flags. The daemon only ever sees the merged
//! [`Config`]; [`Config::validate`] rejects port layouts that would make the
//! listeners collide with the worker port range.

mod defaults;
mod modes;
mod runtime;
mod validation;

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoResult};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LISTEN_HOST, DEFAULT_LOG_FILTER, DEFAULT_MAX_WORKERS, DEFAULT_NEW_CONNECTION_DELAY_MS,
    UTILITY_BINARY_NAME, WORKER_BINARY_NAME, default_log_filter, default_log_format,
    default_runtime_directory, default_sibling_binary,
};
pub use modes::{EncryptionMode, EncryptionModeParseError, LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use validation::ConfigValidationError;
pub use warden_wire::{DEFAULT_PLAIN_PORT, DEFAULT_TLS_PORT};

/// Merged dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "WARDEN")]
pub struct Config {
    /// Address both listeners bind to.
    pub listen_host: Option<String>,
    /// Port of the plain listener.
    #[ortho_config(default = 9584)]
    pub plain_port: u16,
    /// Port of the TLS listener.
    #[ortho_config(default = 9585)]
    pub tls_port: u16,
    /// Whether the TLS listener is disabled, enabled or mandatory.
    pub encryption: Option<EncryptionMode>,
    /// PEM certificate chain presented by the TLS listener.
    pub certificate_file: Option<Utf8PathBuf>,
    /// PEM PKCS#8 private key matching `certificate_file`.
    pub private_key_file: Option<Utf8PathBuf>,
    /// First port of the worker port range, when workers listen themselves.
    pub worker_base_port: Option<u16>,
    /// Initial capacity of the worker table.
    #[ortho_config(default = 10)]
    pub max_workers: u32,
    /// Secret required by `SHUTDOWN`, log control and `COMMAND`.
    pub admin_password: Option<String>,
    /// Secret required by `SHOWUSRS`.
    pub show_password: Option<String>,
    /// Worker executable; defaults to a sibling of the daemon binary.
    pub worker_binary: Option<Utf8PathBuf>,
    /// Maintenance utility executable; defaults to a sibling of the daemon.
    pub utility_binary: Option<Utf8PathBuf>,
    /// Configuration path handed to every worker.
    pub worker_config: Option<Utf8PathBuf>,
    /// Working directory for workers, utilities and the log mirror.
    pub work_dir: Option<Utf8PathBuf>,
    /// Permanent audit log; when absent the durable log is disabled.
    pub log_file: Option<Utf8PathBuf>,
    /// Archive an existing audit log before writing to it at startup.
    #[ortho_config(default = false)]
    pub new_log_at_start: bool,
    /// Keep the mirror for workers but never archive into the permanent log.
    #[ortho_config(default = false)]
    pub no_log: bool,
    /// Log worker command lines instead of spawning them.
    #[ortho_config(default = false)]
    pub manual_workers: bool,
    /// Debug level forwarded to workers; zero disables forwarding.
    #[ortho_config(default = 0)]
    pub debug_level: u8,
    /// Pause between two accepts on the same listener, in milliseconds.
    #[ortho_config(default = 250)]
    pub new_connection_delay_ms: u64,
    /// Directory for the lock, pid and health files.
    pub runtime_dir: Option<Utf8PathBuf>,
    /// Tracing filter expression.
    pub log_filter: Option<String>,
    /// Tracing output format.
    pub log_format: Option<LogFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: None,
            plain_port: DEFAULT_PLAIN_PORT,
            tls_port: DEFAULT_TLS_PORT,
            encryption: None,
            certificate_file: None,
            private_key_file: None,
            worker_base_port: None,
            max_workers: DEFAULT_MAX_WORKERS,
            admin_password: None,
            show_password: None,
            worker_binary: None,
            utility_binary: None,
            worker_config: None,
            work_dir: None,
            log_file: None,
            new_log_at_start: false,
            no_log: false,
            manual_workers: false,
            debug_level: 0,
            new_connection_delay_ms: DEFAULT_NEW_CONNECTION_DELAY_MS,
            runtime_dir: None,
            log_filter: None,
            log_format: None,
        }
    }
}

impl Config {
    /// Loads the layered configuration from the process arguments.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when a layer cannot be parsed or
    /// merged.
    pub fn load() -> OrthoResult<Self> {
        <Self as OrthoConfig>::load()
    }

    /// Loads the layered configuration from explicit arguments.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when a layer cannot be parsed or
    /// merged.
    pub fn load_from_iter<I, T>(args: I) -> OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Address both listeners bind to.
    #[must_use]
    pub fn listen_host(&self) -> &str {
        self.listen_host.as_deref().unwrap_or(DEFAULT_LISTEN_HOST)
    }

    /// Effective TLS policy.
    #[must_use]
    pub fn encryption(&self) -> EncryptionMode {
        self.encryption.unwrap_or_default()
    }

    /// Admin secret; empty accepts any password.
    #[must_use]
    pub fn admin_password(&self) -> &str {
        self.admin_password.as_deref().unwrap_or_default()
    }

    /// Read-only secret; empty accepts any password.
    #[must_use]
    pub fn show_password(&self) -> &str {
        self.show_password.as_deref().unwrap_or_default()
    }

    /// Worker executable, falling back to the sibling `wardenrun` binary.
    #[must_use]
    pub fn worker_binary(&self) -> Utf8PathBuf {
        self.worker_binary
            .clone()
            .unwrap_or_else(|| default_sibling_binary(WORKER_BINARY_NAME))
    }

    /// Utility executable, falling back to the sibling `wardenutil` binary.
    #[must_use]
    pub fn utility_binary(&self) -> Utf8PathBuf {
        self.utility_binary
            .clone()
            .unwrap_or_else(|| default_sibling_binary(UTILITY_BINARY_NAME))
    }

    /// Configuration path handed to workers; empty when unset.
    #[must_use]
    pub fn worker_config(&self) -> &str {
        self.worker_config
            .as_deref()
            .map(Utf8Path::as_str)
            .unwrap_or_default()
    }

    /// Working directory, defaulting to the current directory.
    #[must_use]
    pub fn work_dir(&self) -> &Utf8Path {
        self.work_dir
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    /// Whether the operator configured an explicit working directory.
    #[must_use]
    pub const fn has_work_dir(&self) -> bool {
        self.work_dir.is_some()
    }

    /// Initial worker table capacity.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        usize::try_from(self.max_workers).unwrap_or(usize::MAX)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Tracing output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }
}
