use camino::Utf8PathBuf;
use std::env;
use std::path::PathBuf;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

/// Address the listeners bind to unless configured otherwise.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Initial capacity of the worker table.
pub const DEFAULT_MAX_WORKERS: u32 = 10;

/// Pause between two accepts on the same listener, in milliseconds.
pub const DEFAULT_NEW_CONNECTION_DELAY_MS: u64 = 250;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File name of the worker executable looked up next to the daemon.
pub const WORKER_BINARY_NAME: &str = "wardenrun";

/// File name of the maintenance utility looked up next to the daemon.
pub const UTILITY_BINARY_NAME: &str = "wardenutil";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::modes::LogFormat {
    crate::modes::LogFormat::Json
}

/// Path of `name` in the directory holding the running executable.
///
/// Falls back to the bare name, resolved through `PATH`, when the current
/// executable cannot be determined.
pub fn default_sibling_binary(name: &str) -> Utf8PathBuf {
    let sibling = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(executable_name(name))))
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok());
    sibling.unwrap_or_else(|| Utf8PathBuf::from(executable_name(name)))
}

fn executable_name(name: &str) -> String {
    format!("{name}{}", env::consts::EXE_SUFFIX)
}

/// Directory for lock, pid and health files when none is configured.
pub fn default_runtime_directory() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir() {
            dir.push("warden");
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push("warden");
        dir.push(format!("uid-{}", unsafe { geteuid() }));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push("warden");
        dir
    }
}
