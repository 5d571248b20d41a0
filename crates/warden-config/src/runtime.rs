//! Derives runtime artefact paths shared by the admin tool and daemon.
//!
//! The runtime directory houses the daemon lock, pid, and health snapshots.
//! Both binaries agree on the layout so the admin tool can report whether a
//! dispatcher is running before it tries to connect.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{Config, default_runtime_directory};

const LOCK_FILE: &str = "wardend.lock";
const PID_FILE: &str = "wardend.pid";
const HEALTH_FILE: &str = "wardend.health";

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    health_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the configuration, creating the directory.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = config
            .runtime_dir
            .as_ref()
            .map_or_else(default_runtime_directory, |dir| {
                dir.as_std_path().to_path_buf()
            });
        Self::in_directory(runtime_dir)
    }

    /// Uses `runtime_dir` directly, creating it when missing.
    pub fn in_directory(runtime_dir: PathBuf) -> Result<Self, RuntimePathsError> {
        if runtime_dir.as_os_str().is_empty() {
            return Err(RuntimePathsError::EmptyDirectory);
        }
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join(LOCK_FILE),
            pid_path: runtime_dir.join(PID_FILE),
            health_path: runtime_dir.join(HEALTH_FILE),
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the PID file.
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the health snapshot.
    pub fn health_path(&self) -> &Path {
        self.health_path.as_path()
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The configured runtime directory was an empty string.
    #[error("runtime directory must not be empty")]
    EmptyDirectory,
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn derives_paths_under_configured_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let runtime = dir.path().join("run");
        let config = Config {
            runtime_dir: Utf8PathBuf::from_path_buf(runtime.clone()).ok(),
            ..Config::default()
        };
        let paths = RuntimePaths::from_config(&config).expect("paths should derive");
        assert!(runtime.is_dir(), "runtime directory should be created");
        assert!(paths.lock_path().ends_with("wardend.lock"));
        assert!(paths.pid_path().ends_with("wardend.pid"));
        assert!(paths.health_path().ends_with("wardend.health"));
    }

    #[test]
    fn default_directory_is_namespaced() {
        let tail = default_runtime_directory()
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .expect("runtime dir should have trailing component");
        assert!(
            tail == "warden" || tail.starts_with("uid-"),
            "unexpected runtime tail: {tail}"
        );
    }

    #[test]
    fn rejects_empty_directory() {
        let error = RuntimePaths::in_directory(PathBuf::new()).expect_err("empty must fail");
        assert!(matches!(error, RuntimePathsError::EmptyDirectory));
    }
}
