//! Singleton lock plus the pid and health artefacts it owns.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{info, warn};
use warden_config::RuntimePaths;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::files::atomic_write;

/// Holds the lock file for the lifetime of the dispatcher.
///
/// Dropping the guard removes the lock, pid and health files.
#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    pub(super) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(super) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let path = self.paths.pid_path();
        atomic_write(path, format!("{pid}\n").as_bytes()).map_err(|source| {
            LaunchError::PidWrite {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.pid = Some(pid);
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %path.display(),
            "pid file written"
        );
        Ok(())
    }

    pub(super) fn write_health(&self, state: HealthState) -> Result<(), LaunchError> {
        let pid = self.pid.ok_or(LaunchError::MissingPid)?;
        let path = self.paths.health_path();
        let snapshot = HealthSnapshot::new(state, pid)?;
        let mut contents = serde_json::to_vec(&snapshot)?;
        contents.push(b'\n');
        atomic_write(path, &contents).map_err(|source| LaunchError::HealthWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            target: PROCESS_TARGET,
            status = snapshot.status,
            file = %path.display(),
            "health snapshot updated"
        );
        Ok(())
    }

    pub(super) const fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, artefact) in [
            (self.paths.lock_path(), "lock"),
            (self.paths.pid_path(), "pid"),
            (self.paths.health_path(), "health"),
        ] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: PROCESS_TARGET,
                    file = %path.display(),
                    artefact,
                    error = %error,
                    "failed to remove runtime file"
                );
            }
        }
    }
}

/// Lifecycle stage published in the health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum HealthState {
    Starting,
    Ready,
    Stopping,
}

impl HealthState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: &'static str,
    pid: u32,
    timestamp: u64,
}

impl HealthSnapshot {
    fn new(state: HealthState, pid: u32) -> Result<Self, LaunchError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|source| LaunchError::Clock { source })?
            .as_secs();
        Ok(Self {
            status: state.as_str(),
            pid,
            timestamp,
        })
    }
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(paths.lock_path()) {
        Ok(file) => {
            info!(
                target: PROCESS_TARGET,
                file = %paths.lock_path().display(),
                "acquired dispatcher lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(LaunchError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn handle_existing_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    if let Some(pid) = read_pid(paths.pid_path())
        && pid != 0
    {
        if process_alive(pid)? {
            info!(
                target: PROCESS_TARGET,
                pid,
                "refusing to start: existing dispatcher alive"
            );
            return Err(LaunchError::AlreadyRunning { pid });
        }
        warn!(
            target: PROCESS_TARGET,
            pid,
            "previous dispatcher not detected; cleaning stale files"
        );
    }
    remove_file(paths.lock_path())?;
    remove_file(paths.pid_path())?;
    acquire_lock(paths)
}

fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok()
}

fn remove_file(path: &Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> Result<bool, LaunchError> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH | Errno::ECHILD) => Ok(false),
        Err(source) => Err(LaunchError::CheckProcess { pid, source }),
    }
}

// Without a portable probe a leftover lock is treated as stale.
#[cfg(not(unix))]
fn process_alive(_pid: u32) -> Result<bool, LaunchError> {
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::Value;
    use tempfile::TempDir;

    #[fixture]
    fn runtime() -> (TempDir, RuntimePaths) {
        let dir = tempfile::tempdir().expect("temp dir");
        let paths = RuntimePaths::in_directory(dir.path().join("run")).expect("paths");
        (dir, paths)
    }

    #[rstest]
    fn writes_pid_and_health(runtime: (TempDir, RuntimePaths)) {
        let (_dir, paths) = runtime;
        let mut guard = ProcessGuard::acquire(paths.clone()).expect("lock");
        assert!(matches!(
            guard.write_health(HealthState::Starting),
            Err(LaunchError::MissingPid)
        ));
        guard.write_pid(4242).expect("pid");
        guard.write_health(HealthState::Ready).expect("health");

        assert_eq!(read_pid(paths.pid_path()), Some(4242));
        let health: Value =
            serde_json::from_slice(&fs::read(paths.health_path()).expect("read health"))
                .expect("parse health");
        assert_eq!(health["status"], "ready");
        assert_eq!(health["pid"], 4242);
    }

    #[rstest]
    fn dropping_the_guard_removes_artefacts(runtime: (TempDir, RuntimePaths)) {
        let (_dir, paths) = runtime;
        let mut guard = ProcessGuard::acquire(paths.clone()).expect("lock");
        guard.write_pid(std::process::id()).expect("pid");
        guard.write_health(HealthState::Stopping).expect("health");
        drop(guard);
        assert!(!paths.lock_path().exists());
        assert!(!paths.pid_path().exists());
        assert!(!paths.health_path().exists());
    }

    #[rstest]
    fn live_owner_blocks_a_second_guard(runtime: (TempDir, RuntimePaths)) {
        let (_dir, paths) = runtime;
        let mut first = ProcessGuard::acquire(paths.clone()).expect("lock");
        first.write_pid(std::process::id()).expect("pid");
        let error = ProcessGuard::acquire(paths).expect_err("second guard");
        assert!(matches!(
            error,
            LaunchError::AlreadyRunning { pid } if pid == std::process::id()
        ));
    }

    #[rstest]
    fn lock_without_pid_is_reclaimed(runtime: (TempDir, RuntimePaths)) {
        let (_dir, paths) = runtime;
        fs::write(paths.lock_path(), b"").expect("stale lock");
        let guard = ProcessGuard::acquire(paths.clone()).expect("reclaimed lock");
        assert!(paths.lock_path().exists());
        drop(guard);
    }
}
