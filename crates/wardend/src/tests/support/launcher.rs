//! Worker launcher double that records every command line.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use crate::workers::{ProcessLauncher, SpawnError, WorkerProcess};

/// How [`RecordingLauncher`] materialises workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherMode {
    /// Nothing is started, as in manual mode.
    Manual,
    /// A long `sleep` stands in for the worker.
    Sleeping,
}

#[derive(Debug, Clone)]
pub struct RecordingLauncher {
    mode: LauncherMode,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingLauncher {
    #[must_use]
    pub fn new(mode: LauncherMode) -> Self {
        Self {
            mode,
            commands: Arc::default(),
        }
    }

    /// Argument vectors of every spawn request, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().expect("launcher mutex poisoned").clone()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn spawn(
        &self,
        binary: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> Result<WorkerProcess, SpawnError> {
        self.commands
            .lock()
            .expect("launcher mutex poisoned")
            .push(args.to_vec());
        match self.mode {
            LauncherMode::Manual => Ok(WorkerProcess::Manual),
            LauncherMode::Sleeping => Command::new("sleep")
                .arg("30")
                .current_dir(working_dir)
                .stdin(Stdio::null())
                .spawn()
                .map(WorkerProcess::Spawned)
                .map_err(|source| SpawnError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                }),
        }
    }
}
