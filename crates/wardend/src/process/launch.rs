//! Sequences dispatcher startup, the serving loop and shutdown.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::unbounded;
use tracing::{info, warn};
use warden_config::{Config, RuntimePaths};

use crate::admin::{AdminCommandProcessor, SystemUtilityRunner};
use crate::audit::{AuditLog, LogStartup};
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{DispatchSettings, Dispatcher, Supervisor};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{Channel, RustlsAcceptor, SocketListener, TlsAcceptor};
use crate::workers::{ProcessLauncher, SystemLauncher, TerminationSchedule};

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::signals::{SignalSource, SystemSignals};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET};

/// Launch mode for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal; used for debugging and tests.
    Foreground,
}

impl LaunchMode {
    fn detect() -> Self {
        if cfg!(not(unix)) || env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators controlling the lifecycle.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) signals: S,
    pub(crate) termination: TerminationSchedule,
}

/// Service dependencies used to build the dispatcher.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    /// Overrides the launcher derived from `manual_workers`.
    pub(crate) launcher: Option<Box<dyn ProcessLauncher>>,
}

/// Everything needed to launch the dispatcher.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) process: ProcessControl<D, S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the dispatcher using the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        process: ProcessControl {
            mode: LaunchMode::detect(),
            daemonizer: SystemDaemonizer,
            signals: SystemSignals,
            termination: TerminationSchedule::default(),
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
            launcher: None,
        },
    })
}

/// Runs the dispatcher with injected collaborators.
pub(crate) fn run_daemon_with<L, D, S>(plan: LaunchPlan<L, D, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: SignalSource,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        signals,
        termination,
    } = process;
    let ServiceDeps {
        loader,
        reporter,
        launcher,
    } = services;

    let daemon = bootstrap_with(&loader, Arc::clone(&reporter))?;
    let config = daemon.into_config();
    info!(target: PROCESS_TARGET, ?mode, "starting dispatcher runtime");

    let mut guard = ProcessGuard::acquire(RuntimePaths::from_config(&config)?)?;
    // Detaching changes the working directory, so relative paths are pinned first.
    let paths = ResolvedPaths::resolve(&config)?;
    if mode == LaunchMode::Background {
        daemonizer.daemonize(guard.paths())?;
    }
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;

    let (sender, events) = unbounded();
    signals.subscribe(sender)?;

    let (listeners, tls) = open_listeners(&config, &paths)?;
    let plain_port = bound_port(&listeners, Channel::Plain).unwrap_or(config.plain_port);
    let tls_port = bound_port(&listeners, Channel::Tls);
    let log = open_audit_log(&config, &paths)?;

    let mut settings = DispatchSettings::from_config(&config).with_bound_ports(plain_port, tls_port);
    settings.worker_binary = paths.worker_binary;
    settings.work_dir.clone_from(&paths.work_dir);
    let launcher: Box<dyn ProcessLauncher> = match launcher {
        Some(launcher) => launcher,
        None => Box::new(SystemLauncher::new(config.manual_workers)),
    };
    let admin = AdminCommandProcessor::new(
        config.admin_password(),
        config.show_password(),
        Some(paths.work_dir),
        Box::new(SystemUtilityRunner::new(paths.utility_binary)),
    );
    let supervisor = Supervisor::new(settings, log, launcher, admin, reporter);

    #[cfg(not(unix))]
    let poller = {
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let handle = supervisor
            .reaper()
            .spawn_polling(crate::workers::POLL_INTERVAL, Arc::clone(&stop));
        (stop, handle)
    };

    guard.write_health(HealthState::Ready)?;
    let killed = Dispatcher::new(supervisor, listeners, tls, events).run(termination);
    guard.write_health(HealthState::Stopping)?;

    #[cfg(not(unix))]
    {
        let (stop, handle) = poller;
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        if handle.join().is_err() {
            warn!(target: PROCESS_TARGET, "polling reaper panicked");
        }
    }

    info!(target: PROCESS_TARGET, killed, "shutdown sequence completed");
    Ok(())
}

/// Configured paths made absolute against the launch directory.
#[derive(Debug)]
struct ResolvedPaths {
    work_dir: PathBuf,
    worker_binary: PathBuf,
    utility_binary: PathBuf,
    log_file: Option<PathBuf>,
    certificate_file: Option<PathBuf>,
    private_key_file: Option<PathBuf>,
}

impl ResolvedPaths {
    fn resolve(config: &Config) -> Result<Self, LaunchError> {
        let optional = |path: Option<&Path>| path.map(absolute).transpose();
        Ok(Self {
            work_dir: absolute(config.work_dir().as_std_path())?,
            worker_binary: absolute(config.worker_binary().as_std_path())?,
            utility_binary: absolute(config.utility_binary().as_std_path())?,
            log_file: optional(config.log_file.as_ref().map(|path| path.as_std_path()))?,
            certificate_file: optional(
                config
                    .certificate_file
                    .as_ref()
                    .map(|path| path.as_std_path()),
            )?,
            private_key_file: optional(
                config
                    .private_key_file
                    .as_ref()
                    .map(|path| path.as_std_path()),
            )?,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, LaunchError> {
    std::path::absolute(path).map_err(|source| LaunchError::ResolvePath {
        path: path.to_path_buf(),
        source,
    })
}

/// Binds the plain listener and, when TLS is enabled, the TLS listener.
fn open_listeners(
    config: &Config,
    paths: &ResolvedPaths,
) -> Result<(Vec<SocketListener>, Option<Box<dyn TlsAcceptor>>), LaunchError> {
    let host = config.listen_host();
    let mut listeners = vec![SocketListener::bind(host, config.plain_port, Channel::Plain)?];
    if !config.encryption().tls_enabled() {
        return Ok((listeners, None));
    }
    let (Some(certificate), Some(private_key)) = (
        paths.certificate_file.as_deref(),
        paths.private_key_file.as_deref(),
    ) else {
        warn!(
            target: PROCESS_TARGET,
            "no certificate or private key configured; TLS listener disabled"
        );
        return Ok((listeners, None));
    };
    let acceptor: Box<dyn TlsAcceptor> =
        Box::new(RustlsAcceptor::from_files(certificate, private_key)?);
    listeners.push(SocketListener::bind(host, config.tls_port, Channel::Tls)?);
    Ok((listeners, Some(acceptor)))
}

fn bound_port(listeners: &[SocketListener], channel: Channel) -> Option<u16> {
    listeners
        .iter()
        .find(|listener| listener.channel() == channel)
        .map(|listener| listener.local_addr().port())
}

fn open_audit_log(config: &Config, paths: &ResolvedPaths) -> Result<Option<AuditLog>, LaunchError> {
    let Some(log_file) = paths.log_file.as_deref() else {
        info!(target: PROCESS_TARGET, "no log file configured; audit log disabled");
        return Ok(None);
    };
    let startup = LogStartup {
        archive: !config.no_log,
        rotate_existing: config.new_log_at_start,
    };
    Ok(Some(AuditLog::open(log_file, &paths.work_dir, startup)?))
}
