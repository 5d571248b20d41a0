//! Mutable dispatcher state and the per-request state machine.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use warden_wire::{
    Correlation, FAMILY_PREFIX, Opcode, RELEASE, RELEASE_PROGRAM, ReplyFrame, Tokens,
    decode_decimal,
};

use crate::admin::{AdminCommandProcessor, LogOperation};
use crate::audit::{AuditLog, RemovalRetry};
use crate::health::HealthReporter;
use crate::protocol::{
    CodecError, INVALID_DATA, READ_TIMEOUT, Request, read_request, write_reply,
};
use crate::token::VerificationToken;
use crate::transport::ConnectionStream;
use crate::workers::{
    LivenessReaper, ProcessLauncher, SharedTable, TerminationSchedule, WorkerCommand,
    WorkerTable, lock_table, terminate_all,
};

use super::{DISPATCH_TARGET, DispatchError, DispatchSettings, SupervisorEvent};

/// Longest product subtype captured from `HELLO`.
const SUBTYPE_LEN: usize = 12;

/// Appended to the `HELLO` reply for clients outside the product family.
const MISMATCH_MARKER: &str = "MISMATCH";

/// A `START` client waiting for its worker to verify.
#[derive(Debug)]
pub(crate) struct PendingClient {
    pub(crate) stream: ConnectionStream,
    pub(crate) correlation: Correlation,
}

impl PendingClient {
    fn fail(self, error: &DispatchError) {
        send_and_close(
            self.stream,
            &ReplyFrame::err(self.correlation, error.to_string()),
        );
    }
}

/// Parsed `START` payload: `<port> [<user>] [GUI]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StartRequest {
    port: u16,
    owner: String,
    gui: bool,
}

impl StartRequest {
    fn parse(payload: &[u8]) -> Result<Self, DispatchError> {
        let mut tokens = Tokens::new(payload);
        let port = tokens
            .next()
            .and_then(|token| {
                std::str::from_utf8(&token)
                    .ok()
                    .and_then(|text| text.parse::<u16>().ok())
            })
            .ok_or(DispatchError::InvalidPort)?;
        let owner = tokens
            .next()
            .map(|token| String::from_utf8_lossy(&token).into_owned())
            .unwrap_or_default();
        let gui = tokens
            .next()
            .is_some_and(|token| token.eq_ignore_ascii_case(b"GUI"));
        Ok(Self { port, owner, gui })
    }
}

/// Result of the table transaction performed for `START`.
enum Launch {
    /// The worker started; `stream` is set when the reply is immediate.
    Started {
        pid: u32,
        stream: Option<ConnectionStream>,
    },
    Failed {
        stream: ConnectionStream,
        error: DispatchError,
    },
}

/// Owns every piece of mutable dispatcher state.
pub(crate) struct Supervisor {
    settings: DispatchSettings,
    workers: SharedTable<PendingClient>,
    died: Arc<AtomicBool>,
    reaper: LivenessReaper<PendingClient>,
    token: VerificationToken,
    log: Option<AuditLog>,
    launcher: Box<dyn ProcessLauncher>,
    admin: AdminCommandProcessor,
    reporter: Arc<dyn HealthReporter>,
    subtype: Option<String>,
    shutdown: bool,
    signal: Option<i32>,
}

impl Supervisor {
    pub(crate) fn new(
        settings: DispatchSettings,
        log: Option<AuditLog>,
        launcher: Box<dyn ProcessLauncher>,
        admin: AdminCommandProcessor,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        let workers = Arc::new(Mutex::new(WorkerTable::new(settings.max_workers)));
        let died = Arc::new(AtomicBool::new(false));
        let reaper = LivenessReaper::new(Arc::clone(&workers), Arc::clone(&died));
        Self {
            settings,
            workers,
            died,
            reaper,
            token: VerificationToken::initialize(std::process::id()),
            log,
            launcher,
            admin,
            reporter,
            subtype: None,
            shutdown: false,
            signal: None,
        }
    }

    pub(crate) const fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Reaper sharing this supervisor's table, for the polling thread.
    pub(crate) fn reaper(&self) -> LivenessReaper<PendingClient> {
        self.reaper.clone()
    }

    pub(crate) const fn shutdown_requested(&self) -> bool {
        self.shutdown
    }

    /// Applies an event posted by the signal thread.
    pub(crate) fn handle_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::ChildExited => self.reap_workers(),
            SupervisorEvent::Terminate(signal) => {
                info!(target: DISPATCH_TARGET, signal, "termination signal received");
                self.shutdown = true;
                self.signal = Some(signal);
            }
        }
    }

    /// Frees the slots of exited workers and answers their waiting clients.
    pub(crate) fn reap_workers(&mut self) {
        for worker in self.reaper.reap() {
            self.reporter
                .worker_exited(worker.slot, worker.pid, worker.orphaned);
        }
        self.reconcile_orphans();
    }

    /// Sends the startup failure to every client whose worker died first.
    ///
    /// Returns the number of clients answered.
    pub(crate) fn reconcile_orphans(&mut self) -> usize {
        if !self.died.swap(false, Ordering::SeqCst) {
            return 0;
        }
        let orphans = lock_table(&self.workers).pending_orphans();
        let count = orphans.len();
        for (slot, client) in orphans {
            warn!(
                target: DISPATCH_TARGET,
                slot = slot + 1,
                "worker exited before verifying"
            );
            client.fail(&DispatchError::WorkerDied);
        }
        count
    }

    /// Copies pending audit records to the permanent log.
    pub(crate) fn flush_log(&mut self) {
        if let Some(log) = self.log.as_mut() {
            if let Err(error) = log.flush() {
                warn!(target: DISPATCH_TARGET, error = %error, "periodic log flush failed");
            }
        }
    }

    /// Reads one request from `stream` and answers it.
    pub(crate) fn handle_connection(&mut self, mut stream: ConnectionStream, peer: SocketAddr) {
        let request = match read_request(&mut stream, READ_TIMEOUT) {
            Ok(request) => request,
            Err(error) => return reject_unreadable(stream, peer, &error),
        };
        let correlation = request.header.correlation;
        let Some(opcode) = request.header.opcode() else {
            debug!(
                target: DISPATCH_TARGET,
                %peer,
                opcode = %String::from_utf8_lossy(&request.header.opcode).trim_end(),
                "unknown opcode"
            );
            return reject(stream, correlation, &DispatchError::InvalidFunction);
        };
        debug!(target: DISPATCH_TARGET, %peer, %opcode, "request received");
        match opcode {
            Opcode::Verify => self.verify(stream, &request),
            _ if self.settings.plain_refused && !stream.is_tls() => {
                reject(stream, correlation, &DispatchError::PlainRefused);
            }
            Opcode::Start => self.start(stream, peer.ip(), correlation, &request.payload),
            Opcode::Hello => {
                let release = self.hello(&request.payload, peer);
                send_and_close(stream, &ReplyFrame::ok(correlation, release));
            }
            admin => {
                let reply = match self.administer(admin, &request.payload) {
                    Ok(payload) => {
                        self.record(
                            "admin",
                            &[("op", admin.as_str()), ("peer", &peer.ip().to_string())],
                        );
                        ReplyFrame::ok(correlation, payload)
                    }
                    Err(error) => {
                        info!(
                            target: DISPATCH_TARGET,
                            %peer,
                            opcode = %admin,
                            error = %error,
                            "administrative request refused"
                        );
                        ReplyFrame::err(correlation, error.to_string())
                    }
                };
                send_and_close(stream, &reply);
            }
        }
    }

    /// Answers the family greeting and captures the product subtype.
    ///
    /// Clients outside the family still get the release, followed by
    /// [`MISMATCH_MARKER`], and leave no subtype behind.
    fn hello(&mut self, payload: &[u8], peer: SocketAddr) -> String {
        let identification = String::from_utf8_lossy(payload);
        let identification = identification.trim_end_matches(['\0', ' ']);
        self.subtype = None;
        let release = format!("{RELEASE_PROGRAM} {RELEASE}");
        if identification.is_empty() {
            return release;
        }
        match identification.strip_prefix(FAMILY_PREFIX) {
            Some(rest) => {
                self.subtype = subtype_of(rest);
                release
            }
            None => {
                info!(
                    target: DISPATCH_TARGET,
                    %peer,
                    identification,
                    "client identification outside the product family"
                );
                format!("{release} {MISMATCH_MARKER}")
            }
        }
    }

    fn start(
        &mut self,
        stream: ConnectionStream,
        peer: IpAddr,
        correlation: Correlation,
        payload: &[u8],
    ) {
        let request = match self.admit(payload) {
            Ok(request) => request,
            Err(error) => return reject(stream, correlation, &error),
        };
        let tls = stream.is_tls();
        let mirror = self.log.as_ref().map(|log| log.mirror_path().to_path_buf());
        let (slot, stale, launch) = {
            let mut table = lock_table(&self.workers);
            let slot = table.allocate();
            let stale = table.take_pending(slot);
            let spawned = self
                .worker_command(&request, slot, peer, tls, mirror)
                .and_then(|command| {
                    self.launcher
                        .spawn(
                            &self.settings.worker_binary,
                            &command.args(),
                            &self.settings.work_dir,
                        )
                        .map_err(DispatchError::from)
                });
            let launch = match spawned {
                Ok(process) => {
                    let pid = process.pid();
                    table.occupy(slot, process, &request.owner);
                    if request.port == 0 {
                        table.set_pending(slot, PendingClient {
                            stream,
                            correlation,
                        });
                        Launch::Started { pid, stream: None }
                    } else {
                        Launch::Started {
                            pid,
                            stream: Some(stream),
                        }
                    }
                }
                Err(error) => {
                    table.free(slot);
                    Launch::Failed { stream, error }
                }
            };
            (slot, stale, launch)
        };
        if let Some(client) = stale {
            warn!(
                target: DISPATCH_TARGET,
                slot = slot + 1,
                "slot reused while a client was still waiting"
            );
            client.fail(&DispatchError::WorkerDied);
        }
        match launch {
            Launch::Started { pid, stream } => {
                info!(
                    target: DISPATCH_TARGET,
                    slot = slot + 1,
                    pid,
                    owner = %request.owner,
                    %peer,
                    deferred = stream.is_none(),
                    "worker launched"
                );
                self.record(
                    "spawn",
                    &[
                        ("slot", &(slot + 1).to_string()),
                        ("pid", &pid.to_string()),
                        ("user", &request.owner),
                    ],
                );
                self.reporter.worker_launched(slot, pid, &request.owner);
                if let Some(stream) = stream {
                    send_and_close(stream, &ReplyFrame::ok(correlation, Vec::new()));
                }
            }
            Launch::Failed { stream, error } => {
                warn!(
                    target: DISPATCH_TARGET,
                    slot = slot + 1,
                    %peer,
                    error = %error,
                    "worker launch failed"
                );
                reject(stream, correlation, &error);
            }
        }
    }

    /// Checks the `START` payload and the log health before allocating.
    fn admit(&self, payload: &[u8]) -> Result<StartRequest, DispatchError> {
        let request = StartRequest::parse(payload)?;
        if request.port == 0 && self.settings.worker_base_port.is_none() {
            return Err(DispatchError::NoWorkerRange);
        }
        if self.log.as_ref().is_some_and(|log| !log.is_healthy()) {
            return Err(DispatchError::LogUnhealthy);
        }
        Ok(request)
    }

    fn worker_command(
        &self,
        request: &StartRequest,
        slot: usize,
        peer: IpAddr,
        tls: bool,
        mirror: Option<PathBuf>,
    ) -> Result<WorkerCommand, DispatchError> {
        let assigned_port = request.port == 0;
        let port = if assigned_port {
            self.settings.worker_port(slot)?
        } else {
            request.port
        };
        Ok(WorkerCommand {
            peer,
            port,
            config_path: self.settings.worker_config.clone(),
            callback_port: self.settings.plain_port,
            slot,
            tls,
            assigned_port,
            gui: request.gui,
            subtype: self.subtype.clone(),
            mirror,
            debug_level: self.settings.debug_level,
        })
    }

    /// Hands the token to a calling worker and releases its client.
    fn verify(&mut self, stream: ConnectionStream, request: &Request) {
        let correlation = request.header.correlation;
        let index = decode_decimal(&request.header.aux)
            .ok()
            .and_then(|number| number.checked_sub(1));
        let (pid, pending) = match index {
            Some(index) => {
                let mut table = lock_table(&self.workers);
                let pid = if index < table.live_count() {
                    table.slot(index).map_or(0, |slot| slot.pid())
                } else {
                    0
                };
                (pid, table.take_pending(index).map(|client| (index, client)))
            }
            None => (0, None),
        };
        let token = self.token.refresh(pid);
        debug!(
            target: DISPATCH_TARGET,
            slot = ?index.map(|index| index + 1),
            pid,
            relayed = pending.is_some(),
            "worker verification"
        );
        send_and_close(stream, &ReplyFrame::ok(correlation, token.to_vec()));
        let Some((index, client)) = pending else {
            return;
        };
        let port = if pid == 0 {
            Err(DispatchError::WorkerDied)
        } else {
            self.settings.worker_port(index)
        };
        match port {
            Ok(port) => send_and_close(
                client.stream,
                &ReplyFrame::ok(client.correlation, port.to_string()),
            ),
            Err(error) => client.fail(&error),
        }
    }

    fn administer(&mut self, opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
        let operation = match opcode {
            Opcode::Shutdown => {
                self.admin.authorize_admin(payload)?;
                info!(target: DISPATCH_TARGET, "shutdown requested");
                self.shutdown = true;
                return Ok(Vec::new());
            }
            Opcode::ShowUsers => {
                self.admin.authorize_show(payload)?;
                self.reap_workers();
                let owners = lock_table(&self.workers).owners();
                return Ok(AdminCommandProcessor::show_users(&owners));
            }
            Opcode::Command => {
                self.admin.run_command(payload)?;
                return Ok(Vec::new());
            }
            Opcode::NewLog => LogOperation::NewLog,
            Opcode::StartLog => LogOperation::StartLog,
            Opcode::StopLog => LogOperation::StopLog,
            Opcode::Verify | Opcode::Hello | Opcode::Start => {
                return Err(DispatchError::InvalidFunction);
            }
        };
        self.admin.authorize_admin(payload)?;
        let archive = AdminCommandProcessor::log_operation(operation, self.log.as_mut())?;
        if operation == LogOperation::NewLog {
            self.reporter.log_rotated(archive.as_deref());
        }
        Ok(Vec::new())
    }

    /// Appends a dispatcher record to the audit mirror, if logging.
    fn record(&mut self, tag: &str, attributes: &[(&str, &str)]) {
        if let Some(log) = self.log.as_mut() {
            if let Err(error) = log.write_record(tag, attributes) {
                warn!(target: DISPATCH_TARGET, tag, error = %error, "audit record lost");
            }
        }
    }

    /// Closes the audit log and stops every worker.
    ///
    /// Returns the number of workers that had to be killed.
    pub(crate) fn finish(mut self, schedule: TerminationSchedule) -> usize {
        if let Some(log) = self.log.take() {
            if let Err(error) = log.close(self.signal, RemovalRetry::default()) {
                warn!(target: DISPATCH_TARGET, error = %error, "failed to close audit log");
            }
        }
        let killed = terminate_all(&self.workers, schedule);
        info!(target: DISPATCH_TARGET, killed, "dispatcher stopped");
        killed
    }
}

/// Leading alphabetic run after the family prefix, skipping one space.
fn subtype_of(rest: &str) -> Option<String> {
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    let subtype: String = rest
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .take(SUBTYPE_LEN)
        .collect();
    (!subtype.is_empty()).then_some(subtype)
}

fn reject(stream: ConnectionStream, correlation: Correlation, error: &DispatchError) {
    send_and_close(stream, &ReplyFrame::err(correlation, error.to_string()));
}

fn reject_unreadable(stream: ConnectionStream, peer: SocketAddr, error: &CodecError) {
    match error.correlation() {
        Some(correlation) => {
            warn!(target: DISPATCH_TARGET, %peer, error = %error, "invalid data received");
            send_and_close(stream, &ReplyFrame::err(correlation, INVALID_DATA));
        }
        None => {
            debug!(target: DISPATCH_TARGET, %peer, error = %error, "connection dropped");
            stream.close();
        }
    }
}

fn send_and_close(mut stream: ConnectionStream, reply: &ReplyFrame) {
    if let Err(error) = write_reply(&mut stream, reply) {
        debug!(target: DISPATCH_TARGET, error = %error, "reply not delivered");
    }
    stream.close();
}
