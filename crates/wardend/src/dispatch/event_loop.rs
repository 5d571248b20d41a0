//! The single-threaded accept loop.

use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{info, warn};

use crate::transport::{Channel, ConnectionStream, SocketListener, TlsAcceptor};
use crate::workers::TerminationSchedule;

use super::{DISPATCH_TARGET, Supervisor, SupervisorEvent};

/// Longest wait for an event before the listeners are polled again.
const EVENT_WAIT: Duration = Duration::from_millis(25);

/// Interval of the periodic audit log flush.
const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct PolledListener {
    listener: SocketListener,
    next_accept: Instant,
}

/// Drives the [`Supervisor`] from the listeners and the event channel.
pub(crate) struct Dispatcher {
    supervisor: Supervisor,
    listeners: Vec<PolledListener>,
    tls: Option<Box<dyn TlsAcceptor>>,
    events: Receiver<SupervisorEvent>,
}

impl Dispatcher {
    pub(crate) fn new(
        supervisor: Supervisor,
        listeners: Vec<SocketListener>,
        tls: Option<Box<dyn TlsAcceptor>>,
        events: Receiver<SupervisorEvent>,
    ) -> Self {
        let now = Instant::now();
        Self {
            supervisor,
            listeners: listeners
                .into_iter()
                .map(|listener| PolledListener {
                    listener,
                    next_accept: now,
                })
                .collect(),
            tls,
            events,
        }
    }

    /// Serves connections until shutdown is requested, then stops workers.
    ///
    /// Returns the number of workers that had to be killed.
    pub(crate) fn run(mut self, schedule: TerminationSchedule) -> usize {
        info!(
            target: DISPATCH_TARGET,
            listeners = self.listeners.len(),
            "dispatcher running"
        );
        let mut last_flush = Instant::now();
        while !self.supervisor.shutdown_requested() {
            self.drain_events();
            self.supervisor.reconcile_orphans();
            if self.supervisor.shutdown_requested() {
                break;
            }
            if last_flush.elapsed() >= FLUSH_INTERVAL {
                self.supervisor.flush_log();
                last_flush = Instant::now();
            }
            self.accept_round();
        }
        let Self {
            supervisor,
            listeners,
            ..
        } = self;
        drop(listeners);
        supervisor.finish(schedule)
    }

    fn drain_events(&mut self) {
        let first = match self.events.recv_timeout(EVENT_WAIT) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(EVENT_WAIT);
                None
            }
        };
        for event in first.into_iter().chain(self.events.try_iter()) {
            self.supervisor.handle_event(event);
        }
    }

    /// Accepts at most one connection per listener.
    fn accept_round(&mut self) {
        let delay = self.supervisor.settings().new_connection_delay;
        for polled in &mut self.listeners {
            if self.supervisor.shutdown_requested() {
                return;
            }
            if Instant::now() < polled.next_accept {
                continue;
            }
            let Some((socket, peer)) = polled.listener.try_accept() else {
                continue;
            };
            polled.next_accept = Instant::now() + delay;
            let channel = polled.listener.channel();
            if let Some(stream) = open_stream(self.tls.as_deref(), channel, socket, peer) {
                self.supervisor.handle_connection(stream, peer);
            }
        }
    }
}

fn open_stream(
    tls: Option<&dyn TlsAcceptor>,
    channel: Channel,
    socket: TcpStream,
    peer: SocketAddr,
) -> Option<ConnectionStream> {
    match channel {
        Channel::Plain => Some(ConnectionStream::Plain(socket)),
        Channel::Tls => {
            let Some(acceptor) = tls else {
                warn!(target: DISPATCH_TARGET, %peer, "TLS connection without an acceptor");
                return None;
            };
            match acceptor.accept(socket) {
                Ok(stream) => Some(stream),
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, %peer, error = %error, "TLS handshake failed");
                    None
                }
            }
        }
    }
}
