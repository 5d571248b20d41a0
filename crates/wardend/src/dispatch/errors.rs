//! Request failures reported to clients.
//!
//! The `Display` text of every variant is the message carried by the `ERR`
//! reply, so wording changes are visible to clients.

use thiserror::Error;

use crate::admin::AdminError;
use crate::workers::SpawnError;

/// Errors surfaced while handling a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The opcode field named no known operation.
    #[error("Invalid function")]
    InvalidFunction,

    /// A plain connection arrived while only TLS is accepted.
    #[error("Non-encrypted connections not supported")]
    PlainRefused,

    /// The `START` port token was missing, negative or not a number.
    #[error("Invalid port number")]
    InvalidPort,

    /// `START` asked for an assigned port but no worker range is configured.
    #[error("Client port number specified as zero, but \"worker_base_port\" not defined")]
    NoWorkerRange,

    /// The assigned port coincides with one of the dispatcher's listeners.
    #[error("Assigned worker port {port} is a dispatcher listening port")]
    PortCollision {
        /// Port computed for the slot.
        port: u16,
    },

    /// The worker range ran past the largest port number.
    #[error("No worker port available for slot {slot}")]
    PortExhausted {
        /// One-based slot number.
        slot: usize,
    },

    /// The audit log cannot accept records from a new worker.
    #[error("Operational problems with log file")]
    LogUnhealthy,

    /// The worker process could not be started.
    #[error("Unable to start server sub-process: {0}")]
    Spawn(#[from] SpawnError),

    /// The worker exited before confirming its startup.
    #[error("Server sub-process terminated during startup")]
    WorkerDied,

    /// An administrative request failed.
    #[error(transparent)]
    Admin(#[from] AdminError),
}
