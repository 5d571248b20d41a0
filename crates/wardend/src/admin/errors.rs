use thiserror::Error;

use crate::audit::AuditLogError;

/// Failures of administrative requests.
///
/// The display text is the message returned to the client.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid admin password")]
    InvalidAdminPassword,
    #[error("Invalid show password")]
    InvalidShowPassword,
    #[error("Log file not specified in CFG file")]
    LogNotConfigured,
    #[error("Unable to create/write archive log file")]
    Archive(#[source] AuditLogError),
    #[error("Unable to write archive log file")]
    ArchiveMarker(#[source] AuditLogError),
    #[error("Unable to create log file")]
    LogCreate(#[source] AuditLogError),
    #[error("Unable to write to log file")]
    LogWrite(#[source] AuditLogError),
    #[error("Please specify a command line for the -c option")]
    MissingCommandLine,
    #[error("Unknown utility or no utility arguments specified")]
    UnknownUtility,
    #[error("Utility arguments are missing")]
    MissingUtilityArguments,
    #[error(transparent)]
    Utility(#[from] UtilityError),
}

/// A maintenance utility failed or could not be started.
#[derive(Debug, Error)]
pub enum UtilityError {
    /// The utility binary could not be launched.
    #[error("Unable to start utility: {source}")]
    Launch {
        #[source]
        source: std::io::Error,
    },
    /// The utility ran and reported a failure.
    #[error("{message}")]
    Failed { message: String },
}
