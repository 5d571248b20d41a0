use std::path::{Path, PathBuf};

use tracing::{info, warn};
use warden_wire::{COMMAND_SEPARATOR, Tokens, quote_tokens};

use crate::audit::{AuditLog, AuditLogError};

use super::{ADMIN_TARGET, AdminError, Utility, UtilityRunner};

/// Audit log control requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogOperation {
    /// Archive the current log and start a new one.
    NewLog,
    /// Resume archival.
    StartLog,
    /// Pause archival.
    StopLog,
}

/// Authenticates and executes administrative requests.
pub(crate) struct AdminCommandProcessor {
    admin_password: String,
    show_password: String,
    work_dir: Option<PathBuf>,
    runner: Box<dyn UtilityRunner>,
}

impl AdminCommandProcessor {
    pub(crate) fn new(
        admin_password: &str,
        show_password: &str,
        work_dir: Option<PathBuf>,
        runner: Box<dyn UtilityRunner>,
    ) -> Self {
        Self {
            admin_password: admin_password.to_owned(),
            show_password: show_password.to_owned(),
            work_dir,
            runner,
        }
    }

    /// Checks the admin password carried as the first payload token.
    pub(crate) fn authorize_admin(&self, payload: &[u8]) -> Result<(), AdminError> {
        if password_matches(&self.admin_password, first_token(payload).as_slice()) {
            Ok(())
        } else {
            Err(AdminError::InvalidAdminPassword)
        }
    }

    /// Checks the show password carried as the first payload token.
    pub(crate) fn authorize_show(&self, payload: &[u8]) -> Result<(), AdminError> {
        if password_matches(&self.show_password, first_token(payload).as_slice()) {
            Ok(())
        } else {
            Err(AdminError::InvalidShowPassword)
        }
    }

    /// Packs owner labels as quoted tokens separated by single spaces.
    pub(crate) fn show_users(owners: &[String]) -> Vec<u8> {
        quote_tokens(owners)
    }

    /// Applies a log control request.
    ///
    /// Returns the archive path when `NEWLOG` moved an existing log aside.
    pub(crate) fn log_operation(
        operation: LogOperation,
        log: Option<&mut AuditLog>,
    ) -> Result<Option<PathBuf>, AdminError> {
        let log = log.ok_or(AdminError::LogNotConfigured)?;
        let outcome = match operation {
            LogOperation::NewLog => log.rotate().map_err(open_failure),
            LogOperation::StartLog => log.start().map(|()| None).map_err(open_failure),
            LogOperation::StopLog => log.stop().map(|()| None).map_err(|error| match error {
                AuditLogError::Marker { .. } => AdminError::ArchiveMarker(error),
                other => AdminError::Archive(other),
            }),
        };
        match &outcome {
            Ok(archive) => info!(
                target: ADMIN_TARGET,
                ?operation,
                archive = ?archive,
                "log operation applied"
            ),
            Err(error) => warn!(
                target: ADMIN_TARGET,
                ?operation,
                error = %error,
                cause = ?std::error::Error::source(error).map(ToString::to_string),
                "log operation failed"
            ),
        }
        outcome
    }

    /// Authenticates and runs a `COMMAND` request.
    ///
    /// The payload is `<password> 0x0B <utility> <arguments>`. Without a
    /// separator the whole payload is the command line, which is only accepted
    /// when no admin password is configured.
    pub(crate) fn run_command(&self, payload: &[u8]) -> Result<(), AdminError> {
        let payload = trim_leading_spaces(payload);
        if payload.is_empty() {
            return Err(AdminError::MissingCommandLine);
        }
        let command_line =
            match payload.iter().position(|byte| *byte == COMMAND_SEPARATOR) {
                Some(index) => {
                    let (password, rest) = payload.split_at(index);
                    if !password_matches(&self.admin_password, password) {
                        return Err(AdminError::InvalidAdminPassword);
                    }
                    rest.get(1..).unwrap_or_default()
                }
                None if self.admin_password.is_empty() => payload,
                None => return Err(AdminError::InvalidAdminPassword),
            };
        let command_line = String::from_utf8_lossy(command_line);
        let (utility, arguments) = Utility::parse(&command_line)?;
        let mut arguments = arguments.to_owned();
        if utility.needs_work_dir() {
            arguments.push_str(" -w=");
            arguments.push_str(&self.working_dir().display().to_string());
        }
        self.runner
            .run(utility, &arguments, self.working_dir())
            .map_err(AdminError::from)
    }

    fn working_dir(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or_else(|| Path::new("."))
    }
}

fn open_failure(error: AuditLogError) -> AdminError {
    match error {
        AuditLogError::Open { .. } => AdminError::LogCreate(error),
        AuditLogError::Marker { .. } => AdminError::LogWrite(error),
        other => AdminError::Archive(other),
    }
}

fn first_token(payload: &[u8]) -> Vec<u8> {
    Tokens::new(payload).next().unwrap_or_default()
}

fn trim_leading_spaces(payload: &[u8]) -> &[u8] {
    let skip = payload.iter().take_while(|byte| **byte == b' ').count();
    payload.get(skip..).unwrap_or_default()
}

/// Case-insensitive comparison; an empty configured password accepts anything.
fn password_matches(expected: &str, supplied: &[u8]) -> bool {
    expected.is_empty() || expected.as_bytes().eq_ignore_ascii_case(supplied)
}
