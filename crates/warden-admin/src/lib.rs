//! Administration client for the Warden dispatcher.
//!
//! Each invocation confirms with `HELLO` that the peer is a Warden
//! dispatcher, then sends exactly one administrative request and reports the
//! outcome. Connections are opened per request because the dispatcher closes
//! them after replying.

mod cli;
mod errors;
mod session;
mod transport;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use crate::cli::Cli;
use crate::session::Operation;
use crate::transport::Endpoint;

pub use errors::AdminClientError;

/// Parses `args`, performs the requested operation and reports on the
/// supplied streams.
///
/// Help and version requests print to `stdout` and succeed. Every other
/// failure is written to `stderr` as `ERROR: <message>`.
pub fn run<I, T, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    match execute(&cli) {
        Ok(lines) => {
            for line in lines {
                if writeln!(stdout, "{line}").is_err() {
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            let _ = writeln!(stderr, "ERROR: {error}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<Vec<String>, AdminClientError> {
    let endpoint = endpoint(cli)?;
    session::hello(&endpoint)?;
    let operation = Operation::from_command(&cli.command, &cli.password);
    session::perform(&endpoint, &operation)
}

fn endpoint(cli: &Cli) -> Result<Endpoint, AdminClientError> {
    if !cli.tls {
        return Ok(Endpoint::plain(cli.host.clone(), cli.port()));
    }
    let ca_file = cli
        .ca_file
        .as_deref()
        .ok_or(AdminClientError::MissingCaFile)?;
    Endpoint::tls(cli.host.clone(), cli.port(), ca_file)
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{}", error.render());
            ExitCode::SUCCESS
        }
        _ => {
            let _ = write!(stderr, "{}", error.render());
            ExitCode::from(2)
        }
    }
}
