//! One request, one reply: the exchange the dispatcher expects.

use std::io::{Read, Write};

use warden_wire::{
    COMMAND_SEPARATOR, Correlation, FAMILY_PREFIX, Opcode, RELEASE_PROGRAM, REPLY_HEADER_LEN,
    ReplyFrame, ReplyHeader, RequestFrame, Status, Tokens, quote_token,
};

use crate::AdminClientError;
use crate::cli::AdminCommand;
use crate::transport::Endpoint;

const CORRELATION: &str = "wdnadmin";

/// Sends `frame` over a fresh connection and reads the reply.
pub(crate) fn exchange(
    endpoint: &Endpoint,
    frame: &RequestFrame,
) -> Result<ReplyFrame, AdminClientError> {
    let mut connection = endpoint.connect()?;
    let bytes = frame.encode()?;
    connection
        .write_all(&bytes)
        .and_then(|()| connection.flush())
        .map_err(AdminClientError::Exchange)?;
    let mut header = [0_u8; REPLY_HEADER_LEN];
    connection
        .read_exact(&mut header)
        .map_err(AdminClientError::Exchange)?;
    let decoded = ReplyHeader::decode(&header)?;
    let mut payload = vec![0_u8; decoded.payload_len];
    connection
        .read_exact(&mut payload)
        .map_err(AdminClientError::Exchange)?;
    Ok(ReplyFrame {
        correlation: decoded.correlation,
        status: decoded.status,
        payload,
    })
}

/// Confirms that the peer is a Warden dispatcher.
pub(crate) fn hello(endpoint: &Endpoint) -> Result<(), AdminClientError> {
    let frame = RequestFrame::new(Correlation::from_label(CORRELATION), Opcode::Hello, FAMILY_PREFIX);
    let reply = expect_ok(exchange(endpoint, &frame)?, "hello")?;
    let text = reply.payload_text();
    let release = text
        .strip_prefix(RELEASE_PROGRAM)
        .and_then(|rest| rest.strip_prefix(' '))
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()));
    match release {
        Some(_) => Ok(()),
        None => Err(AdminClientError::InvalidHello { reply: text }),
    }
}

/// Wire form and console wording of one administrative operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Operation {
    pub(crate) opcode: Opcode,
    pub(crate) payload: Vec<u8>,
    /// Used in `dispatcher failed <description> request`.
    pub(crate) description: &'static str,
    /// Printed on success; `None` for operations that print their reply.
    pub(crate) confirmation: Option<&'static str>,
}

impl Operation {
    pub(crate) fn from_command(command: &AdminCommand, password: &str) -> Self {
        let secret = quote_token(password.as_bytes());
        let (opcode, description, confirmation) = match command {
            AdminCommand::Shutdown => (
                Opcode::Shutdown,
                "shutdown",
                Some("Shutdown communicated to the dispatcher"),
            ),
            AdminCommand::Users => (Opcode::ShowUsers, "show users", None),
            AdminCommand::Newlog => (
                Opcode::NewLog,
                "create new log file",
                Some("Create new log file communicated to the dispatcher"),
            ),
            AdminCommand::Startlog => (
                Opcode::StartLog,
                "start log file",
                Some("Start log file communicated to the dispatcher"),
            ),
            AdminCommand::Stoplog => (
                Opcode::StopLog,
                "stop log file",
                Some("Stop log file communicated to the dispatcher"),
            ),
            AdminCommand::Utility { command_line } => {
                let mut payload = password.as_bytes().to_vec();
                payload.push(COMMAND_SEPARATOR);
                payload.extend_from_slice(command_line.join(" ").as_bytes());
                return Self {
                    opcode: Opcode::Command,
                    payload,
                    description: "utility",
                    confirmation: Some("Utility executed successfully on the dispatcher"),
                };
            }
        };
        Self {
            opcode,
            payload: secret,
            description,
            confirmation,
        }
    }

    pub(crate) fn frame(&self) -> RequestFrame {
        RequestFrame::new(
            Correlation::from_label(CORRELATION),
            self.opcode,
            self.payload.clone(),
        )
    }
}

/// Performs `operation` and returns the lines to print.
pub(crate) fn perform(
    endpoint: &Endpoint,
    operation: &Operation,
) -> Result<Vec<String>, AdminClientError> {
    let reply = expect_ok(exchange(endpoint, &operation.frame())?, operation.description)?;
    Ok(match operation.confirmation {
        Some(message) => vec![message.to_owned()],
        None => render_users(&reply.payload),
    })
}

/// Numbers the quoted owner labels of a `SHOWUSRS` reply.
pub(crate) fn render_users(payload: &[u8]) -> Vec<String> {
    let lines: Vec<String> = Tokens::new(payload)
        .enumerate()
        .map(|(index, owner)| {
            let owner = if owner.is_empty() {
                "<unknown>".to_owned()
            } else {
                String::from_utf8_lossy(&owner).into_owned()
            };
            format!("{}. {owner}", index + 1)
        })
        .collect();
    if lines.is_empty() {
        vec!["No users".to_owned()]
    } else {
        lines
    }
}

fn expect_ok(reply: ReplyFrame, operation: &'static str) -> Result<ReplyFrame, AdminClientError> {
    match reply.status {
        Status::Ok => Ok(reply),
        Status::Err => {
            let message = reply.payload_text();
            Err(AdminClientError::Rejected {
                operation,
                message: if message.is_empty() {
                    "reason unknown".to_owned()
                } else {
                    message
                },
            })
        }
    }
}
