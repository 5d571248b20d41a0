//! Unit tests for the administration client against a scripted dispatcher.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use insta::assert_snapshot;
use rstest::rstest;
use warden_wire::{
    Correlation, Opcode, REQUEST_HEADER_LEN, ReplyFrame, RequestHeader, quote_tokens,
};

use crate::cli::AdminCommand;
use crate::session::{Operation, render_users};
use crate::{AdminClientError, run};

/// Request as seen by the scripted dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Received {
    opcode: Option<Opcode>,
    payload: Vec<u8>,
}

/// Answers one connection per scripted reply, then stops listening.
struct ScriptedDispatcher {
    address: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedDispatcher {
    fn start(replies: Vec<ReplyFrame>) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
        let address = listener.local_addr().expect("listener address");
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handle = thread::spawn(move || {
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut header = [0_u8; REQUEST_HEADER_LEN];
                stream.read_exact(&mut header).expect("request header");
                let decoded = RequestHeader::decode(&header).expect("decode header");
                let mut payload = vec![0_u8; decoded.payload_len];
                stream.read_exact(&mut payload).expect("request payload");
                sink.lock().expect("received mutex").push(Received {
                    opcode: decoded.opcode(),
                    payload,
                });
                let bytes = ReplyFrame {
                    correlation: decoded.correlation,
                    ..reply
                }
                .encode()
                .expect("encode reply");
                stream.write_all(&bytes).expect("send reply");
            }
        });
        Self {
            address,
            received,
            handle: Some(handle),
        }
    }

    fn received(&mut self) -> Vec<Received> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("dispatcher thread");
        }
        self.received.lock().expect("received mutex").clone()
    }
}

fn hello_ok() -> ReplyFrame {
    ReplyFrame::ok(Correlation::default(), "WARDEN FS 101")
}

struct Outcome {
    code: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke(address: SocketAddr, args: &[&str]) -> Outcome {
    let port = address.port().to_string();
    let mut argv = vec!["warden-admin", "--host", "127.0.0.1", "--port", port.as_str()];
    argv.extend_from_slice(args);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run(argv, &mut stdout, &mut stderr);
    Outcome {
        code,
        stdout: String::from_utf8(stdout).expect("utf8 stdout"),
        stderr: String::from_utf8(stderr).expect("utf8 stderr"),
    }
}

#[rstest]
#[case(&["--password", "secret", "shutdown"], "Shutdown communicated to the dispatcher\n")]
#[case(&["--password", "secret", "newlog"], "Create new log file communicated to the dispatcher\n")]
#[case(&["--password", "secret", "startlog"], "Start log file communicated to the dispatcher\n")]
#[case(&["--password", "secret", "stoplog"], "Stop log file communicated to the dispatcher\n")]
fn confirmations_follow_successful_requests(#[case] args: &[&str], #[case] expected: &str) {
    let mut dispatcher = ScriptedDispatcher::start(vec![
        hello_ok(),
        ReplyFrame::ok(Correlation::default(), ""),
    ]);
    let outcome = invoke(dispatcher.address, args);
    assert_eq!(outcome.code, ExitCode::SUCCESS);
    assert_eq!(outcome.stdout, expected);
    assert!(outcome.stderr.is_empty());

    let received = dispatcher.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].opcode, Some(Opcode::Hello));
    assert_eq!(received[0].payload, b"WARDEN");
    assert_eq!(received[1].payload, b"secret");
}

#[test]
fn users_are_listed_in_order() {
    let mut dispatcher = ScriptedDispatcher::start(vec![
        hello_ok(),
        ReplyFrame::ok(
            Correlation::default(),
            quote_tokens(["alice", "", "bob smith"]),
        ),
    ]);
    let outcome = invoke(dispatcher.address, &["users"]);
    assert_eq!(outcome.code, ExitCode::SUCCESS);
    assert_snapshot!(outcome.stdout, @r"
    1. alice
    2. <unknown>
    3. bob smith
    ");
    assert_eq!(dispatcher.received()[1].opcode, Some(Opcode::ShowUsers));
}

#[test]
fn rejected_requests_report_the_dispatcher_message() {
    let mut dispatcher = ScriptedDispatcher::start(vec![
        hello_ok(),
        ReplyFrame::err(Correlation::default(), "Invalid admin password"),
    ]);
    let outcome = invoke(dispatcher.address, &["--password", "wrong", "shutdown"]);
    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stdout.is_empty());
    assert_snapshot!(
        outcome.stderr,
        @"ERROR: dispatcher failed shutdown request: Invalid admin password"
    );
    dispatcher.received();
}

#[rstest]
#[case("WARDEN FS")]
#[case("OTHER FS 101")]
#[case("WARDEN FS beta")]
fn unexpected_hello_stops_before_the_request(#[case] banner: &str) {
    let mut dispatcher =
        ScriptedDispatcher::start(vec![ReplyFrame::ok(Correlation::default(), banner)]);
    let outcome = invoke(dispatcher.address, &["--password", "secret", "shutdown"]);
    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert_eq!(
        outcome.stderr,
        format!("ERROR: invalid hello result '{banner}'\n")
    );
    assert_eq!(dispatcher.received().len(), 1);
}

#[test]
fn utility_payload_separates_password_and_command() {
    let mut dispatcher = ScriptedDispatcher::start(vec![
        hello_ok(),
        ReplyFrame::ok(Correlation::default(), ""),
    ]);
    let outcome = invoke(
        dispatcher.address,
        &["--password", "pw", "utility", "reindex", "--all"],
    );
    assert_eq!(outcome.code, ExitCode::SUCCESS);
    assert_eq!(
        outcome.stdout,
        "Utility executed successfully on the dispatcher\n"
    );
    let received = dispatcher.received();
    assert_eq!(received[1].opcode, Some(Opcode::Command));
    assert_eq!(received[1].payload, b"pw\x0breindex --all");
}

#[test]
fn refused_connection_is_reported() {
    let address = {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
        listener.local_addr().expect("listener address")
    };
    let outcome = invoke(address, &["users"]);
    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(
        outcome
            .stderr
            .starts_with(&format!("ERROR: failed to connect to 127.0.0.1:{}", address.port())),
        "unexpected stderr: {}",
        outcome.stderr
    );
}

#[test]
fn help_is_printed_to_stdout() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run(["warden-admin", "--help"], &mut stdout, &mut stderr);
    assert_eq!(code, ExitCode::SUCCESS);
    let text = String::from_utf8(stdout).expect("utf8 stdout");
    assert!(text.contains("Administration client"));
    assert!(stderr.is_empty());
}

#[test]
fn ca_file_requires_tls() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run(
        ["warden-admin", "--ca-file", "ca.pem", "users"],
        &mut stdout,
        &mut stderr,
    );
    assert_eq!(code, ExitCode::from(2));
    assert!(stdout.is_empty());
}

#[test]
fn tls_without_ca_file_is_rejected() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run(["warden-admin", "--tls", "users"], &mut stdout, &mut stderr);
    assert_eq!(code, ExitCode::FAILURE);
    assert_eq!(
        String::from_utf8(stderr).expect("utf8 stderr"),
        "ERROR: --tls requires --ca-file\n"
    );
}

#[test]
fn empty_ca_bundle_has_no_certificates() {
    let bundle = tempfile::NamedTempFile::new().expect("temp bundle");
    let error = crate::transport::Endpoint::tls("localhost", 9585, bundle.path())
        .expect_err("empty bundle must fail");
    assert!(matches!(error, AdminClientError::NoCertificates { .. }));
}

#[test]
fn empty_user_list_is_reported() {
    assert_eq!(render_users(b""), vec!["No users".to_owned()]);
}

#[test]
fn password_is_quoted_for_token_operations() {
    let operation = Operation::from_command(&AdminCommand::Users, "two words");
    assert_eq!(operation.opcode, Opcode::ShowUsers);
    assert_eq!(operation.payload, b"two\" words\"");
    assert_eq!(operation.confirmation, None);
}

#[test]
fn empty_password_is_sent_as_an_empty_token() {
    let operation = Operation::from_command(&AdminCommand::Newlog, "");
    assert_eq!(operation.payload, b"\"\"");
    assert_eq!(operation.frame().opcode, Opcode::NewLog);
}
