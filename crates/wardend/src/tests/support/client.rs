//! Minimal request client speaking the dispatcher wire format.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use warden_wire::{Correlation, Opcode, ReplyFrame, RequestFrame};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends one request and returns the connection without reading the reply.
pub fn submit(addr: SocketAddr, frame: &RequestFrame) -> TcpStream {
    let mut stream = TcpStream::connect(addr).expect("connect to dispatcher");
    stream
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .expect("read timeout");
    stream
        .write_all(&frame.encode().expect("encode request"))
        .expect("send request");
    stream
}

/// Reads the single reply the dispatcher sends before closing.
pub fn read_reply(mut stream: TcpStream) -> ReplyFrame {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).expect("read reply");
    ReplyFrame::decode(&bytes).expect("decode reply")
}

pub fn call(addr: SocketAddr, opcode: Opcode, payload: &str) -> ReplyFrame {
    let frame = RequestFrame::new(Correlation::from_label("bdd"), opcode, payload);
    read_reply(submit(addr, &frame))
}
