use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tracing::{Level, debug, enabled};
use warden_wire::{Correlation, FIELD_LEN, REQUEST_HEADER_LEN, ReplyFrame, RequestHeader};

use super::{CodecError, PROTOCOL_TARGET};
use crate::transport::ConnectionStream;

/// Time a peer has to deliver one complete request frame.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(10);

const CHUNK_LEN: usize = 1024;

/// A decoded request: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Request {
    pub(crate) header: RequestHeader,
    pub(crate) payload: Vec<u8>,
}

/// A readable stream whose per-read timeout can be narrowed.
pub(crate) trait TimedRead: Read {
    /// Bounds the next blocking read to `timeout`, which is never zero.
    fn limit_read(&mut self, timeout: Duration) -> io::Result<()>;
}

impl TimedRead for TcpStream {
    fn limit_read(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

impl TimedRead for ConnectionStream {
    fn limit_read(&mut self, timeout: Duration) -> io::Result<()> {
        self.socket().set_read_timeout(Some(timeout))
    }
}

/// Reads one request frame, which must arrive completely within `timeout`.
///
/// Bytes are accumulated until the 40-byte header is complete, then exactly
/// the declared payload is read. Every read is bounded by the time left, so a
/// peer trickling bytes cannot hold the connection open past the deadline.
pub(crate) fn read_request<R: TimedRead>(
    stream: &mut R,
    timeout: Duration,
) -> Result<Request, CodecError> {
    let deadline = Instant::now() + timeout;
    let mut buffer = Vec::with_capacity(REQUEST_HEADER_LEN);
    fill_to(stream, &mut buffer, REQUEST_HEADER_LEN, deadline)?;
    let header = RequestHeader::decode(&buffer).map_err(|source| CodecError::Frame {
        correlation: leading_correlation(&buffer),
        source,
    })?;
    let total = REQUEST_HEADER_LEN + header.payload_len;
    fill_to(stream, &mut buffer, total, deadline)?;
    buffer.truncate(total);
    trace_frame("RECV", &buffer);
    let payload = buffer.split_off(REQUEST_HEADER_LEN);
    Ok(Request { header, payload })
}

/// Writes `reply` to the peer.
pub(crate) fn write_reply<W: Write>(stream: &mut W, reply: &ReplyFrame) -> Result<(), CodecError> {
    let bytes = reply.encode().map_err(CodecError::Encode)?;
    trace_frame("SEND", &bytes);
    stream.write_all(&bytes)?;
    stream.flush()?;
    Ok(())
}

fn leading_correlation(buffer: &[u8]) -> Correlation {
    let mut bytes = [b' '; FIELD_LEN];
    for (slot, byte) in bytes.iter_mut().zip(buffer) {
        *slot = *byte;
    }
    Correlation(bytes)
}

fn fill_to<R: TimedRead>(
    stream: &mut R,
    buffer: &mut Vec<u8>,
    wanted: usize,
    deadline: Instant,
) -> Result<(), CodecError> {
    let mut chunk = [0_u8; CHUNK_LEN];
    while buffer.len() < wanted {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CodecError::TimedOut);
        }
        stream.limit_read(remaining)?;
        let limit = (wanted - buffer.len()).min(CHUNK_LEN);
        let target = chunk.get_mut(..limit).unwrap_or_default();
        let read = read_chunk_with_retry(stream, target)?;
        if read == 0 {
            return Err(CodecError::Closed {
                received: buffer.len(),
            });
        }
        buffer.extend_from_slice(target.get(..read).unwrap_or_default());
    }
    Ok(())
}

fn read_chunk_with_retry<R: Read>(stream: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn trace_frame(direction: &str, bytes: &[u8]) {
    if enabled!(target: PROTOCOL_TARGET, Level::DEBUG) {
        debug!(
            target: PROTOCOL_TARGET,
            "{direction}: \"{}\"",
            String::from_utf8_lossy(bytes).escape_debug()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;
    use std::net::{Ipv4Addr, TcpListener};
    use std::thread;
    use warden_wire::{Correlation, FrameError, Opcode, RequestFrame, Status};

    impl TimedRead for Cursor<Vec<u8>> {
        fn limit_read(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    impl TimedRead for Trickle {
        fn limit_read(&mut self, timeout: Duration) -> io::Result<()> {
            self.limits.push(timeout);
            Ok(())
        }
    }

    /// Reader that hands out at most `step` bytes per call and injects an
    /// interruption before every read.
    struct Trickle {
        data: Vec<u8>,
        offset: usize,
        step: usize,
        interrupt: bool,
        limits: Vec<Duration>,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let end = (self.offset + self.step)
                .min(self.data.len())
                .min(self.offset + buf.len());
            let slice = &self.data[self.offset..end];
            buf[..slice.len()].copy_from_slice(slice);
            self.offset = end;
            Ok(slice.len())
        }
    }

    fn hello() -> Vec<u8> {
        RequestFrame::new(Correlation::from_label("c1"), Opcode::Hello, "WARDENX")
            .encode()
            .expect("encode request")
    }

    #[test]
    fn reassembles_fragmented_request() {
        let mut reader = Trickle {
            data: hello(),
            offset: 0,
            step: 7,
            interrupt: false,
            limits: Vec::new(),
        };
        let request = read_request(&mut reader, READ_TIMEOUT).expect("read request");
        assert_eq!(request.header.opcode(), Some(Opcode::Hello));
        assert!(!reader.limits.is_empty());
        assert!(reader.limits.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(reader.limits.iter().all(|limit| *limit <= READ_TIMEOUT));
        assert_eq!(request.header.correlation, Correlation::from_label("c1"));
        assert_eq!(request.payload, b"WARDENX");
    }

    #[test]
    fn trailing_bytes_are_not_consumed_into_payload() {
        let mut data = hello();
        data.extend_from_slice(b"garbage");
        let request = read_request(&mut Cursor::new(data), READ_TIMEOUT).expect("read request");
        assert_eq!(request.payload, b"WARDENX");
    }

    #[rstest]
    #[case(b"".to_vec(), 0)]
    #[case(hello()[..12].to_vec(), 12)]
    #[case(hello()[..43].to_vec(), 43)]
    fn early_close_is_reported(#[case] data: Vec<u8>, #[case] received: usize) {
        let error = read_request(&mut Cursor::new(data), READ_TIMEOUT).expect_err("closed");
        assert!(matches!(error, CodecError::Closed { received: got } if got == received));
    }

    #[test]
    fn oversized_length_is_malformed() {
        let mut data = hello();
        data[32..40].copy_from_slice(b"    9000");
        let error = read_request(&mut Cursor::new(data), READ_TIMEOUT).expect_err("too large");
        assert!(error.is_malformed());
        assert!(matches!(
            error,
            CodecError::Frame {
                source: FrameError::PayloadTooLarge { .. },
                ..
            }
        ));
        assert_eq!(error.correlation(), Some(Correlation::from_label("c1")));
    }

    #[test]
    fn negative_length_is_malformed() {
        let mut data = hello();
        data[32..40].copy_from_slice(b"      -1");
        let error = read_request(&mut Cursor::new(data), READ_TIMEOUT).expect_err("negative");
        assert!(error.is_malformed());
    }

    #[test]
    fn exhausted_budget_fails_before_reading() {
        let mut reader = Cursor::new(hello());
        let error = read_request(&mut reader, Duration::ZERO).expect_err("no time left");
        assert!(matches!(error, CodecError::TimedOut));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn trickling_peer_is_dropped_at_the_deadline() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        let sender = thread::spawn(move || {
            let mut client = TcpStream::connect(addr).expect("connect");
            for byte in hello() {
                if client.write_all(&[byte]).is_err() {
                    return;
                }
                thread::sleep(Duration::from_millis(50));
            }
        });
        let (mut server, _) = listener.accept().expect("accept");
        let budget = Duration::from_millis(400);
        let started = Instant::now();
        let error = read_request(&mut server, budget).expect_err("deadline passes");
        let elapsed = started.elapsed();
        assert!(matches!(error, CodecError::TimedOut), "unexpected error: {error}");
        assert!(
            elapsed < budget + Duration::from_millis(300),
            "read took {elapsed:?}"
        );
        drop(server);
        sender.join().expect("sender thread");
    }

    #[test]
    fn timeouts_map_to_timed_out() {
        let error = CodecError::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(matches!(error, CodecError::TimedOut));
        assert!(!error.is_malformed());
    }

    #[test]
    fn reply_is_written_with_header() {
        let mut sink = Vec::new();
        write_reply(
            &mut sink,
            &ReplyFrame::ok(Correlation::from_label("c1"), "WARDEN FS 101"),
        )
        .expect("write reply");
        let reply = ReplyFrame::decode(&sink).expect("decode reply");
        assert_eq!(reply.status, Status::Ok);
        assert_eq!(reply.payload_text(), "WARDEN FS 101");
    }
}
