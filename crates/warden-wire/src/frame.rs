//! Request and reply frames with their fixed headers.

use std::fmt;

use crate::decimal::{decode_decimal, encode_decimal};
use crate::{FrameError, Opcode};

/// Width of every header field.
pub const FIELD_LEN: usize = 8;

/// Length of a request header: five 8-byte fields.
pub const REQUEST_HEADER_LEN: usize = 5 * FIELD_LEN;

/// Length of a reply header: three 8-byte fields.
pub const REPLY_HEADER_LEN: usize = 3 * FIELD_LEN;

/// Largest payload accepted in a request frame.
pub const MAX_PAYLOAD_LEN: usize = 8192 - (REQUEST_HEADER_LEN + 1);

const AUX_OFFSET: usize = FIELD_LEN;
const RESERVED_OFFSET: usize = 2 * FIELD_LEN;
const OPCODE_OFFSET: usize = 3 * FIELD_LEN;
const REQUEST_LENGTH_OFFSET: usize = 4 * FIELD_LEN;
const STATUS_OFFSET: usize = FIELD_LEN;
const REPLY_LENGTH_OFFSET: usize = 2 * FIELD_LEN;

const STATUS_OK: &[u8; FIELD_LEN] = b"OK      ";
const STATUS_ERR: &[u8; FIELD_LEN] = b"ERR99999";

/// Opaque 8-byte value a client uses to match replies to requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Correlation(pub [u8; FIELD_LEN]);

impl Correlation {
    /// Builds a correlation from a short ASCII label, space padded.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let mut bytes = [b' '; FIELD_LEN];
        for (slot, byte) in bytes.iter_mut().zip(label.bytes()) {
            *slot = byte;
        }
        Self(bytes)
    }
}

/// Reply status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The operation failed; the payload carries a message.
    Err,
}

impl Status {
    const fn field(self) -> &'static [u8; FIELD_LEN] {
        match self {
            Self::Ok => STATUS_OK,
            Self::Err => STATUS_ERR,
        }
    }

    fn from_field(field: &[u8]) -> Result<Self, FrameError> {
        if field == STATUS_OK {
            Ok(Self::Ok)
        } else if field.starts_with(b"ERR") {
            Ok(Self::Err)
        } else {
            Err(FrameError::UnknownStatus {
                status: String::from_utf8_lossy(field).into_owned(),
            })
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => formatter.write_str("OK"),
            Self::Err => formatter.write_str("ERR"),
        }
    }
}

/// Decoded 40-byte request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Client correlation value, echoed in the reply.
    pub correlation: Correlation,
    /// Opcode-specific auxiliary field (the slot number for `VERIFY`).
    pub aux: [u8; FIELD_LEN],
    /// Raw opcode field; see [`RequestHeader::opcode`].
    pub opcode: [u8; FIELD_LEN],
    /// Declared payload length.
    pub payload_len: usize,
}

impl RequestHeader {
    /// Decodes the header from the first 40 bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails when fewer than 40 bytes are supplied, the length field is not a
    /// non-negative decimal, or it exceeds [`MAX_PAYLOAD_LEN`].
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = bytes
            .get(..REQUEST_HEADER_LEN)
            .ok_or(FrameError::ShortHeader {
                expected: REQUEST_HEADER_LEN,
                actual: bytes.len(),
            })?;
        let payload_len = decode_decimal(field_at(header, REQUEST_LENGTH_OFFSET))?;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge {
                length: payload_len,
                limit: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            correlation: Correlation(array_at(header, 0)),
            aux: array_at(header, AUX_OFFSET),
            opcode: array_at(header, OPCODE_OFFSET),
            payload_len,
        })
    }

    /// Parsed opcode, or `None` for names the dispatcher does not know.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_field(&self.opcode)
    }
}

/// Request frame as sent by clients, workers and the admin tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Correlation value echoed by the dispatcher.
    pub correlation: Correlation,
    /// Auxiliary field.
    pub aux: [u8; FIELD_LEN],
    /// Requested operation.
    pub opcode: Opcode,
    /// Opcode-specific payload.
    pub payload: Vec<u8>,
}

impl RequestFrame {
    /// Builds a request with an all-space auxiliary field.
    #[must_use]
    pub fn new(correlation: Correlation, opcode: Opcode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            correlation,
            aux: [b' '; FIELD_LEN],
            opcode,
            payload: payload.into(),
        }
    }

    /// Replaces the auxiliary field.
    #[must_use]
    pub const fn with_aux(mut self, aux: [u8; FIELD_LEN]) -> Self {
        self.aux = aux;
        self
    }

    /// Serialises header and payload.
    ///
    /// # Errors
    ///
    /// Fails when the payload exceeds [`MAX_PAYLOAD_LEN`].
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge {
                length: self.payload.len(),
                limit: MAX_PAYLOAD_LEN,
            });
        }
        let mut bytes = Vec::with_capacity(REQUEST_HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&self.correlation.0);
        bytes.extend_from_slice(&self.aux);
        bytes.extend_from_slice(&[b' '; FIELD_LEN]);
        bytes.extend_from_slice(&self.opcode.to_field());
        bytes.extend_from_slice(&encode_decimal(self.payload.len())?);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }
}

/// Decoded 24-byte reply header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    /// Correlation echoed from the request.
    pub correlation: Correlation,
    /// Outcome of the request.
    pub status: Status,
    /// Declared payload length.
    pub payload_len: usize,
}

impl ReplyHeader {
    /// Decodes the header from the first 24 bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails on short input, an unknown status word or a malformed length.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = bytes
            .get(..REPLY_HEADER_LEN)
            .ok_or(FrameError::ShortHeader {
                expected: REPLY_HEADER_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self {
            correlation: Correlation(array_at(header, 0)),
            status: Status::from_field(field_at(header, STATUS_OFFSET))?,
            payload_len: decode_decimal(field_at(header, REPLY_LENGTH_OFFSET))?,
        })
    }
}

/// Reply frame sent by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    /// Correlation echoed from the request.
    pub correlation: Correlation,
    /// Outcome of the request.
    pub status: Status,
    /// Reply payload: data on success, a message on failure.
    pub payload: Vec<u8>,
}

impl ReplyFrame {
    /// Successful reply carrying `payload`.
    #[must_use]
    pub fn ok(correlation: Correlation, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            correlation,
            status: Status::Ok,
            payload: payload.into(),
        }
    }

    /// Failure reply carrying a human-readable message.
    #[must_use]
    pub fn err(correlation: Correlation, message: impl Into<String>) -> Self {
        Self {
            correlation,
            status: Status::Err,
            payload: message.into().into_bytes(),
        }
    }

    /// Serialises header and payload.
    ///
    /// # Errors
    ///
    /// Fails when the payload length does not fit into the length field.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut bytes = Vec::with_capacity(REPLY_HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&self.correlation.0);
        bytes.extend_from_slice(self.status.field());
        bytes.extend_from_slice(&encode_decimal(self.payload.len())?);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    /// Decodes a complete reply frame.
    ///
    /// # Errors
    ///
    /// Fails when the header is malformed or the payload is shorter than
    /// declared.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = ReplyHeader::decode(bytes)?;
        let body = bytes.get(REPLY_HEADER_LEN..).unwrap_or_default();
        let payload = body
            .get(..header.payload_len)
            .ok_or(FrameError::TruncatedPayload {
                expected: header.payload_len,
                actual: body.len(),
            })?;
        Ok(Self {
            correlation: header.correlation,
            status: header.status,
            payload: payload.to_vec(),
        })
    }

    /// Payload rendered as text, replacing invalid UTF-8.
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

fn field_at(header: &[u8], offset: usize) -> &[u8] {
    header.get(offset..offset + FIELD_LEN).unwrap_or_default()
}

fn array_at(header: &[u8], offset: usize) -> [u8; FIELD_LEN] {
    let mut field = [b' '; FIELD_LEN];
    field.copy_from_slice(field_at(header, offset));
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn request_header_layout_matches_offsets() {
        let frame = RequestFrame::new(Correlation(*b"ABCDEFGH"), Opcode::Hello, b"WARDENFOO".to_vec())
            .with_aux(*b"       3");
        let bytes = frame.encode().expect("encode request");
        assert_eq!(&bytes[0..8], b"ABCDEFGH");
        assert_eq!(&bytes[8..16], b"       3");
        assert_eq!(&bytes[16..24], b"        ");
        assert_eq!(&bytes[24..32], b"HELLO   ");
        assert_eq!(&bytes[32..40], b"       9");
        assert_eq!(&bytes[40..], b"WARDENFOO");

        let header = RequestHeader::decode(&bytes).expect("decode request header");
        assert_eq!(header.correlation, frame.correlation);
        assert_eq!(header.aux, *b"       3");
        assert_eq!(header.opcode(), Some(Opcode::Hello));
        assert_eq!(header.payload_len, 9);
    }

    #[test]
    fn reply_header_layout_matches_offsets() {
        let reply = ReplyFrame::ok(Correlation(*b"12345678"), b"       0".to_vec());
        let bytes = reply.encode().expect("encode reply");
        assert_eq!(&bytes[..24], b"12345678OK             8");
        assert_eq!(ReplyFrame::decode(&bytes).expect("decode reply"), reply);
    }

    #[test]
    fn error_reply_uses_fixed_status_word() {
        let reply = ReplyFrame::err(Correlation::default(), "Invalid function");
        let bytes = reply.encode().expect("encode reply");
        assert_eq!(&bytes[8..16], b"ERR99999");
        let decoded = ReplyFrame::decode(&bytes).expect("decode reply");
        assert_eq!(decoded.status, Status::Err);
        assert_eq!(decoded.payload_text(), "Invalid function");
    }

    #[rstest]
    #[case(b"    8152".as_slice(), true)]
    #[case(b"    8151".as_slice(), false)]
    fn request_length_is_bounded(#[case] length: &[u8], #[case] rejected: bool) {
        let mut bytes = vec![b' '; REQUEST_HEADER_LEN];
        bytes[24..32].copy_from_slice(b"START   ");
        bytes[32..40].copy_from_slice(length);
        let result = RequestHeader::decode(&bytes);
        assert_eq!(result.is_err(), rejected, "unexpected outcome: {result:?}");
    }

    #[test]
    fn short_input_is_reported() {
        let error = RequestHeader::decode(&[b' '; 39]).expect_err("short header");
        assert_eq!(
            error,
            FrameError::ShortHeader {
                expected: REQUEST_HEADER_LEN,
                actual: 39
            }
        );
    }

    #[test]
    fn truncated_reply_payload_is_reported() {
        let mut bytes = ReplyFrame::ok(Correlation::default(), b"abcdef".to_vec())
            .encode()
            .expect("encode reply");
        bytes.truncate(REPLY_HEADER_LEN + 2);
        let error = ReplyFrame::decode(&bytes).expect_err("truncated payload");
        assert!(matches!(error, FrameError::TruncatedPayload { expected: 6, actual: 2 }));
    }
}
