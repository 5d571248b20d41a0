//! Wire types shared by the Warden dispatcher and its administrative client.
//!
//! Every exchange with the dispatcher is a single request frame answered by one
//! reply frame. Both frames start with a fixed header made of 8-byte fields,
//! each either opaque bytes or space-padded ASCII:
//!
//! ```text
//! request  [0:8) correlation [8:16) aux [16:24) reserved [24:32) opcode [32:40) length | payload
//! reply    [0:8) correlation [8:16) status              [16:24) length               | payload
//! ```
//!
//! Lengths are right-aligned ASCII decimal numbers padded with spaces. The
//! crate also carries the quoted-token helpers used inside payloads so both
//! ends agree on how user names and arguments are escaped.

mod decimal;
mod errors;
mod frame;
mod opcode;
mod tokens;

pub use decimal::{decode_decimal, encode_decimal};
pub use errors::FrameError;
pub use frame::{
    Correlation, FIELD_LEN, MAX_PAYLOAD_LEN, REPLY_HEADER_LEN, REQUEST_HEADER_LEN, ReplyFrame,
    ReplyHeader, RequestFrame, RequestHeader, Status,
};
pub use opcode::Opcode;
pub use tokens::{Tokens, quote_token, quote_tokens};

/// Byte separating the password from the utility command line in `COMMAND`.
pub const COMMAND_SEPARATOR: u8 = 0x0B;

/// Program identification returned by `HELLO`.
pub const RELEASE_PROGRAM: &str = "WARDEN FS";

/// Release number returned by `HELLO`.
pub const RELEASE: &str = "101";

/// Prefix a client identification must carry to be treated as a family member.
pub const FAMILY_PREFIX: &str = "WARDEN";

/// Default port of the plain listener.
pub const DEFAULT_PLAIN_PORT: u16 = 9584;

/// Default port of the TLS listener.
pub const DEFAULT_TLS_PORT: u16 = 9585;
