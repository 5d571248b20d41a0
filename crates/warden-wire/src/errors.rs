//! Errors raised while encoding or decoding frames.

use thiserror::Error;

/// Failures surfaced by the frame codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes were supplied than the header requires.
    #[error("frame header needs {expected} bytes but only {actual} were supplied")]
    ShortHeader {
        /// Header length for the frame kind.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },
    /// A numeric field contained characters other than digits and spaces.
    #[error("numeric field {field:?} is not an ASCII decimal")]
    InvalidNumber {
        /// Raw field contents rendered lossily.
        field: String,
    },
    /// A numeric field held a negative value.
    #[error("numeric field {field:?} is negative")]
    NegativeNumber {
        /// Raw field contents rendered lossily.
        field: String,
    },
    /// The declared payload length exceeds the permitted maximum.
    #[error("payload length {length} exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Declared length.
        length: usize,
        /// Maximum accepted length.
        limit: usize,
    },
    /// A value does not fit into an 8-character decimal field.
    #[error("value {value} does not fit into an 8 character field")]
    FieldOverflow {
        /// Value that was being encoded.
        value: usize,
    },
    /// The reply status field is neither `OK` nor `ERR`.
    #[error("unknown reply status {status:?}")]
    UnknownStatus {
        /// Raw status rendered lossily.
        status: String,
    },
    /// The frame ended before the declared payload was complete.
    #[error("payload truncated: expected {expected} bytes, found {actual}")]
    TruncatedPayload {
        /// Declared payload length.
        expected: usize,
        /// Bytes present after the header.
        actual: usize,
    },
}
