//! ASCII decimal fields used for lengths, ports and slot numbers.

use crate::FrameError;
use crate::frame::FIELD_LEN;

/// Encodes `value` right-aligned into an 8-byte field padded with spaces.
///
/// # Errors
///
/// Returns [`FrameError::FieldOverflow`] when the value needs more than eight
/// digits.
pub fn encode_decimal(value: usize) -> Result<[u8; FIELD_LEN], FrameError> {
    let digits = value.to_string();
    if digits.len() > FIELD_LEN {
        return Err(FrameError::FieldOverflow { value });
    }
    let mut field = [b' '; FIELD_LEN];
    let start = FIELD_LEN - digits.len();
    for (slot, digit) in field.iter_mut().skip(start).zip(digits.bytes()) {
        *slot = digit;
    }
    Ok(field)
}

/// Decodes an ASCII decimal field, ignoring any spaces.
///
/// An all-space field decodes as zero, matching what legacy peers send for
/// empty payloads.
///
/// # Errors
///
/// Returns [`FrameError::InvalidNumber`] for characters other than digits,
/// spaces and a minus sign, and [`FrameError::NegativeNumber`] when a minus
/// sign is present.
pub fn decode_decimal(field: &[u8]) -> Result<usize, FrameError> {
    let mut value: usize = 0;
    let mut negative = false;
    for byte in field {
        match byte {
            b'0'..=b'9' => {
                value = value
                    .checked_mul(10)
                    .and_then(|acc| acc.checked_add(usize::from(byte - b'0')))
                    .ok_or_else(|| invalid(field))?;
            }
            b' ' => {}
            b'-' => negative = true,
            _ => return Err(invalid(field)),
        }
    }
    if negative && value != 0 {
        return Err(FrameError::NegativeNumber {
            field: String::from_utf8_lossy(field).into_owned(),
        });
    }
    Ok(value)
}

fn invalid(field: &[u8]) -> FrameError {
    FrameError::InvalidNumber {
        field: String::from_utf8_lossy(field).into_owned(),
    }
}
