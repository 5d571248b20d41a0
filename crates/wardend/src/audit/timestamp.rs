//! Sixteen-digit audit timestamps, `YYYYMMDDHHMMSSCC` in UTC.

use time::OffsetDateTime;
use time::macros::format_description;

/// Number of characters in an audit timestamp.
pub(crate) const TIMESTAMP_LEN: usize = 16;

/// Formats `moment` as year, month, day, hour, minute, second and hundredths.
pub(crate) fn format_timestamp(moment: OffsetDateTime) -> Result<String, time::error::Format> {
    moment.format(format_description!(
        "[year][month][day][hour][minute][second][subsecond digits:2]"
    ))
}

/// Timestamp for the current instant.
pub(crate) fn now() -> Result<String, time::error::Format> {
    format_timestamp(OffsetDateTime::now_utc())
}
