//! Enumerated policy settings: TLS listener mode and tracing format.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Policy for the TLS listener.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EncryptionMode {
    /// Only the plain listener is opened.
    Off,
    /// Both listeners are opened.
    #[default]
    On,
    /// Both listeners are opened but plain connections are refused.
    Only,
}

impl EncryptionMode {
    /// Whether a TLS listener is opened.
    #[must_use]
    pub const fn tls_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Whether plain connections must be refused.
    #[must_use]
    pub const fn plain_refused(self) -> bool {
        matches!(self, Self::Only)
    }
}

/// Tracing output format selected by `log_format`.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per event.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
}

/// Errors encountered while parsing an [`EncryptionMode`] from text.
pub type EncryptionModeParseError = strum::ParseError;

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
