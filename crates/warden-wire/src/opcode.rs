//! Request opcodes understood by the dispatcher.

use std::fmt;

use crate::frame::FIELD_LEN;

/// Operation requested by a frame's opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// A freshly spawned worker asks for the admission token.
    Verify,
    /// Client greeting; answered with the release identification.
    Hello,
    /// Client asks for a dedicated worker process.
    Start,
    /// Administrative shutdown of the dispatcher.
    Shutdown,
    /// Enumerates the users owning active worker slots.
    ShowUsers,
    /// Rotates the permanent audit log.
    NewLog,
    /// Resumes archival into the permanent audit log.
    StartLog,
    /// Pauses archival into the permanent audit log.
    StopLog,
    /// Runs a maintenance utility.
    Command,
}

impl Opcode {
    /// All opcodes in wire order.
    pub const ALL: [Self; 9] = [
        Self::Verify,
        Self::Hello,
        Self::Start,
        Self::Shutdown,
        Self::ShowUsers,
        Self::NewLog,
        Self::StartLog,
        Self::StopLog,
        Self::Command,
    ];

    /// Opcode name as written on the wire, without padding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "VERIFY",
            Self::Hello => "HELLO",
            Self::Start => "START",
            Self::Shutdown => "SHUTDOWN",
            Self::ShowUsers => "SHOWUSRS",
            Self::NewLog => "NEWLOG",
            Self::StartLog => "STARTLOG",
            Self::StopLog => "STOPLOG",
            Self::Command => "COMMAND",
        }
    }

    /// Space-padded 8-byte field for this opcode.
    #[must_use]
    pub fn to_field(self) -> [u8; FIELD_LEN] {
        let mut field = [b' '; FIELD_LEN];
        for (slot, byte) in field.iter_mut().zip(self.as_str().bytes()) {
            *slot = byte;
        }
        field
    }

    /// Parses an opcode field. Trailing spaces are ignored; matching is exact.
    #[must_use]
    pub fn from_field(field: &[u8]) -> Option<Self> {
        let end = field
            .iter()
            .rposition(|byte| *byte != b' ')
            .map_or(0, |index| index + 1);
        let name = field.get(..end)?;
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.as_str().as_bytes() == name)
    }

    /// Returns true for the password-gated administrative opcodes.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(
            self,
            Self::Shutdown
                | Self::ShowUsers
                | Self::NewLog
                | Self::StartLog
                | Self::StopLog
                | Self::Command
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
