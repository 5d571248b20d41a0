//! Admission token handed to workers when they call back with `VERIFY`.
//!
//! The token is 32 random bytes drawn once at startup. Four scattered bytes
//! carry the dispatcher's own process id, four carry the id of the worker
//! being verified and four carry the verification time. Only the last two
//! groups change afterwards; the remaining 20 bytes never do.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Length of the token in bytes.
pub(crate) const TOKEN_LEN: usize = 32;

/// Offsets of the dispatcher pid, least significant byte first.
const SELF_PID_OFFSETS: [usize; 4] = [1, 6, 2, 4];
/// Offsets of the verified worker pid, least significant byte first.
const TARGET_PID_OFFSETS: [usize; 4] = [23, 18, 21, 22];
/// Offsets of the verification time, least significant byte first.
const TIME_OFFSETS: [usize; 4] = [24, 29, 30, 27];

/// The mutable admission token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VerificationToken {
    bytes: [u8; TOKEN_LEN],
}

impl VerificationToken {
    /// Draws the token from the thread-local generator.
    pub(crate) fn initialize(self_pid: u32) -> Self {
        Self::initialize_with(&mut rand::thread_rng(), self_pid)
    }

    /// Draws the token from `rng` and stamps the dispatcher pid into it.
    pub(crate) fn initialize_with<R: Rng + ?Sized>(rng: &mut R, self_pid: u32) -> Self {
        let mut bytes = [0_u8; TOKEN_LEN];
        rng.fill(&mut bytes);
        scatter(&mut bytes, SELF_PID_OFFSETS, self_pid);
        Self { bytes }
    }

    /// Stamps `target_pid` and the current time, returning the token.
    pub(crate) fn refresh(&mut self, target_pid: u32) -> [u8; TOKEN_LEN] {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        self.refresh_at(target_pid, seconds)
    }

    /// Stamps `target_pid` and the low 32 bits of `seconds`.
    pub(crate) fn refresh_at(&mut self, target_pid: u32, seconds: u64) -> [u8; TOKEN_LEN] {
        scatter(&mut self.bytes, TARGET_PID_OFFSETS, target_pid);
        scatter(&mut self.bytes, TIME_OFFSETS, low_word(seconds));
        self.bytes
    }

    #[cfg(test)]
    pub(crate) const fn bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.bytes
    }
}

fn low_word(value: u64) -> u32 {
    u32::try_from(value & u64::from(u32::MAX)).unwrap_or(u32::MAX)
}

fn scatter(bytes: &mut [u8; TOKEN_LEN], offsets: [usize; 4], value: u32) {
    for (offset, byte) in offsets.into_iter().zip(value.to_le_bytes()) {
        if let Some(slot) = bytes.get_mut(offset) {
            *slot = byte;
        }
    }
}
