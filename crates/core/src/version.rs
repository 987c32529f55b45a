//! Store-assigned record versions.
//!
//! A version is a 12-byte identifier laid out big-endian as
//! `seconds (4) | discriminator (5) | counter (3)`, so byte order and
//! chronological order agree. Only the cursor codec and the store backends
//! look at its width; the relay treats it as an opaque ordered value.

use chrono::Utc;
use parking_lot::Mutex;

/// Width of a version in bytes.
pub const VERSION_LEN: usize = 12;

const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Error types for version construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version length: {0}")]
    InvalidLength(usize),

    #[error("Version space exhausted")]
    Exhausted,
}

/// A globally unique, totally ordered record identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version([u8; VERSION_LEN]);

impl Version {
    /// The lowest possible version. Never assigned to a record.
    pub const MIN: Version = Version([0; VERSION_LEN]);

    pub const fn from_bytes(bytes: [u8; VERSION_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VERSION_LEN] {
        &self.0
    }

    /// Seconds since the Unix epoch encoded in the high bytes.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// The next version in big-endian byte order, or `None` at the top of the range.
    pub fn checked_successor(&self) -> Option<Version> {
        let mut bytes = self.0;
        for byte in bytes.iter_mut().rev() {
            let (next, overflow) = byte.overflowing_add(1);
            *byte = next;
            if !overflow {
                return Some(Version(bytes));
            }
        }
        None
    }

    fn compose(seconds: u32, discriminator: &[u8; 5], counter: u32) -> Self {
        let mut bytes = [0u8; VERSION_LEN];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(discriminator);
        bytes[9..12].copy_from_slice(&(counter & COUNTER_MASK).to_be_bytes()[1..]);
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Version {
    type Error = VersionError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; VERSION_LEN] = bytes
            .try_into()
            .map_err(|_| VersionError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

#[derive(Debug)]
struct GeneratorState {
    counter: u32,
    last: Version,
}

/// Produces strictly increasing versions.
///
/// The discriminator is drawn once per generator so two processes writing to
/// the same backend do not collide within the same second. Every value
/// returned is greater than any value previously returned or passed to
/// [`VersionGenerator::observe`].
#[derive(Debug)]
pub struct VersionGenerator {
    discriminator: [u8; 5],
    state: Mutex<GeneratorState>,
}

impl VersionGenerator {
    pub fn new() -> Self {
        Self {
            discriminator: rand::random(),
            state: Mutex::new(GeneratorState {
                counter: rand::random::<u32>() & COUNTER_MASK,
                last: Version::MIN,
            }),
        }
    }

    /// Generate the next version from the wall clock.
    pub fn generate(&self) -> Result<Version, VersionError> {
        let seconds = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        self.generate_at(seconds)
    }

    /// Raise the floor so the next generated version exceeds `version`.
    pub fn observe(&self, version: Version) {
        let mut state = self.state.lock();
        if version > state.last {
            state.last = version;
        }
    }

    fn generate_at(&self, seconds: u32) -> Result<Version, VersionError> {
        let mut state = self.state.lock();
        state.counter = (state.counter + 1) & COUNTER_MASK;

        let candidate = Version::compose(seconds, &self.discriminator, state.counter);
        let version = if candidate > state.last {
            candidate
        } else {
            // Clock stalled, went backwards, or the counter wrapped.
            state
                .last
                .checked_successor()
                .ok_or(VersionError::Exhausted)?
        };

        state.last = version;
        Ok(version)
    }
}

impl Default for VersionGenerator {
    fn default() -> Self {
        Self::new()
    }
}
