//! Cursor codec.
//!
//! A cursor is the lowercase hex rendering of a [`Version`]'s 12 bytes. Byte
//! order is kept as-is, so comparing two cursors as strings gives the same
//! answer as comparing the versions they encode.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::{VERSION_LEN, Version};

/// Length of an encoded cursor in characters.
pub const CURSOR_LEN: usize = VERSION_LEN * 2;

/// Error types for cursor decoding.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CursorError {
    #[error("cursor is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("cursor decodes to {0} bytes, expected {VERSION_LEN}")]
    InvalidLength(usize),
}

/// An opaque resume token handed to clients.
///
/// Deserializing goes through [`decode`], so a `Cursor` always carries a
/// valid, lowercase encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Cursor(String);

impl Cursor {
    /// The cursor of [`Version::MIN`], returned when nothing has been read yet.
    pub fn zero() -> Self {
        encode(&Version::MIN)
    }

    /// Decode this cursor back into the version it carries.
    pub fn version(&self) -> Result<Version, CursorError> {
        decode(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cursor {
    type Error = CursorError;

    fn try_from(cursor: String) -> Result<Self, Self::Error> {
        decode(&cursor).map(|version| encode(&version))
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

impl From<Version> for Cursor {
    fn from(version: Version) -> Self {
        encode(&version)
    }
}

/// Encode a version as a 24-character lowercase hex cursor.
pub fn encode(version: &Version) -> Cursor {
    Cursor(hex::encode(version.as_bytes()))
}

/// Decode a cursor string into a version.
///
/// Upper-case hex is accepted. Anything that is not exactly 12 bytes of hex
/// is rejected.
pub fn decode(cursor: &str) -> Result<Version, CursorError> {
    let bytes = hex::decode(cursor)?;
    Version::try_from(bytes.as_slice()).map_err(|_| CursorError::InvalidLength(bytes.len()))
}
