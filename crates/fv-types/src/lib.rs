#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fixed addressing unit for extent reports and raw device offsets.
pub const SECTOR_SIZE: u64 = 512;

/// Physical sector index on a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectorNumber(pub u64);

impl SectorNumber {
    /// Convert to an absolute byte offset, returning `None` on overflow.
    #[must_use]
    pub fn to_byte_offset(self) -> Option<ByteOffset> {
        self.0.checked_mul(SECTOR_SIZE).map(ByteOffset)
    }
}

/// Byte offset on a `ByteDevice` (pread semantics).
///
/// This is a unit-carrying wrapper to prevent mixing bytes and sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteOffset(pub u64);

impl ByteOffset {
    pub const ZERO: Self = Self(0);

    /// Add a byte count, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }

    /// Subtract a byte count, returning `None` on underflow.
    #[must_use]
    pub fn checked_sub(self, bytes: u64) -> Option<Self> {
        self.0.checked_sub(bytes).map(Self)
    }
}

/// A contiguous run of physical sectors allocated to a file.
///
/// Invariant: `length > 0` and `start + length` does not overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub start: u64,
    pub length: u64,
}

impl Extent {
    /// Create an extent of `length` sectors starting at sector `start`.
    pub fn new(start: u64, length: u64) -> Result<Self, ParseError> {
        if length == 0 {
            return Err(ParseError::InvalidField {
                field: "length",
                reason: "extent length must be non-zero",
            });
        }
        if start.checked_add(length).is_none() {
            return Err(ParseError::IntegerConversion {
                field: "start + length",
            });
        }
        Ok(Self { start, length })
    }

    /// Exclusive end sector.
    #[must_use]
    pub fn end(self) -> u64 {
        self.start + self.length
    }

    #[must_use]
    pub fn start_sector(self) -> SectorNumber {
        SectorNumber(self.start)
    }

    /// `self` ends exactly where `next` begins.
    #[must_use]
    pub fn directly_precedes(self, next: Self) -> bool {
        self.end() == next.start
    }

    /// Byte offset and byte length of the physical span, `None` on overflow.
    #[must_use]
    pub fn byte_span(self) -> Option<(ByteOffset, u64)> {
        let offset = self.start_sector().to_byte_offset()?;
        let len = self.length.checked_mul(SECTOR_SIZE)?;
        offset.checked_add(len)?;
        Some((offset, len))
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.length)
    }
}

/// Sector extent of the partition that contains the filesystem under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionBounds {
    pub size_sectors: u64,
}

impl PartitionBounds {
    pub fn new(size_sectors: u64) -> Result<Self, ParseError> {
        if size_sectors == 0 {
            return Err(ParseError::InvalidField {
                field: "size_sectors",
                reason: "partition size must be non-zero",
            });
        }
        Ok(Self { size_sectors })
    }
}

/// Which end of the logical file a reconstruction starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadDirection {
    FromStart,
    FromEnd,
}

impl fmt::Display for ReadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromStart => write!(f, "from_start"),
            Self::FromEnd => write!(f, "from_end"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("integer conversion failed: {field}")]
    IntegerConversion { field: &'static str },
    #[error("invalid number {text:?} for {field}")]
    InvalidNumber { field: &'static str, text: String },
}

impl fmt::Display for SectorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
