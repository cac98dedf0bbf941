//! Comparison of independently captured file bytes against the bytes
//! reconstructed from the raw device.

use fv_extent::BoundsCheck;
use serde::{Deserialize, Serialize};

/// Head and tail of a file, read through the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedBytes {
    pub head: Vec<u8>,
    pub tail: Vec<u8>,
}

impl ExpectedBytes {
    /// `head ++ tail`, the layout the reconstruction is compared against.
    #[must_use]
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.head.len() + self.tail.len());
        out.extend_from_slice(&self.head);
        out.extend_from_slice(&self.tail);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMismatch {
    pub expected_hex: String,
    pub actual_hex: String,
    /// First differing byte index; equals the shorter length when one side
    /// is a prefix of the other.
    pub first_difference: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsViolation {
    pub max_end: u64,
    pub size_sectors: u64,
}

/// Per-sub-check verification result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_mismatch: Option<ContentMismatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds_violation: Option<BoundsViolation>,
}

impl Verdict {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.content_mismatch.is_none() && self.bounds_violation.is_none()
    }

    #[must_use]
    pub fn bounds_only(bounds: &BoundsCheck) -> Self {
        Self {
            content_mismatch: None,
            bounds_violation: bounds_violation(bounds),
        }
    }
}

fn bounds_violation(bounds: &BoundsCheck) -> Option<BoundsViolation> {
    (!bounds.holds()).then_some(BoundsViolation {
        max_end: bounds.max_end,
        size_sectors: bounds.size_sectors,
    })
}

/// Compare `reconstructed` with `expected.head ++ expected.tail` and fold in
/// the bounds result. Both sub-checks are always evaluated.
#[must_use]
pub fn verify_content(
    expected: &ExpectedBytes,
    reconstructed: &[u8],
    bounds: &BoundsCheck,
) -> Verdict {
    let expected = expected.concat();
    let content_mismatch = (expected != reconstructed).then(|| ContentMismatch {
        expected_hex: hex::encode(&expected),
        actual_hex: hex::encode(reconstructed),
        first_difference: expected
            .iter()
            .zip(reconstructed)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| expected.len().min(reconstructed.len())),
    });

    Verdict {
        content_mismatch,
        bounds_violation: bounds_violation(bounds),
    }
}
