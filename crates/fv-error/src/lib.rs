#![forbid(unsafe_code)]
//! Error types for fragverify.
//!
//! # Error Taxonomy
//!
//! fragverify uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `fv-types` | Malformed numeric fields and extent invariants |
//! | Runtime | `FvError` | `fv-error` (this crate) | Acquisition, device I/O and reconstruction failures |
//!
//! Data-assertion outcomes (content mismatch, bounds violation, overlap,
//! empty extent list) are *not* errors. They are recorded on the trial
//! outcome by `fv-harness` so one bad trial never interrupts the iteration
//! over filesystems.
//!
//! ## Trial Policy
//!
//! Every `FvError` variant maps to exactly one [`TrialClass`] via
//! [`FvError::trial_class`]. The mapping is exhaustive (no wildcard arms) so
//! adding a new variant is a compile error until its policy is assigned.
//!
//! | Variant | Class | Effect |
//! |---------|-------|--------|
//! | `Io` | `Fatal` | aborts the run |
//! | `Acquisition` | `Fatal` | aborts the run |
//! | `Format` | `Fatal` | aborts the run |
//! | `Parse` | `Fatal` | aborts the run |
//! | `ShortRead` | `Inconclusive` | trial recorded as inconclusive |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified runtime error type for fragverify operations.
#[derive(Debug, Error)]
pub enum FvError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An external command used to capture trial inputs failed.
    ///
    /// `exit_code` is `None` when the process could not be spawned or was
    /// terminated by a signal.
    #[error("command `{command}` failed (exit code {exit_code:?}): {stderr}")]
    Acquisition {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Out-of-range or overflowing device access.
    #[error("invalid device access: {0}")]
    Format(String),

    /// Parse-layer error surfaced to the caller.
    ///
    /// Carries the string representation of a `ParseError` from `fv-types`.
    #[error("parse error: {0}")]
    Parse(String),

    /// The extent list spans fewer bytes than the requested comparison size.
    #[error("short read: requested {requested} bytes but extents span only {available}")]
    ShortRead { requested: u64, available: u64 },
}

/// How the trial runner treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialClass {
    /// Propagated to the orchestrator; the run stops after cleanup.
    Fatal,
    /// The current trial is recorded as inconclusive; the run continues.
    Inconclusive,
}

impl FvError {
    #[must_use]
    pub fn trial_class(&self) -> TrialClass {
        match self {
            Self::Io(_) | Self::Acquisition { .. } | Self::Format(_) | Self::Parse(_) => {
                TrialClass::Fatal
            }
            Self::ShortRead { .. } => TrialClass::Inconclusive,
        }
    }

    /// Build an acquisition error from a spawn failure.
    #[must_use]
    pub fn spawn_failed(command: &str, err: &std::io::Error) -> Self {
        Self::Acquisition {
            command: command.to_owned(),
            exit_code: None,
            stderr: err.to_string(),
        }
    }
}

/// Result alias using `FvError`.
pub type Result<T> = std::result::Result<T, FvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trial_class_covers_all_variants() {
        let cases: Vec<(FvError, TrialClass)> = vec![
            (FvError::Io(std::io::Error::other("test")), TrialClass::Fatal),
            (
                FvError::Acquisition {
                    command: "filefrag -b512 -e -s ./mnt/random".into(),
                    exit_code: Some(1),
                    stderr: "No such file".into(),
                },
                TrialClass::Fatal,
            ),
            (FvError::Format("oob".into()), TrialClass::Fatal),
            (FvError::Parse("bad".into()), TrialClass::Fatal),
            (
                FvError::ShortRead {
                    requested: 256,
                    available: 0,
                },
                TrialClass::Inconclusive,
            ),
        ];

        for (error, expected) in &cases {
            assert_eq!(error.trial_class(), *expected, "wrong class for {error:?}");
        }
    }

    #[test]
    fn display_formatting() {
        let err = FvError::Acquisition {
            command: "filefrag".into(),
            exit_code: Some(1),
            stderr: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "command `filefrag` failed (exit code Some(1)): boom"
        );

        let short = FvError::ShortRead {
            requested: 256,
            available: 128,
        };
        assert_eq!(
            short.to_string(),
            "short read: requested 256 bytes but extents span only 128"
        );
    }

    #[test]
    fn spawn_failure_has_no_exit_code() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err = FvError::spawn_failed("filefrag", &io);
        assert!(matches!(err, FvError::Acquisition { exit_code: None, .. }));
    }
}
