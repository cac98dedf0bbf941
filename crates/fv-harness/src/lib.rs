#![forbid(unsafe_code)]
//! Trial runner for extent report validation.
//!
//! A trial captures a file's extent report and its head and tail bytes while
//! the filesystem is mounted, then reconstructs those bytes from the raw
//! device using only the reported extents. The reconstruction must match
//! and every extent must lie inside the partition.

pub mod acquire;
pub mod config;
pub mod exec;
pub mod log;
pub mod trial;
pub mod verify;

pub use acquire::{acquire_report, capture_expected, partition_size_sectors};
pub use config::VerifyConfig;
pub use exec::{CommandExecutor, CommandOutput, SystemExecutor};
pub use log::{Step, StepRecord, StepStatus, TrialLog};
pub use trial::{
    CapturedTrial, MergeSummary, RunSummary, TrialInput, TrialOutcome, TrialStatus,
    capture_trial, run_trial, validate_on_device, validate_trial,
};
pub use verify::{BoundsViolation, ContentMismatch, ExpectedBytes, Verdict, verify_content};
