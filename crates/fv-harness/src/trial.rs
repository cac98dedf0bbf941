//! One validation trial: a single file on a single filesystem.
//!
//! A trial has two phases. [`capture_trial`] needs the filesystem mounted:
//! it collects the extent report and the expected bytes. [`validate_trial`]
//! needs only the raw device: it derives the extent list and checks it.
//! Only acquisition and device failures are returned as errors; every data
//! assertion outcome is recorded on the [`TrialOutcome`].

use crate::acquire::{acquire_report, capture_expected};
use crate::config::VerifyConfig;
use crate::exec::CommandExecutor;
use crate::log::{Step, StepRecord, TrialLog};
use crate::verify::{ExpectedBytes, Verdict, verify_content};
use fv_block::{ByteDevice, ExtentReader, FileByteDevice};
use fv_error::{Result, TrialClass};
use fv_extent::{
    BoundsCheck, MergeOutcome, OverlapEvent, check_bounds, merge_extents, parse_report,
};
use fv_types::{Extent, PartitionBounds, ReadDirection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const EMPTY_EXTENTS_REASON: &str = "no extents reported; data not suitable for validation";
const NOT_SUITABLE_REASON: &str = "file not suitable: not a regular file or not larger than the compare size";

/// Everything the orchestrator supplies for one trial.
#[derive(Debug, Clone)]
pub struct TrialInput {
    /// Filesystem type or other human label, e.g. `ext4`.
    pub label: String,
    /// The file, as seen through the mounted filesystem.
    pub file: PathBuf,
    /// Raw device backing the filesystem, e.g. `/dev/loop3p1`.
    pub device: PathBuf,
    pub partition: PartitionBounds,
}

/// Inputs captured while the filesystem is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedTrial {
    pub report: String,
    /// `None` when the file is not suitable for content comparison.
    pub expected: Option<ExpectedBytes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Passed,
    Failed,
    Skipped,
    Inconclusive,
}

/// Extent counts and sector totals before and after merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub before_count: usize,
    pub before_sectors: u64,
    pub after_count: usize,
    pub after_sectors: u64,
    pub sector_total_mismatch: bool,
    pub overlaps: Vec<OverlapEvent>,
    pub extents: Vec<Extent>,
}

impl From<&MergeOutcome> for MergeSummary {
    fn from(outcome: &MergeOutcome) -> Self {
        Self {
            before_count: outcome.input_count,
            before_sectors: outcome.input_sectors,
            after_count: outcome.merged_count(),
            after_sectors: outcome.merged_sectors,
            sector_total_mismatch: outcome.sector_total_mismatch(),
            overlaps: outcome.overlaps.clone(),
            extents: outcome.extents.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub label: String,
    pub file: String,
    pub status: TrialStatus,
    pub merge: MergeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TrialOutcome {
    /// One-line human-readable result.
    #[must_use]
    pub fn result_line(&self) -> String {
        match self.status {
            TrialStatus::Passed => {
                format!("RESULT: filefrag validation PASSED for {}.", self.label)
            }
            TrialStatus::Failed => {
                format!("RESULT: filefrag validation FAILED for {}.", self.label)
            }
            TrialStatus::Skipped => format!(
                "RESULT: {} skipped for {}.",
                self.reason.as_deref().unwrap_or("trial"),
                self.label
            ),
            TrialStatus::Inconclusive => format!(
                "RESULT: filefrag validation INCONCLUSIVE for {} ({}).",
                self.label,
                self.reason.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

/// Collect the extent report and expected bytes for `file`.
pub fn capture_trial(
    exec: &dyn CommandExecutor,
    label: &str,
    file: &Path,
    config: &VerifyConfig,
    log: &mut TrialLog,
) -> Result<CapturedTrial> {
    let record = StepRecord::new(label, file, Step::AcquireReport);
    let (report, elapsed) = timed(|| acquire_report(exec, &config.report_tool, file));
    let report = match report {
        Ok(report) => {
            log.push(record.elapsed(elapsed).bytes(report.len()));
            report
        }
        Err(err) => {
            log.push(record.elapsed(elapsed).error(&err));
            return Err(err);
        }
    };

    let record = StepRecord::new(label, file, Step::CaptureExpected);
    let (expected, elapsed) = timed(|| capture_expected(file, config.compare_bytes));
    let expected = match expected {
        Ok(Some(expected)) => {
            let bytes = expected.head.len() + expected.tail.len();
            log.push(record.elapsed(elapsed).bytes(bytes));
            Some(expected)
        }
        Ok(None) => {
            log.push(record.elapsed(elapsed).skipped(NOT_SUITABLE_REASON));
            None
        }
        Err(err) => {
            log.push(record.elapsed(elapsed).error(&err));
            return Err(err);
        }
    };

    Ok(CapturedTrial { report, expected })
}

/// Derive the extent list from `captured` and check it against `device`.
pub fn validate_trial<D: ByteDevice + ?Sized>(
    label: &str,
    file: &Path,
    captured: &CapturedTrial,
    device: &D,
    partition: PartitionBounds,
    log: &mut TrialLog,
) -> Result<TrialOutcome> {
    let (merged, elapsed) = timed(|| merge_extents(&parse_report(&captured.report)));
    let merge = MergeSummary::from(&merged);
    let record = StepRecord::new(label, file, Step::Merge)
        .elapsed(elapsed)
        .extents(merge.after_count);
    log.push(if merge.sector_total_mismatch {
        record.check_failed(format!(
            "merged {} sectors but {} were reported",
            merge.after_sectors, merge.before_sectors
        ))
    } else {
        record
    });

    let mut outcome = TrialOutcome {
        label: label.to_owned(),
        file: file.display().to_string(),
        status: TrialStatus::Skipped,
        merge,
        bounds: None,
        verdict: None,
        reason: None,
    };

    if merged.is_empty() {
        log.push(StepRecord::new(label, file, Step::Bounds).skipped(EMPTY_EXTENTS_REASON));
        outcome.reason = Some(EMPTY_EXTENTS_REASON.to_owned());
        return Ok(finish(outcome));
    }

    let (bounds, elapsed) = timed(|| check_bounds(&merged.extents, partition));
    let record = StepRecord::new(label, file, Step::Bounds).elapsed(elapsed);
    log.push(if bounds.holds() {
        record
    } else {
        record.check_failed(format!(
            "extent end {} exceeds partition size {}",
            bounds.max_end, bounds.size_sectors
        ))
    });
    outcome.bounds = Some(bounds);

    let Some(expected) = captured.expected.as_ref() else {
        log.push(StepRecord::new(label, file, Step::Compare).skipped(NOT_SUITABLE_REASON));
        outcome.reason = Some(NOT_SUITABLE_REASON.to_owned());
        // Bounds still decide the trial when there is nothing to compare.
        let verdict = Verdict::bounds_only(&bounds);
        if !verdict.passed() {
            outcome.status = TrialStatus::Failed;
            outcome.verdict = Some(verdict);
        }
        return Ok(finish(outcome));
    };

    let reader = ExtentReader::new(device, &merged.extents);
    let head_len = expected.head.len();
    let tail_len = expected.tail.len();
    let reconstructed = read_step(label, file, &reader, head_len, ReadDirection::FromStart, log)
        .and_then(|mut head| {
            let tail = read_step(label, file, &reader, tail_len, ReadDirection::FromEnd, log)?;
            head.extend_from_slice(&tail);
            Ok(head)
        });

    let reconstructed = match reconstructed {
        Ok(bytes) => bytes,
        Err(err) if err.trial_class() == TrialClass::Inconclusive => {
            let verdict = Verdict::bounds_only(&bounds);
            outcome.status = if verdict.passed() {
                TrialStatus::Inconclusive
            } else {
                outcome.verdict = Some(verdict);
                TrialStatus::Failed
            };
            outcome.reason = Some(err.to_string());
            return Ok(finish(outcome));
        }
        Err(err) => return Err(err),
    };

    let (verdict, elapsed) = timed(|| verify_content(expected, &reconstructed, &bounds));
    let record = StepRecord::new(label, file, Step::Compare)
        .elapsed(elapsed)
        .bytes(reconstructed.len());
    log.push(match &verdict.content_mismatch {
        None => record,
        Some(mismatch) => record.check_failed(format!(
            "first difference at byte {}",
            mismatch.first_difference
        )),
    });
    outcome.status = if verdict.passed() {
        TrialStatus::Passed
    } else {
        TrialStatus::Failed
    };
    outcome.verdict = Some(verdict);
    Ok(finish(outcome))
}

fn read_step<D: ByteDevice + ?Sized>(
    label: &str,
    file: &Path,
    reader: &ExtentReader<'_, D>,
    len: usize,
    direction: ReadDirection,
    log: &mut TrialLog,
) -> Result<Vec<u8>> {
    let record = StepRecord::new(label, file, Step::read(direction)).direction(direction);
    let (bytes, elapsed) = timed(|| reader.read(len, direction));
    let record = record.elapsed(elapsed);
    match &bytes {
        Ok(bytes) => log.push(record.bytes(bytes.len())),
        Err(err) => log.push(record.bytes(len).error(err)),
    }
    bytes
}

fn finish(outcome: TrialOutcome) -> TrialOutcome {
    match outcome.status {
        TrialStatus::Passed | TrialStatus::Skipped => info!(
            label = %outcome.label,
            file = %outcome.file,
            status = ?outcome.status,
            "{}",
            outcome.result_line()
        ),
        TrialStatus::Failed | TrialStatus::Inconclusive => {
            if let Some(mismatch) = outcome.verdict.as_ref().and_then(|v| v.content_mismatch.as_ref()) {
                warn!(
                    label = %outcome.label,
                    first_difference = mismatch.first_difference,
                    expected = %mismatch.expected_hex,
                    actual = %mismatch.actual_hex,
                    "content mismatch"
                );
            }
            if let Some(violation) = outcome.verdict.as_ref().and_then(|v| v.bounds_violation) {
                warn!(
                    label = %outcome.label,
                    max_end = violation.max_end,
                    size_sectors = violation.size_sectors,
                    "extent exceeds partition bounds"
                );
            }
            warn!(
                label = %outcome.label,
                file = %outcome.file,
                status = ?outcome.status,
                "{}",
                outcome.result_line()
            );
        }
    }
    outcome
}

/// [`validate_trial`] against a raw device opened for the duration of the
/// call.
pub fn validate_on_device(
    label: &str,
    file: &Path,
    captured: &CapturedTrial,
    device_path: &Path,
    partition: PartitionBounds,
    log: &mut TrialLog,
) -> Result<TrialOutcome> {
    let device = FileByteDevice::open(device_path)?;
    validate_trial(label, file, captured, &device, partition, log)
}

/// Capture then validate.
///
/// The caller must keep the filesystem mounted for the duration of the
/// call. Use [`capture_trial`] and [`validate_on_device`] separately to
/// unmount in between.
pub fn run_trial(
    exec: &dyn CommandExecutor,
    input: &TrialInput,
    config: &VerifyConfig,
    log: &mut TrialLog,
) -> Result<TrialOutcome> {
    let captured = capture_trial(exec, &input.label, &input.file, config, log)?;
    validate_on_device(
        &input.label,
        &input.file,
        &captured,
        &input.device,
        input.partition,
        log,
    )
}

/// Aggregate over every trial of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub trials: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub inconclusive: usize,
    pub outcomes: Vec<TrialOutcome>,
}

impl RunSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<TrialOutcome>) -> Self {
        let count = |status: TrialStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            trials: outcomes.len(),
            passed: count(TrialStatus::Passed),
            failed: count(TrialStatus::Failed),
            skipped: count(TrialStatus::Skipped),
            inconclusive: count(TrialStatus::Inconclusive),
            outcomes,
        }
    }

    /// Any trial recorded a content mismatch or bounds violation.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
