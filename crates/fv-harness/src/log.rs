//! Step journal for validation trials.
//!
//! Each pipeline step of a trial appends one [`StepRecord`]. A run's journal
//! is written as newline-delimited JSON so a failed trial can be traced back
//! to the step, the file and the read direction that went wrong.

use anyhow::{Context, Result};
use fv_error::{FvError, TrialClass};
use fv_types::ReadDirection;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AcquireReport,
    CaptureExpected,
    Merge,
    Bounds,
    ReadHead,
    ReadTail,
    Compare,
}

impl Step {
    #[must_use]
    pub fn read(direction: ReadDirection) -> Self {
        match direction {
            ReadDirection::FromStart => Self::ReadHead,
            ReadDirection::FromEnd => Self::ReadTail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    /// A data check did not hold (bounds violated, bytes differ).
    Failed,
    /// The step raised an error.
    Error,
    Skipped,
}

/// What happened in one step of one trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub trial: String,
    pub file: String,
    pub step: Step,
    pub status: StepStatus,
    pub elapsed_us: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ReadDirection>,
    /// Bytes read or compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    /// Extents produced by the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extents: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<TrialClass>,
    /// Error text, skip reason or failed check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepRecord {
    #[must_use]
    pub fn new(trial: &str, file: &Path, step: Step) -> Self {
        Self {
            trial: trial.to_owned(),
            file: file.display().to_string(),
            step,
            status: StepStatus::Ok,
            elapsed_us: 0,
            direction: None,
            bytes: None,
            extents: None,
            error_class: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn direction(mut self, direction: ReadDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    #[must_use]
    pub fn bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn extents(mut self, extents: usize) -> Self {
        self.extents = Some(extents);
        self
    }

    /// Mark a data check that did not hold.
    #[must_use]
    pub fn check_failed(mut self, detail: impl Into<String>) -> Self {
        self.status = StepStatus::Failed;
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn error(mut self, err: &FvError) -> Self {
        self.status = StepStatus::Error;
        self.error_class = Some(err.trial_class());
        self.detail = Some(err.to_string());
        self
    }

    #[must_use]
    pub fn skipped(mut self, reason: &str) -> Self {
        self.status = StepStatus::Skipped;
        self.detail = Some(reason.to_owned());
        self
    }
}

/// All step records of a run, in order.
#[derive(Debug, Clone, Default)]
pub struct TrialLog {
    records: Vec<StepRecord>,
}

impl TrialLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Steps that raised an error, across every trial.
    pub fn errors(&self) -> impl Iterator<Item = &StepRecord> {
        self.records
            .iter()
            .filter(|r| r.status == StepStatus::Error)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Write one JSON object per record.
    pub fn write_ndjson<W: Write>(&self, mut writer: W) -> Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut writer, record).context("serialize step record")?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("create trial log {}", path.display()))?;
        self.write_ndjson(BufWriter::new(file))
            .with_context(|| format!("write trial log {}", path.display()))
    }
}
