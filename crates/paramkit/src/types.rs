//! Outcome and option types for applying parameter changes

use crate::error::{Error, ErrorCategory};
use crate::planner::BatchLimits;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which remote operation a batch is sent with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Change parameter values
    Modify,
    /// Revert named parameters to engine defaults
    Reset,
    /// Revert every user-defined parameter in one call
    ResetAll,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modify => write!(f, "modify"),
            Self::Reset => write!(f, "reset"),
            Self::ResetAll => write!(f, "reset-all"),
        }
    }
}

/// Why a batch ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The remote service refused the batch; never retried
    Rejected,
    /// Transient failures outlasted the retry budget or the batch deadline
    Transient,
    /// Cancelled while the batch was in flight
    Cancelled,
}

impl From<ErrorCategory> for FailureKind {
    fn from(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Transient => Self::Transient,
            ErrorCategory::Cancelled => Self::Cancelled,
            ErrorCategory::Rejected | ErrorCategory::InvalidConfiguration => Self::Rejected,
        }
    }
}

impl FailureKind {
    /// Actionable advice for an operator looking at the report
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Rejected => "Check the parameter names and values for this engine family",
            Self::Transient => "Run the reconciliation again once the service recovers",
            Self::Cancelled => "Run the reconciliation again to apply the remaining changes",
        }
    }
}

/// Terminal failure of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Number of remote calls made for this batch
    pub attempts: u32,
}

impl BatchFailure {
    /// Build a failure record from the error that ended the batch
    pub fn from_error(error: &Error, attempts: u32) -> Self {
        Self {
            kind: error.category().into(),
            message: error.to_string(),
            attempts,
        }
    }
}

/// Result of one planned batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum BatchStatus {
    /// Applied by the remote service
    Succeeded { attempts: u32 },
    /// Gave up on this batch
    Failed(BatchFailure),
    /// Never sent because an earlier batch failed or the run was cancelled
    NotAttempted,
    /// Not sent on purpose (dry run)
    Skipped { reason: String },
}

impl BatchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One planned remote call and what became of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub kind: OperationKind,
    /// Position among batches of the same operation, 0-indexed
    pub index: usize,
    /// Parameter names carried by the batch
    pub names: Vec<String>,
    pub status: BatchStatus,
}

/// What an apply run did, batch by batch
///
/// Partial application is a normal outcome: failed and unattempted batches
/// are reported here rather than returned as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub group_name: String,
    pub dry_run: bool,
    /// Whether the run stopped because the caller cancelled it
    pub cancelled: bool,
    /// Every planned batch in the order it was (or would have been) sent
    pub batches: Vec<BatchRecord>,
}

impl OutcomeReport {
    /// Batches the remote service applied
    pub fn succeeded(&self) -> impl Iterator<Item = &BatchRecord> {
        self.batches.iter().filter(|b| b.status.is_success())
    }

    /// Batches that ended in failure
    pub fn failed(&self) -> impl Iterator<Item = &BatchRecord> {
        self.batches.iter().filter(|b| b.status.is_failure())
    }

    /// Batches that were never sent
    pub fn not_attempted(&self) -> impl Iterator<Item = &BatchRecord> {
        self.batches
            .iter()
            .filter(|b| matches!(b.status, BatchStatus::NotAttempted))
    }

    /// Parameter names whose change was not applied
    pub fn out_of_sync(&self) -> Vec<&str> {
        self.batches
            .iter()
            .filter(|b| !b.status.is_success())
            .flat_map(|b| b.names.iter().map(String::as_str))
            .collect()
    }

    /// Check if every planned batch was applied
    pub fn is_success(&self) -> bool {
        !self.dry_run && self.batches.iter().all(|b| b.status.is_success())
    }

    /// Check if some batches were applied and others were not
    pub fn is_partial(&self) -> bool {
        self.succeeded().next().is_some() && !self.out_of_sync().is_empty()
    }

    /// Count batches by status
    pub fn summary(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for batch in &self.batches {
            match batch.status {
                BatchStatus::Succeeded { .. } => summary.succeeded += 1,
                BatchStatus::Failed(_) => summary.failed += 1,
                BatchStatus::NotAttempted => summary.not_attempted += 1,
                BatchStatus::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary
    }
}

/// Batch counts of an [`OutcomeReport`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub skipped: usize,
}

impl OutcomeSummary {
    /// Total number of planned batches
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.not_attempted + self.skipped
    }
}

/// Options for applying a change set
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Per-call limits of the remote operations
    pub limits: BatchLimits,
    /// Retry policy for transient failures, per batch
    pub retry: RetryConfig,
    /// Time budget for one batch including its retries
    pub batch_timeout: Option<Duration>,
    /// Use a single reset-all call when every user parameter is being reset
    pub prefer_reset_all: bool,
    /// Plan and report without calling the remote service
    pub dry_run: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            limits: BatchLimits::default(),
            retry: RetryConfig::default(),
            batch_timeout: None,
            prefer_reset_all: true,
            dry_run: false,
        }
    }
}
