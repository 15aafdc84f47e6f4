//! Batch context and collaborator traits
//!
//! These traits keep the orchestrator independent of any particular cloud
//! client or UI: the remote parameter group is reached through
//! [`ParameterGroupApi`] and progress is reported through
//! [`ProgressCallback`].

use crate::error::{Error, Result};
use crate::model::Parameter;
use crate::planner::Batch;
use crate::types::{BatchRecord, OperationKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation signal shared between the caller and the orchestrator
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; later batches will not be issued
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything a remote call needs to know about the batch it carries
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    /// Name of the parameter group being changed
    pub group_name: &'a str,
    pub kind: OperationKind,
    /// Position among batches of the same operation, 0-indexed
    pub index: usize,
    /// Number of batches of the same operation
    pub total: usize,
    /// Current attempt, 1-indexed
    pub attempt: u32,
    /// Point in time after which the call should give up
    pub deadline: Option<Instant>,
    pub cancel: &'a CancelToken,
}

impl BatchContext<'_> {
    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Check whether the call should stop now
    pub fn should_abort(&self) -> bool {
        self.cancel.is_cancelled() || self.remaining().is_some_and(|r| r.is_zero())
    }

    /// Error to return when [`should_abort`](Self::should_abort) is true
    pub fn abort_error(&self) -> Error {
        if self.cancel.is_cancelled() {
            Error::Cancelled
        } else {
            Error::transient(format!("{} batch {} timed out", self.kind, self.index + 1))
        }
    }
}

/// The remote parameter group, as a handle the orchestrator calls into
///
/// Each call is atomic on the remote side; there is no transaction across
/// calls. Implementations report failures with [`Error::Transient`] when a
/// retry may succeed and [`Error::Rejected`] when the request itself is bad.
pub trait ParameterGroupApi {
    /// Name of the group this handle points at
    fn group_name(&self) -> &str;

    /// Change the values of at most `modify_limit` parameters
    fn modify_batch(&mut self, ctx: &BatchContext<'_>, batch: &Batch<Parameter>) -> Result<()>;

    /// Revert at most `reset_limit` named parameters to engine defaults
    fn reset_batch(&mut self, ctx: &BatchContext<'_>, names: &Batch<String>) -> Result<()>;

    /// Revert every user-defined parameter of the group
    fn reset_all(&mut self, ctx: &BatchContext<'_>) -> Result<()>;
}

/// Progress callback for apply operations
///
/// Implement this trait to receive progress updates while batches are sent.
pub trait ProgressCallback {
    /// Called once before any batch is sent
    fn on_start(&mut self, total_batches: usize);

    /// Called when a batch is about to be sent for the first time
    fn on_batch_start(&mut self, ctx: &BatchContext<'_>, size: usize);

    /// Called when a failed attempt is about to be retried
    fn on_retry(&mut self, kind: OperationKind, index: usize, error: &Error, delay: Duration);

    /// Called when a batch reaches its final status
    fn on_batch_complete(&mut self, record: &BatchRecord);

    /// Called once after the last batch
    fn on_finish(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _total_batches: usize) {}
    fn on_batch_start(&mut self, _ctx: &BatchContext<'_>, _size: usize) {}
    fn on_retry(&mut self, _kind: OperationKind, _index: usize, _error: &Error, _delay: Duration) {
    }
    fn on_batch_complete(&mut self, _record: &BatchRecord) {}
    fn on_finish(&mut self) {}
}
