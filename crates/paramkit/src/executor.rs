//! Apply orchestrator - sends planned batches to the remote parameter group

use crate::context::{BatchContext, CancelToken, NoProgress, ParameterGroupApi, ProgressCallback};
use crate::diff::{ChangeSet, diff};
use crate::error::{Error, Result};
use crate::model::{CurrentState, DesiredState};
use crate::planner::{ApplyPlan, Batch, ResetPlan};
use crate::retry::{RetryCallback, with_retry};
use crate::types::{
    ApplyOptions, BatchFailure, BatchRecord, BatchStatus, FailureKind, OperationKind,
    OutcomeReport,
};
use std::time::{Duration, Instant};

/// Forwards retry notifications for one batch to the log and the progress callback
struct BatchRetryNotifier<'a, P: ProgressCallback> {
    progress: &'a mut P,
    kind: OperationKind,
    index: usize,
}

impl<P: ProgressCallback> RetryCallback for BatchRetryNotifier<'_, P> {
    fn on_retry(&mut self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration) {
        log::warn!(
            "{} batch {} attempt {}/{} failed: {}. Retrying in {:?}",
            self.kind,
            self.index + 1,
            attempt,
            max_attempts,
            error,
            delay
        );
        self.progress.on_retry(self.kind, self.index, error, delay);
    }
}

/// What the sequencing loop needs to send one kind of batch
struct Step<'a> {
    group_name: &'a str,
    kind: OperationKind,
    total: usize,
    opts: &'a ApplyOptions,
    cancel: &'a CancelToken,
}

/// Send one batch with retries, returning its final status
fn run_batch<P, F>(
    step: &Step<'_>,
    index: usize,
    size: usize,
    progress: &mut P,
    mut call: F,
) -> BatchStatus
where
    P: ProgressCallback,
    F: FnMut(&BatchContext<'_>) -> Result<()>,
{
    // A timeout too large to represent is no deadline at all
    let deadline = step.opts.batch_timeout.and_then(|t| Instant::now().checked_add(t));
    let context = |attempt: u32| BatchContext {
        group_name: step.group_name,
        kind: step.kind,
        index,
        total: step.total,
        attempt,
        deadline,
        cancel: step.cancel,
    };

    progress.on_batch_start(&context(1), size);
    log::debug!(
        "Sending {} batch {}/{} ({} parameter(s)) to {}",
        step.kind,
        index + 1,
        step.total,
        size,
        step.group_name
    );

    let mut attempts = 0;
    let mut notifier = BatchRetryNotifier {
        progress,
        kind: step.kind,
        index,
    };
    let result = with_retry(
        &step.opts.retry,
        &mut notifier,
        step.cancel,
        deadline,
        |attempt| {
            attempts = attempt;
            let ctx = context(attempt);
            if ctx.should_abort() {
                return Err(ctx.abort_error());
            }
            call(&ctx)
        },
    );

    match result {
        Ok(()) => BatchStatus::Succeeded { attempts },
        Err(e) => {
            log::warn!(
                "{} batch {}/{} for {} failed after {} attempt(s): {}",
                step.kind,
                index + 1,
                step.total,
                step.group_name,
                attempts,
                e
            );
            BatchStatus::Failed(BatchFailure::from_error(&e, attempts))
        }
    }
}

/// Mark the record finished and tell the progress callback
fn complete<P: ProgressCallback>(record: &mut BatchRecord, status: BatchStatus, progress: &mut P) {
    record.status = status;
    progress.on_batch_complete(record);
}

fn records<T>(
    kind: OperationKind,
    batches: &[Batch<T>],
    name: impl Fn(&T) -> &str,
) -> Vec<BatchRecord> {
    batches
        .iter()
        .enumerate()
        .map(|(index, batch)| BatchRecord {
            kind,
            index,
            names: batch.iter().map(|item| name(item).to_string()).collect(),
            status: BatchStatus::NotAttempted,
        })
        .collect()
}

/// Apply a prepared plan to the remote group
///
/// Batches are sent one at a time: every modify batch, then the resets.
/// A failed modify batch stops the run, so no reset is sent after it; a
/// failed reset batch stops the remaining resets. Batches already applied
/// stay applied. Cancellation stops the run before the next batch.
pub fn apply_plan<A, P>(
    api: &mut A,
    plan: &ApplyPlan,
    opts: &ApplyOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> OutcomeReport
where
    A: ParameterGroupApi + ?Sized,
    P: ProgressCallback,
{
    let group_name = api.group_name().to_string();

    let mut modify_records = records(OperationKind::Modify, &plan.modify, |p| p.name.as_str());
    let mut reset_records = match &plan.reset {
        ResetPlan::Batches(batches) => records(OperationKind::Reset, batches, String::as_str),
        ResetPlan::All { names } => vec![BatchRecord {
            kind: OperationKind::ResetAll,
            index: 0,
            names: names.clone(),
            status: BatchStatus::NotAttempted,
        }],
    };
    if plan.reset.parameter_count() == 0 {
        reset_records.clear();
    }

    let mut report = OutcomeReport {
        group_name: group_name.clone(),
        dry_run: opts.dry_run,
        cancelled: false,
        batches: Vec::new(),
    };

    if opts.dry_run {
        for record in modify_records.iter_mut().chain(reset_records.iter_mut()) {
            record.status = BatchStatus::Skipped {
                reason: "dry run".to_string(),
            };
        }
        report.batches = modify_records.into_iter().chain(reset_records).collect();
        return report;
    }

    progress.on_start(modify_records.len() + reset_records.len());

    let mut halted = false;

    let step = Step {
        group_name: &group_name,
        kind: OperationKind::Modify,
        total: plan.modify.len(),
        opts,
        cancel,
    };
    for (batch, record) in plan.modify.iter().zip(modify_records.iter_mut()) {
        if cancel.is_cancelled() {
            report.cancelled = true;
            halted = true;
            break;
        }
        let status = run_batch(&step, record.index, batch.len(), progress, |ctx| {
            api.modify_batch(ctx, batch)
        });
        let failed = status.is_failure();
        complete(record, status, progress);
        if failed {
            halted = true;
            break;
        }
    }

    if !halted {
        match &plan.reset {
            ResetPlan::Batches(batches) => {
                let step = Step {
                    kind: OperationKind::Reset,
                    total: batches.len(),
                    ..step
                };
                for (batch, record) in batches.iter().zip(reset_records.iter_mut()) {
                    if cancel.is_cancelled() {
                        report.cancelled = true;
                        break;
                    }
                    let status = run_batch(&step, record.index, batch.len(), progress, |ctx| {
                        api.reset_batch(ctx, batch)
                    });
                    let failed = status.is_failure();
                    complete(record, status, progress);
                    if failed {
                        break;
                    }
                }
            }
            ResetPlan::All { names } => {
                if let Some(record) = reset_records.first_mut() {
                    if cancel.is_cancelled() {
                        report.cancelled = true;
                    } else {
                        let step = Step {
                            kind: OperationKind::ResetAll,
                            total: 1,
                            ..step
                        };
                        let status =
                            run_batch(&step, 0, names.len(), progress, |ctx| api.reset_all(ctx));
                        complete(record, status, progress);
                    }
                }
            }
        }
    }

    report.batches = modify_records.into_iter().chain(reset_records).collect();
    report.cancelled |= report.batches.iter().any(|b| {
        matches!(&b.status, BatchStatus::Failed(f) if f.kind == FailureKind::Cancelled)
    });
    progress.on_finish();

    let summary = report.summary();
    log::info!(
        "Applied {}/{} batch(es) to {} ({} failed, {} not attempted)",
        summary.succeeded,
        summary.total(),
        report.group_name,
        summary.failed,
        summary.not_attempted
    );

    report
}

/// Plan and apply a change set
///
/// Fails only on invalid configuration, before anything is sent; remote
/// failures are reported in the returned [`OutcomeReport`].
pub fn apply<A, P>(
    api: &mut A,
    changes: &ChangeSet,
    opts: &ApplyOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<OutcomeReport>
where
    A: ParameterGroupApi + ?Sized,
    P: ProgressCallback,
{
    opts.retry.validate()?;
    let plan = ApplyPlan::build(changes, opts.limits, opts.prefer_reset_all)?;
    Ok(apply_plan(api, &plan, opts, cancel, progress))
}

/// Simple apply without progress reporting or cancellation
pub fn apply_simple<A>(
    api: &mut A,
    changes: &ChangeSet,
    opts: &ApplyOptions,
) -> Result<OutcomeReport>
where
    A: ParameterGroupApi + ?Sized,
{
    apply(api, changes, opts, &CancelToken::new(), &mut NoProgress)
}

/// One full reconciliation pass: diff, plan, apply
///
/// Returns the change set that was acted on along with the outcome.
pub fn reconcile<A, P>(
    api: &mut A,
    desired: &DesiredState,
    current: &CurrentState,
    opts: &ApplyOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<(ChangeSet, OutcomeReport)>
where
    A: ParameterGroupApi + ?Sized,
    P: ProgressCallback,
{
    let changes = diff(desired, current)?;
    let report = apply(api, &changes, opts, cancel, progress)?;
    Ok((changes, report))
}
