//! # Paramkit
//!
//! Reconciliation of database parameter groups with a desired state.
//!
//! A parameter group is a named collection of engine settings on a managed
//! database service. The remote API only accepts a bounded number of
//! parameters per call, so converging a group means computing the change,
//! splitting it into batches and sending them one at a time.
//!
//! ## Core Concepts
//!
//! - **DesiredState / CurrentState**: What the group should contain and what it contains
//! - **ChangeSet**: Parameters to modify, parameters to reset, and the unchanged rest
//! - **ApplyPlan**: Batched remote calls, immediate-timing modifications first
//! - **Executor**: Sends the plan with retries and reports a per-batch outcome
//!
//! ## Example
//!
//! ```ignore
//! use paramkit::{
//!     ApplyOptions, ApplyTiming, CurrentState, DesiredState, NameMatching,
//!     apply_simple, diff,
//! };
//!
//! let matching = NameMatching::CaseInsensitive;
//! let desired = DesiredState::from_entries(
//!     matching,
//!     [("max_connections", "200", ApplyTiming::Deferred)],
//! )?;
//! let current = group.current_state(matching)?;
//!
//! let changes = diff(&desired, &current)?;
//! let report = apply_simple(&mut api, &changes, &ApplyOptions::default())?;
//! if !report.is_success() {
//!     eprintln!("out of sync: {:?}", report.out_of_sync());
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`ParameterGroupApi`]: The remote parameter group
//! - [`ProgressCallback`]: Receives progress updates
//!
//! The crate has no dependency on a particular cloud SDK or terminal UI.

pub mod catalog;
pub mod classify;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod model;
pub mod planner;
pub mod retry;
pub mod types;

// Re-export main types at crate root
pub use catalog::{ApplyType, ParameterCatalog, ParameterDefinition};
pub use classify::{Classified, classify};
pub use context::{BatchContext, CancelToken, NoProgress, ParameterGroupApi, ProgressCallback};
pub use diff::{ChangeSet, ChangeSummary, diff};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{apply, apply_plan, apply_simple, reconcile};
pub use model::{
    ApplyTiming, CurrentState, DesiredEntry, DesiredParameter, DesiredState, NameMatching,
    Parameter, ParameterGroup, Provenance,
};
pub use planner::{
    ApplyPlan, Batch, BatchLimits, DEFAULT_BATCH_LIMIT, ResetPlan, plan_batches, plan_prioritized,
};
pub use retry::{NoCallback, RetryCallback, RetryConfig, with_retry};
pub use types::{
    ApplyOptions, BatchFailure, BatchRecord, BatchStatus, FailureKind, OperationKind,
    OutcomeReport, OutcomeSummary,
};
