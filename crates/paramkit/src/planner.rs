//! Batch planner - splits changes into bounded remote calls
//!
//! The remote service accepts a limited number of parameters per call and
//! silently drops anything beyond it, so every change has to land in exactly
//! one batch no larger than the limit. Changes come in priority buckets:
//! a batch never takes from a later bucket while an earlier one still has
//! elements waiting.

use crate::classify::classify;
use crate::diff::ChangeSet;
use crate::error::{Error, Result};
use crate::model::Parameter;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Documented per-call limit of the reference service
pub const DEFAULT_BATCH_LIMIT: usize = 20;

/// A non-empty group of changes sent in one remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch<T> {
    items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for batches produced by the planner
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn check_batch_size(max_batch_size: usize) -> Result<()> {
    if max_batch_size == 0 {
        return Err(Error::invalid("max batch size must be at least 1"));
    }
    Ok(())
}

/// Take one batch from the front of the buckets, leaving the remainder
fn take_batch<T>(buckets: &mut [VecDeque<T>], max_batch_size: usize) -> Vec<T> {
    let mut batch = Vec::new();
    for bucket in buckets.iter_mut() {
        while batch.len() < max_batch_size {
            match bucket.pop_front() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        if batch.len() == max_batch_size {
            break;
        }
    }
    batch
}

/// Plan batches over priority-ordered buckets
///
/// Batches are filled from the first bucket until it is exhausted before
/// anything from the next bucket is taken; a batch may straddle the boundary
/// once the earlier bucket has no elements left.
pub fn plan_prioritized<T>(buckets: Vec<Vec<T>>, max_batch_size: usize) -> Result<Vec<Batch<T>>> {
    check_batch_size(max_batch_size)?;

    let total: usize = buckets.iter().map(Vec::len).sum();
    let mut queues: Vec<VecDeque<T>> = buckets.into_iter().map(VecDeque::from).collect();
    let mut batches = Vec::with_capacity(total.div_ceil(max_batch_size));

    loop {
        let items = take_batch(&mut queues, max_batch_size);
        if items.is_empty() {
            break;
        }
        batches.push(Batch { items });
    }

    Ok(batches)
}

/// Plan batches over a single flat list; plain fixed-size slicing
pub fn plan_batches<T>(changes: Vec<T>, max_batch_size: usize) -> Result<Vec<Batch<T>>> {
    plan_prioritized(vec![changes], max_batch_size)
}

/// Per-call limits of the two remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Maximum parameters per modify call
    pub modify: usize,
    /// Maximum names per reset call
    pub reset: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            modify: DEFAULT_BATCH_LIMIT,
            reset: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// How user-defined parameters get reverted to engine defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetPlan {
    /// Per-name reset calls; empty when nothing is reset
    Batches(Vec<Batch<String>>),
    /// One reset-all call covering every user-defined parameter
    All { names: Vec<String> },
}

impl ResetPlan {
    /// Number of remote calls this plan makes
    pub fn call_count(&self) -> usize {
        match self {
            Self::Batches(batches) => batches.len(),
            Self::All { .. } => 1,
        }
    }

    /// Number of parameters being reset
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Batches(batches) => batches.iter().map(Batch::len).sum(),
            Self::All { names } => names.len(),
        }
    }
}

/// Every remote call needed to apply a change set, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPlan {
    /// Modify calls, immediate-timing parameters first
    pub modify: Vec<Batch<Parameter>>,
    /// Reset calls, issued after all modify calls
    pub reset: ResetPlan,
}

impl ApplyPlan {
    /// Classify and batch a change set
    ///
    /// With `prefer_reset_all`, a change set that clears every user-defined
    /// parameter becomes a single reset-all call.
    pub fn build(changes: &ChangeSet, limits: BatchLimits, prefer_reset_all: bool) -> Result<Self> {
        check_batch_size(limits.modify)?;
        check_batch_size(limits.reset)?;

        let modify = plan_prioritized(
            classify(changes.to_modify.clone()).into_buckets(),
            limits.modify,
        )?;

        let reset = if prefer_reset_all && changes.resets_all_user_parameters {
            ResetPlan::All {
                names: changes.to_reset.clone(),
            }
        } else {
            ResetPlan::Batches(plan_batches(changes.to_reset.clone(), limits.reset)?)
        };

        log::debug!(
            "Planned {} modify call(s) and {} reset call(s)",
            modify.len(),
            reset.call_count()
        );

        Ok(Self { modify, reset })
    }

    /// Total number of remote calls
    pub fn call_count(&self) -> usize {
        self.modify.len() + self.reset.call_count()
    }

    /// Check if the plan makes no remote calls
    pub fn is_empty(&self) -> bool {
        self.call_count() == 0
    }
}
