use anyhow::{Context as _, Result};
use paramkit::{ApplyPlan, ChangeSet, diff};
use serde::Serialize;
use std::path::Path;

use crate::Context;
use crate::ui;

/// Machine-readable plan output
#[derive(Serialize)]
struct PlanOutput<'a> {
    group: &'a str,
    changes: &'a ChangeSet,
    plan: &'a ApplyPlan,
}

/// Show what `apply` would change, without changing anything
pub fn run(ctx: &Context, desired_path: &Path, state_path: &Path, json: bool) -> Result<()> {
    let loaded = super::load(desired_path, state_path)?;
    let current = loaded.group.current_state()?;

    let changes = diff(&loaded.desired, &current).context("Failed to diff parameter group")?;
    let opts = loaded.config.apply_options(true);
    let plan = ApplyPlan::build(&changes, opts.limits, opts.prefer_reset_all)
        .context("Failed to plan batches")?;

    if json {
        let output = PlanOutput {
            group: &loaded.config.name,
            changes: &changes,
            plan: &plan,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    ui::header(&format!("Plan for {}", loaded.config.name));
    if ctx.verbose > 0 {
        ui::kv("Desired", &desired_path.display().to_string());
        ui::kv("State", &state_path.display().to_string());
    }

    ui::display_changes(&changes);
    ui::display_plan(&plan);

    Ok(())
}
