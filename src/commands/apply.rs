use anyhow::{Context as _, Result};
use colored::Colorize;
use paramkit::{ApplyPlan, CancelToken, OutcomeReport, apply_plan, diff};
use serde::Serialize;
use std::path::PathBuf;

use crate::Context;
use crate::progress::BarProgress;
use crate::ui;

/// Options for the apply command
#[derive(Debug, Clone)]
pub struct ApplyArgs {
    pub desired: PathBuf,
    pub state: PathBuf,
    /// Plan and report without touching the state file
    pub dry_run: bool,
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Print the outcome report as JSON
    pub json: bool,
}

/// Machine-readable apply output
#[derive(Serialize)]
struct ApplyOutput<'a> {
    report: &'a OutcomeReport,
    /// Names still differing from the desired state after the run
    out_of_sync: &'a [&'a str],
}

/// Converge the live group with the desired state file
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut loaded = super::load(&args.desired, &args.state)?;
    let current = loaded.group.current_state()?;

    let changes = diff(&loaded.desired, &current).context("Failed to diff parameter group")?;
    let opts = loaded.config.apply_options(args.dry_run);
    let plan = ApplyPlan::build(&changes, opts.limits, opts.prefer_reset_all)
        .context("Failed to plan batches")?;

    if !args.json {
        ui::header(&format!("Applying {}", loaded.config.name));
        if args.dry_run {
            ui::warn("Dry run - no changes will be made");
        }
        ui::display_changes(&changes);
        ui::display_plan(&plan);
    }

    if !changes.has_changes() && !args.json {
        return Ok(());
    }

    if !args.yes && !args.dry_run && !plan.is_empty() && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let cancel = CancelToken::new();
    let mut progress = BarProgress::new(ctx.quiet || args.json);
    let report = apply_plan(&mut loaded.group, &plan, &opts, &cancel, &mut progress);

    if !args.dry_run {
        loaded.group.save()?;
    }

    // Re-read the live state to see what is still out of sync
    let after = loaded.group.current_state()?;
    let remaining = diff(&loaded.desired, &after).context("Failed to re-diff parameter group")?;
    let out_of_sync = if args.dry_run {
        Vec::new()
    } else {
        remaining.pending_names()
    };

    if args.json {
        let output = ApplyOutput {
            report: &report,
            out_of_sync: &out_of_sync,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        ui::display_report(&report);
        if !out_of_sync.is_empty() {
            println!();
            ui::warn(&format!(
                "{} parameter(s) still out of sync: {}",
                out_of_sync.len(),
                ui::join_names(&out_of_sync, 10)
            ));
        }
        if !args.dry_run && !loaded.group.data().pending_restart.is_empty() {
            ui::info("Deferred changes take effect after the next instance restart");
        }
    }

    if !args.dry_run && !report.is_success() {
        anyhow::bail!(
            "{} of {} batch(es) were not applied",
            report.failed().count() + report.not_attempted().count(),
            report.batches.len()
        );
    }

    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}
