use colored::Colorize;
use paramkit::{
    ApplyPlan, BatchRecord, BatchStatus, ChangeSet, OperationKind, OutcomeReport, ResetPlan,
};

use crate::store::GroupFile;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Join names for one line of output, eliding past `max`
pub fn join_names<S: AsRef<str>>(names: &[S], max: usize) -> String {
    let shown: Vec<&str> = names.iter().take(max).map(AsRef::as_ref).collect();
    let mut out = shown.join(", ");
    if names.len() > max {
        out.push_str(&format!(", ... and {} more", names.len() - max));
    }
    out
}

// ============================================================================
// Change Set
// ============================================================================

/// Display a change set in a user-friendly format
pub fn display_changes(changes: &ChangeSet) {
    if !changes.has_changes() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Parameter Diff".bold()
    );
    println!("│");

    for parameter in &changes.to_modify {
        println!(
            "│   {} {:<32} {} {}",
            "~".yellow(),
            parameter.name,
            parameter.value,
            format!("({})", parameter.apply_timing).dimmed()
        );
    }
    for name in &changes.to_reset {
        println!(
            "│   {} {:<32} {}",
            "-".red(),
            name,
            "(reset to default)".dimmed()
        );
    }
    println!("│");

    let summary = changes.summary();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} immediate, {} deferred, {} resets), {} unchanged",
        summary.total().to_string().bold(),
        summary.immediate.to_string().green(),
        summary.deferred.to_string().yellow(),
        summary.resets.to_string().red(),
        summary.unchanged
    );
    println!("└─────────────────────────────────────────────────────┘");
}

// ============================================================================
// Plan
// ============================================================================

/// Display the remote calls a plan will make
pub fn display_plan(plan: &ApplyPlan) {
    if plan.is_empty() {
        return;
    }

    section(&format!("Plan: {} call(s)", plan.call_count()));

    for (index, batch) in plan.modify.iter().enumerate() {
        let names: Vec<&str> = batch.iter().map(|p| p.name.as_str()).collect();
        println!(
            "  {} modify {}/{} {}",
            "→".cyan(),
            index + 1,
            plan.modify.len(),
            format!("[{}] {}", batch.len(), join_names(&names, 6)).dimmed()
        );
    }

    match &plan.reset {
        ResetPlan::Batches(batches) => {
            for (index, batch) in batches.iter().enumerate() {
                println!(
                    "  {} reset {}/{} {}",
                    "→".cyan(),
                    index + 1,
                    batches.len(),
                    format!("[{}] {}", batch.len(), join_names(batch.items(), 6)).dimmed()
                );
            }
        }
        ResetPlan::All { names } => {
            println!(
                "  {} reset all user parameters {}",
                "→".cyan(),
                format!("[{}]", names.len()).dimmed()
            );
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

fn status_symbol(status: &BatchStatus) -> String {
    match status {
        BatchStatus::Succeeded { .. } => "✓".green().to_string(),
        BatchStatus::Failed(_) => "✗".red().to_string(),
        BatchStatus::NotAttempted => "○".dimmed().to_string(),
        BatchStatus::Skipped { .. } => "⊘".blue().to_string(),
    }
}

fn batch_label(record: &BatchRecord) -> String {
    match record.kind {
        OperationKind::ResetAll => "reset all".to_string(),
        kind => format!("{} {}", kind, record.index + 1),
    }
}

/// Print the per-batch outcome and a final summary
pub fn display_report(report: &OutcomeReport) {
    if report.batches.is_empty() {
        return;
    }

    section("Batches");
    for record in &report.batches {
        let detail = match &record.status {
            BatchStatus::Succeeded { attempts } if *attempts > 1 => {
                format!("after {attempts} attempts")
            }
            BatchStatus::Succeeded { .. } => String::new(),
            BatchStatus::Failed(failure) => {
                format!("{} ({} attempt(s))", failure.message, failure.attempts)
            }
            BatchStatus::NotAttempted => "not attempted".to_string(),
            BatchStatus::Skipped { reason } => reason.clone(),
        };
        println!(
            "  {} {:<12} {:>3} param(s) {}",
            status_symbol(&record.status),
            batch_label(record),
            record.names.len(),
            detail.dimmed()
        );
    }

    let summary = report.summary();
    println!();
    if report.dry_run {
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if report.is_success() {
        println!(
            "  {} Parameter group updated successfully!",
            "✓".green().bold()
        );
    } else {
        println!(
            "  {} Parameter group partially updated",
            "⚠".yellow().bold()
        );
    }

    if summary.succeeded > 0 {
        println!("    • {} batches applied", summary.succeeded);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "batches".red());
    }
    if summary.not_attempted > 0 {
        println!("    • {} batches not attempted", summary.not_attempted);
    }
    if summary.skipped > 0 {
        println!("    • {} batches skipped", summary.skipped);
    }
    if report.cancelled {
        println!("    • {}", "cancelled".yellow());
    }

    let first_failure = report.failed().find_map(|record| match &record.status {
        BatchStatus::Failed(failure) => Some(failure.kind),
        _ => None,
    });
    if let Some(kind) = first_failure {
        println!();
        dim(kind.advice());
    }
}

// ============================================================================
// Live Group
// ============================================================================

/// Display a live parameter group
pub fn display_group(group: &GroupFile) {
    header(&format!("Parameter Group: {}", group.name));
    kv("Family", &group.family);
    kv(
        "Last modified",
        &group
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string()),
    );

    if group.parameters.is_empty() {
        println!();
        dim("No parameters set");
    } else {
        section("Parameters");
        for parameter in &group.parameters {
            let pending = if group.pending_restart.contains(&parameter.name) {
                " [pending-reboot]".yellow().to_string()
            } else {
                String::new()
            };
            let source = format!("{:?}", parameter.provenance).to_lowercase();
            println!(
                "  {:<32} {:<20} {}{}",
                parameter.name,
                parameter.value,
                source.dimmed(),
                pending
            );
        }
    }

    if !group.pending_restart.is_empty() {
        println!();
        warn(&format!(
            "{} parameter(s) wait for a restart: {}",
            group.pending_restart.len(),
            join_names(&group.pending_restart, 8)
        ));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_names_short() {
        assert_eq!(join_names(&["a", "b"], 5), "a, b");
        assert_eq!(join_names::<&str>(&[], 5), "");
    }

    #[test]
    fn test_join_names_elided() {
        let names: Vec<String> = (0..10).map(|i| format!("p{i}")).collect();
        assert_eq!(join_names(&names, 3), "p0, p1, p2, ... and 7 more");
    }

    #[test]
    fn test_batch_label() {
        let record = BatchRecord {
            kind: OperationKind::Modify,
            index: 1,
            names: vec!["a".into()],
            status: BatchStatus::NotAttempted,
        };
        assert_eq!(batch_label(&record), "modify 2");

        let all = BatchRecord {
            kind: OperationKind::ResetAll,
            ..record
        };
        assert_eq!(batch_label(&all), "reset all");
    }
}
