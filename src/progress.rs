//! Progress bar for batch application

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use paramkit::{BatchContext, BatchRecord, BatchStatus, Error, OperationKind, ProgressCallback};
use std::time::Duration;

/// Drives an `indicatif` bar from apply progress events
pub struct BarProgress {
    bar: Option<ProgressBar>,
    hidden: bool,
}

impl BarProgress {
    /// Create a progress reporter; `hidden` suppresses the bar entirely
    pub fn new(hidden: bool) -> Self {
        Self { bar: None, hidden }
    }
}

impl ProgressCallback for BarProgress {
    fn on_start(&mut self, total_batches: usize) {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total_batches as u64)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_batch_start(&mut self, ctx: &BatchContext<'_>, size: usize) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!(
                "{} {}/{} ({size} params)",
                ctx.kind,
                ctx.index + 1,
                ctx.total
            ));
        }
    }

    fn on_retry(&mut self, kind: OperationKind, index: usize, error: &Error, delay: Duration) {
        if let Some(bar) = &self.bar {
            bar.suspend(|| {
                println!(
                    "  {} {} {} failed: {} (retrying in {:.1}s)",
                    "↻".yellow(),
                    kind,
                    index + 1,
                    error,
                    delay.as_secs_f64()
                );
            });
        }
    }

    fn on_batch_complete(&mut self, record: &BatchRecord) {
        if let Some(bar) = &self.bar {
            if let BatchStatus::Failed(failure) = &record.status {
                bar.suspend(|| {
                    println!(
                        "  {} {} {}: {}",
                        "✗".red(),
                        record.kind,
                        record.index + 1,
                        failure.message
                    );
                });
            }
            bar.inc(1);
        }
    }

    fn on_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
