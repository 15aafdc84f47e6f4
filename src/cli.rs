use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paramsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile database parameter groups with a desired state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the changes and batches needed to reach the desired state
    Plan(PlanArgs),

    /// Apply the desired state to the live parameter group
    Apply(ApplyArgs),

    /// Show the live parameter group
    Show(ShowArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Command Arguments
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Desired state file (TOML)
    pub desired: PathBuf,

    /// Live parameter group file (TOML)
    #[arg(short, long, env = "PARAMSYNC_STATE")]
    pub state: PathBuf,

    /// Print the change set and plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Desired state file (TOML)
    pub desired: PathBuf,

    /// Live parameter group file (TOML)
    #[arg(short, long, env = "PARAMSYNC_STATE")]
    pub state: PathBuf,

    /// Show what would happen without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the outcome report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Live parameter group file (TOML)
    #[arg(short, long, env = "PARAMSYNC_STATE")]
    pub state: PathBuf,

    /// Print the group as JSON
    #[arg(long)]
    pub json: bool,
}
