use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "unifi-dhcp-sync")]
#[command(about = "Sync UniFi DHCP reservations with desired state, one environment at a time")]
pub struct Cli {
    /// Configuration file listing the environments.
    #[arg(long, global = true, default_value = "unifi-sync.toml")]
    pub config: PathBuf,
    /// Increase log detail on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// List configured environments.
    Environments(EnvironmentsArgs),
    /// Check that an environment's API key is accepted.
    Check(EnvArgs),
    /// Show the reservations a controller currently holds.
    List(ListArgs),
    /// Record live reservations as the environment's desired state.
    Pull(EnvArgs),
    /// Show what apply would change, without changing anything.
    Plan(PlanArgs),
    /// Converge an environment's controller to its desired state.
    Apply(ApplyArgs),
}

#[derive(Parser, Debug)]
pub struct EnvironmentsArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct EnvArgs {
    #[arg(long = "env")]
    pub env: String,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    #[arg(long = "env")]
    pub env: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Environments to plan; repeat or pass several to plan them in parallel.
    #[arg(long = "env", required = true, num_args = 1..)]
    pub envs: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Print only bucket counts.
    #[arg(long)]
    pub summary: bool,
    /// Also list reservations that need no change.
    #[arg(long)]
    pub unchanged: bool,
    /// Never plan removals; reservations missing from desired state are kept.
    #[arg(long)]
    pub no_remove: bool,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    #[arg(long = "env")]
    pub env: String,
    /// Do not ask before removing reservations.
    #[arg(short, long)]
    pub yes: bool,
    /// Never remove reservations; only add and update.
    #[arg(long)]
    pub no_remove: bool,
    /// Permit removing every reservation when desired state is empty.
    #[arg(long)]
    pub allow_full_removal: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
