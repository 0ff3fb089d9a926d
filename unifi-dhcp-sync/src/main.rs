use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use reservation_diff_core::ProcessEnv;
use tracing_subscriber::EnvFilter;
use unifi_dhcp_sync::config::Workspace;
use unifi_dhcp_sync::controller::UnifiClient;
use unifi_dhcp_sync::report::render_environments;

mod apply_cmd;
mod cli;
mod list_cmd;
mod plan_cmd;
mod pull_cmd;

use cli::{Cli, Command, EnvArgs, EnvironmentsArgs, OutputFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Environments(args) => run_environments(&cli.config, args),
        Command::Check(args) => run_check(&cli.config, args),
        Command::List(args) => list_cmd::run_list(&cli.config, args),
        Command::Pull(args) => pull_cmd::run_pull(&cli.config, args),
        Command::Plan(args) => plan_cmd::run_plan(&cli.config, args),
        Command::Apply(args) => apply_cmd::run_apply(&cli.config, args),
    }
}

/// Diagnostics go to stderr; stdout carries only reports.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Open the configuration with secrets from the process environment.
pub(crate) fn open_workspace(config: &Path) -> Result<Workspace> {
    Ok(Workspace::open(config, Box::new(ProcessEnv))?)
}

fn run_environments(config: &Path, args: EnvironmentsArgs) -> Result<()> {
    let workspace = open_workspace(config)?;
    let configs = workspace.registry.configs();
    match args.format {
        OutputFormat::Text => println!("{}", render_environments(configs)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(configs)?),
    }
    Ok(())
}

fn run_check(config: &Path, args: EnvArgs) -> Result<()> {
    let workspace = open_workspace(config)?;
    let env = workspace.registry.resolve(&args.env)?;
    let client = UnifiClient::connect(&env)?;
    client
        .check_connection()
        .with_context(|| format!("connection check failed for '{}'", env.id))?;
    println!("ok environment={} url={}", env.id, env.connection.base_url);
    Ok(())
}
