use std::path::Path;

use anyhow::{Context, Result};
use reservation_diff_core::Reconciler;
use unifi_dhcp_sync::controller::UnifiClient;
use unifi_dhcp_sync::report::render_reservations;

use crate::cli::{ListArgs, OutputFormat};
use crate::open_workspace;

pub fn run_list(config: &Path, args: ListArgs) -> Result<()> {
    let workspace = open_workspace(config)?;
    let env = workspace.registry.resolve(&args.env)?;
    let mut client = UnifiClient::connect(&env)?;

    let observed = Reconciler::new(&env)
        .fetch_observed(&mut client)
        .with_context(|| format!("failed to list reservations for '{}'", env.id))?;

    match args.format {
        OutputFormat::Text => println!("{}", render_reservations(&observed)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&observed.to_raw())?),
    }
    Ok(())
}
