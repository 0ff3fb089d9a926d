use std::path::Path;

use anyhow::{Context, Result};
use reservation_diff_core::Reconciler;
use unifi_dhcp_sync::controller::UnifiClient;
use unifi_dhcp_sync::report::render_plan;

use crate::cli::EnvArgs;
use crate::open_workspace;

/// Fetch live reservations and store them as the environment's desired state.
pub fn run_pull(config: &Path, args: EnvArgs) -> Result<()> {
    let workspace = open_workspace(config)?;
    let env = workspace.registry.resolve(&args.env)?;
    let mut client = UnifiClient::connect(&env)?;

    let outcome = Reconciler::new(&env)
        .import(&workspace.store, &mut client)
        .with_context(|| format!("failed to pull reservations for '{}'", env.id))?;

    println!("{}", render_plan(&outcome.plan, false));
    println!(
        "saved {} reservations to {}",
        outcome.saved,
        workspace.store.path_for(&env.id).display()
    );
    Ok(())
}
