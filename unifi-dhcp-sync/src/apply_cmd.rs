use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use reservation_diff_core::{format_json, ApplyOptions, CancelFlag, Reconciler, RunReport};
use tracing::warn;
use unifi_dhcp_sync::controller::UnifiClient;
use unifi_dhcp_sync::report::{render_plan, render_report};

use crate::cli::{ApplyArgs, OutputFormat};
use crate::open_workspace;

pub fn run_apply(config: &Path, args: ApplyArgs) -> Result<()> {
    let workspace = open_workspace(config)?;
    let env = workspace.registry.resolve(&args.env)?;
    let mut client = UnifiClient::connect(&env)?;

    let reconciler = Reconciler::new(&env).retain_unlisted(args.no_remove);
    let plan = reconciler
        .plan(&workspace.store, &mut client)
        .with_context(|| format!("failed to plan '{}'", env.id))?;

    if args.format == OutputFormat::Text {
        println!("{}", render_plan(&plan, false));
    }

    // Prompt only when the engine would go ahead with the removals.
    let will_remove = !plan.to_remove.is_empty()
        && (!plan.removes_everything || args.allow_full_removal);
    let declined =
        will_remove && !args.yes && !confirm_removals(&env.display_name, plan.to_remove.len())?;

    let report = if declined {
        RunReport::aborted(&plan, "removals not confirmed")
    } else {
        let opts = ApplyOptions {
            allow_full_removal: args.allow_full_removal,
            cancel: cancel_on_interrupt()?,
            ..ApplyOptions::default()
        };
        reconciler.apply(&plan, &mut client, &opts)
    };

    match args.format {
        OutputFormat::Text => println!("{}", render_report(&report)),
        OutputFormat::Json => println!("{}", format_json(&report)),
    }

    if !report.is_success() {
        match &report.abort_reason {
            Some(reason) => bail!("apply {} {}: {reason}", report.environment, report.state),
            None => bail!(
                "apply {} {}: {} failed, {} not attempted",
                report.environment,
                report.state,
                report.failed(),
                report.not_attempted()
            ),
        }
    }
    Ok(())
}

/// Ctrl-C stops the run before its next change; the request in flight completes.
fn cancel_on_interrupt() -> Result<CancelFlag> {
    let cancel = CancelFlag::default();
    let handle = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupted; stopping after the current change");
        handle.cancel();
    })
    .context("failed to install interrupt handler")?;
    Ok(cancel)
}

/// Ask on stderr; anything but an explicit yes declines, including closed stdin.
fn confirm_removals(site: &str, count: usize) -> Result<bool> {
    eprint!("Remove {count} reservations from {site}? [y/N] ");
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
