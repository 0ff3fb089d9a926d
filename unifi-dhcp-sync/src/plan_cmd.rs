use std::path::Path;
use std::thread;

use anyhow::{anyhow, bail, Result};
use reservation_diff_core::{
    format_json, Environment, JsonFileStore, Reconciler, ReconciliationPlan,
};
use unifi_dhcp_sync::controller::UnifiClient;
use unifi_dhcp_sync::report::{render_plan, render_plan_summary};

use crate::cli::{OutputFormat, PlanArgs};
use crate::open_workspace;

/// Plan every requested environment. Each runs on its own thread with its own
/// client; nothing is shared between them but the read-only store.
pub fn run_plan(config: &Path, args: PlanArgs) -> Result<()> {
    let workspace = open_workspace(config)?;

    // Resolve everything first so a typo fails before any controller is contacted.
    let environments = args
        .envs
        .iter()
        .map(|id| workspace.registry.resolve(id))
        .collect::<Result<Vec<_>, _>>()?;

    let store = &workspace.store;
    let no_remove = args.no_remove;
    let results: Vec<Result<ReconciliationPlan>> = thread::scope(|scope| {
        let handles: Vec<_> = environments
            .iter()
            .map(|env| scope.spawn(move || plan_one(env, store, no_remove)))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(anyhow!("planning thread panicked")))
            })
            .collect()
    });

    let mut plans = Vec::new();
    let mut failures = 0;
    for (env, result) in environments.iter().zip(results) {
        match result {
            Ok(plan) => plans.push(plan),
            Err(err) => {
                failures += 1;
                eprintln!("error: {}: {err:#}", env.id);
            }
        }
    }

    let multiple = environments.len() > 1;
    match args.format {
        OutputFormat::Json => println!("{}", format_json(&plans)),
        OutputFormat::Text => {
            for plan in &plans {
                if args.summary {
                    println!("{}", render_plan_summary(plan));
                    continue;
                }
                if multiple {
                    println!("## {}", plan.environment);
                }
                println!("{}", render_plan(plan, args.unchanged));
                println!("{}", render_plan_summary(plan));
            }
        }
    }

    if failures > 0 {
        bail!("planning failed for {failures} of {} environments", environments.len());
    }
    Ok(())
}

fn plan_one(
    env: &Environment,
    store: &JsonFileStore,
    no_remove: bool,
) -> Result<ReconciliationPlan> {
    let mut client = UnifiClient::connect(env)?;
    let plan = Reconciler::new(env)
        .retain_unlisted(no_remove)
        .plan(store, &mut client)?;
    Ok(plan)
}
