use crate::apply::{ordered_changes, Change, ChangeStatus, RunReport};
use crate::plan::ReconciliationPlan;
use crate::reservation::Reservation;

/// Format a plan as plain text, one line per change in execution order.
///
/// Prefixes: `-` remove, `~` update (followed by per-field lines), `+` add,
/// `=` unchanged, `!` warning.
pub fn format_plan_text(plan: &ReconciliationPlan, include_unchanged: bool) -> String {
    let mut lines = Vec::new();
    if plan.removes_everything {
        lines.push(format!(
            "! desired state is empty: plan removes all {} reservations in {}",
            plan.to_remove.len(),
            plan.environment
        ));
    }

    for change in ordered_changes(plan) {
        match &change {
            Change::Remove(r) => lines.push(format!("- {}", reservation_line(r))),
            Change::Add(r) => lines.push(format!("+ {}", reservation_line(r))),
            Change::Update(u) => {
                lines.push(format!("~ {} {}", u.mac(), u.after.hostname));
                for field in &u.changes {
                    lines.push(format!(
                        "  {}: {} -> {}",
                        field.field, field.before, field.after
                    ));
                }
            }
        }
    }

    if include_unchanged {
        for r in &plan.unchanged {
            if plan.protected.contains(&r.mac_address) {
                lines.push(format!("= {} [protected]", reservation_line(r)));
            } else {
                lines.push(format!("= {}", reservation_line(r)));
            }
        }
    }

    if lines.is_empty() {
        lines.push(format!("= {} is in sync", plan.environment));
    }
    lines.join("\n")
}

/// Format bucket counts on one line.
pub fn format_plan_summary(plan: &ReconciliationPlan) -> String {
    format!(
        "environment={} add={} remove={} update={} unchanged={} protected={}",
        plan.environment,
        plan.to_add.len(),
        plan.to_remove.len(),
        plan.to_update.len(),
        plan.unchanged.len(),
        plan.protected.len()
    )
}

/// Format a run report: every planned change with its outcome, then a result line.
pub fn format_report_text(report: &RunReport) -> String {
    let mut lines = Vec::with_capacity(report.changes.len() + 2);
    for change in &report.changes {
        let line = match &change.status {
            ChangeStatus::Applied => {
                format!("APPLIED {} {} {}", change.kind, change.mac, change.detail)
            }
            ChangeStatus::Failed { reason } => format!(
                "FAILED {} {} {}: {reason}",
                change.kind, change.mac, change.detail
            ),
            ChangeStatus::PlannedOnly => {
                format!("PLANNED {} {} {}", change.kind, change.mac, change.detail)
            }
            ChangeStatus::NotAttempted { reason } => format!(
                "SKIPPED {} {} {} ({reason})",
                change.kind, change.mac, change.detail
            ),
        };
        lines.push(line);
    }

    if let Some(reason) = &report.abort_reason {
        lines.push(format!("aborted: {reason}"));
    }
    lines.push(format!(
        "result environment={} state={} applied={} failed={} not_attempted={} unchanged={} protected={}",
        report.environment,
        report.state,
        report.applied(),
        report.failed(),
        report.not_attempted(),
        report.unchanged,
        report.protected
    ));
    lines.join("\n")
}

fn reservation_line(r: &Reservation) -> String {
    let mut out = format!("{} {} {}", r.mac_address, r.ip_address, r.hostname);
    if let Some(descr) = &r.description {
        out.push_str(&format!(" ({descr})"));
    }
    out
}
