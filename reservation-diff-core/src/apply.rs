//! Driving a plan to convergence one change at a time.
//!
//! Changes run removals first, then updates, then additions, so an address
//! freed by a removal is available before anything claims it. A failed change
//! is recorded and the run continues; nothing is retried or rolled back. The
//! cancel flag is only checked between changes, which keeps the controller at
//! a prefix of the ordered change list.

use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::environment::{Environment, EnvironmentId};
use crate::plan::{ReconciliationPlan, ReservationUpdate};
use crate::reservation::{MacAddress, Reservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Remove,
    Update,
    Add,
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remove => write!(f, "remove"),
            Self::Update => write!(f, "update"),
            Self::Add => write!(f, "add"),
        }
    }
}

/// One mutation handed to an [`ApplyDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Remove(Reservation),
    Update(ReservationUpdate),
    Add(Reservation),
}

impl Change {
    pub fn mac(&self) -> MacAddress {
        match self {
            Self::Remove(r) | Self::Add(r) => r.mac_address,
            Self::Update(u) => u.mac(),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Remove(_) => ChangeKind::Remove,
            Self::Update(_) => ChangeKind::Update,
            Self::Add(_) => ChangeKind::Add,
        }
    }

    /// Human-readable detail for reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Remove(r) | Self::Add(r) => {
                let mut out = format!("{} {}", r.ip_address, r.hostname);
                if let Some(descr) = &r.description {
                    out.push_str(&format!(" ({descr})"));
                }
                out
            }
            Self::Update(u) => u.describe(),
        }
    }
}

/// Every change of a plan in execution order.
pub fn ordered_changes(plan: &ReconciliationPlan) -> Vec<Change> {
    plan.to_remove
        .iter()
        .cloned()
        .map(Change::Remove)
        .chain(plan.to_update.iter().cloned().map(Change::Update))
        .chain(plan.to_add.iter().cloned().map(Change::Add))
        .collect()
}

/// Result of a single controller mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied,
    Failed(String),
}

/// Issues one mutation against the controller and reports how it went.
///
/// Implementations must not return before the mutation's outcome is known.
pub trait ApplyDriver {
    fn apply_one(&mut self, environment: &Environment, change: &Change) -> ChangeOutcome;
}

/// Final status of one planned change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangeStatus {
    Applied,
    Failed { reason: String },
    PlannedOnly,
    NotAttempted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub mac: MacAddress,
    pub kind: ChangeKind,
    pub detail: String,
    #[serde(flatten)]
    pub status: ChangeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Plan computed, nothing sent.
    Planned,
    Applying,
    Converged,
    PartiallyFailed,
    /// Stopped between changes on request.
    Cancelled,
    /// A precondition failed before any mutation.
    Aborted,
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planned => "planned",
            Self::Applying => "applying",
            Self::Converged => "converged",
            Self::PartiallyFailed => "partially_failed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Aggregate outcome of one run. Lists every planned change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub environment: EnvironmentId,
    pub state: RunState,
    pub dry_run: bool,
    pub changes: Vec<ChangeRecord>,
    pub unchanged: usize,
    pub protected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunReport {
    /// Report for a plan that will not be executed; every change is `NotAttempted`.
    pub fn aborted(plan: &ReconciliationPlan, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let changes = ordered_changes(plan)
            .iter()
            .map(|change| {
                record(
                    change,
                    ChangeStatus::NotAttempted {
                        reason: "run aborted".to_string(),
                    },
                )
            })
            .collect();
        Self {
            environment: plan.environment.clone(),
            state: RunState::Aborted,
            dry_run: false,
            changes,
            unchanged: plan.unchanged.len(),
            protected: plan.protected.len(),
            abort_reason: Some(reason),
        }
    }

    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, ChangeStatus::Applied))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ChangeStatus::Failed { .. }))
    }

    pub fn not_attempted(&self) -> usize {
        self.count(|s| matches!(s, ChangeStatus::NotAttempted { .. }))
    }

    /// Converged, or a dry run that only planned.
    pub fn is_success(&self) -> bool {
        matches!(self.state, RunState::Converged | RunState::Planned)
    }

    fn count(&self, pred: impl Fn(&ChangeStatus) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(&c.status)).count()
    }
}

/// Shared flag that stops a run before its next change.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Report the plan without contacting the driver.
    pub dry_run: bool,
    /// Permit a plan that removes every reservation because desired state is empty.
    pub allow_full_removal: bool,
    pub cancel: CancelFlag,
}

/// Execute `plan` against `environment`, one change at a time.
pub fn apply_plan(
    plan: &ReconciliationPlan,
    environment: &Environment,
    driver: &mut dyn ApplyDriver,
    opts: &ApplyOptions,
) -> RunReport {
    if plan.environment != environment.id {
        warn!(
            plan = %plan.environment,
            target = %environment.id,
            "refusing to apply plan to a different environment"
        );
        return RunReport::aborted(
            plan,
            format!(
                "plan was computed for '{}' but target is '{}'",
                plan.environment, environment.id
            ),
        );
    }

    let changes = ordered_changes(plan);

    if opts.dry_run {
        return RunReport {
            environment: plan.environment.clone(),
            state: RunState::Planned,
            dry_run: true,
            changes: changes
                .iter()
                .map(|c| record(c, ChangeStatus::PlannedOnly))
                .collect(),
            unchanged: plan.unchanged.len(),
            protected: plan.protected.len(),
            abort_reason: None,
        };
    }

    if plan.removes_everything && !opts.allow_full_removal {
        warn!(
            environment = %environment.id,
            count = plan.to_remove.len(),
            "desired state is empty; refusing to remove every reservation"
        );
        return RunReport::aborted(
            plan,
            format!(
                "desired state is empty and the plan removes all {} reservations",
                plan.to_remove.len()
            ),
        );
    }

    debug!(environment = %environment.id, from = %RunState::Planned, to = %RunState::Applying);
    let mut records = Vec::with_capacity(changes.len());
    let mut cancelled = false;

    for change in &changes {
        if cancelled || opts.cancel.is_cancelled() {
            cancelled = true;
            records.push(record(
                change,
                ChangeStatus::NotAttempted {
                    reason: "run cancelled".to_string(),
                },
            ));
            continue;
        }

        let status = match driver.apply_one(environment, change) {
            ChangeOutcome::Applied => {
                info!(
                    environment = %environment.id,
                    mac = %change.mac(),
                    kind = %change.kind(),
                    "applied"
                );
                ChangeStatus::Applied
            }
            ChangeOutcome::Failed(reason) => {
                warn!(
                    environment = %environment.id,
                    mac = %change.mac(),
                    kind = %change.kind(),
                    %reason,
                    "change failed"
                );
                ChangeStatus::Failed { reason }
            }
        };
        records.push(record(change, status));
    }

    let any_failed = records
        .iter()
        .any(|r| matches!(r.status, ChangeStatus::Failed { .. }));
    let state = if cancelled {
        RunState::Cancelled
    } else if any_failed {
        RunState::PartiallyFailed
    } else {
        RunState::Converged
    };
    debug!(environment = %environment.id, from = %RunState::Applying, to = %state);

    RunReport {
        environment: plan.environment.clone(),
        state,
        dry_run: false,
        changes: records,
        unchanged: plan.unchanged.len(),
        protected: plan.protected.len(),
        abort_reason: None,
    }
}

fn record(change: &Change, status: ChangeStatus) -> ChangeRecord {
    ChangeRecord {
        mac: change.mac(),
        kind: change.kind(),
        detail: change.describe(),
        status,
    }
}
