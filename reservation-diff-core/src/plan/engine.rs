use crate::environment::EnvironmentId;
use crate::plan::result::{FieldChange, ReconciliationPlan, ReservationField, ReservationUpdate};
use crate::reservation::{MacPrefix, Reservation, ReservationSet};

/// Configures which observed-only reservations survive planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Observed-only reservations under these prefixes are kept.
    pub protected_prefixes: Vec<MacPrefix>,
    /// Keep every observed-only reservation (additive mode).
    pub retain_unlisted: bool,
}

impl PlanOptions {
    fn retains(&self, reservation: &Reservation) -> bool {
        self.retain_unlisted
            || self
                .protected_prefixes
                .iter()
                .any(|p| p.matches(&reservation.mac_address))
    }
}

/// Plan with default options: everything absent from desired is removed.
pub fn plan(
    environment: &EnvironmentId,
    desired: &ReservationSet,
    observed: &ReservationSet,
) -> ReconciliationPlan {
    plan_with_options(environment, desired, observed, &PlanOptions::default())
}

/// Classify every MAC on either side into exactly one bucket.
pub fn plan_with_options(
    environment: &EnvironmentId,
    desired: &ReservationSet,
    observed: &ReservationSet,
    opts: &PlanOptions,
) -> ReconciliationPlan {
    let mut to_add = Vec::new();
    let mut to_update = Vec::new();
    let mut unchanged = Vec::new();
    let mut to_remove = Vec::new();
    let mut protected = Vec::new();

    for wanted in desired.iter() {
        match observed.get(&wanted.mac_address) {
            None => to_add.push(wanted.clone()),
            Some(current) => {
                let changes = field_changes(current, wanted);
                if changes.is_empty() {
                    unchanged.push(wanted.clone());
                } else {
                    to_update.push(ReservationUpdate {
                        before: current.clone(),
                        after: wanted.clone(),
                        changes,
                    });
                }
            }
        }
    }

    for current in observed.iter() {
        if desired.contains(&current.mac_address) {
            continue;
        }
        if opts.retains(current) {
            protected.push(current.mac_address);
            unchanged.push(current.clone());
        } else {
            to_remove.push(current.clone());
        }
    }

    // Both loops walk MAC order, but retained entries interleave with matched ones.
    unchanged.sort_by(|a, b| a.mac_address.cmp(&b.mac_address));

    let removes_everything = desired.is_empty() && !to_remove.is_empty();

    ReconciliationPlan {
        environment: environment.clone(),
        to_add,
        to_remove,
        to_update,
        unchanged,
        protected,
        removes_everything,
    }
}

fn field_changes(current: &Reservation, wanted: &Reservation) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if current.ip_address != wanted.ip_address {
        changes.push(FieldChange {
            field: ReservationField::IpAddress,
            before: current.ip_address.to_string(),
            after: wanted.ip_address.to_string(),
        });
    }
    if current.hostname != wanted.hostname {
        changes.push(FieldChange {
            field: ReservationField::Hostname,
            before: current.hostname.clone(),
            after: wanted.hostname.clone(),
        });
    }
    if current.description != wanted.description {
        changes.push(FieldChange {
            field: ReservationField::Description,
            before: current.description.clone().unwrap_or_default(),
            after: wanted.description.clone().unwrap_or_default(),
        });
    }
    changes
}
