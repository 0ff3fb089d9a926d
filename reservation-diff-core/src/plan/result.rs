use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::environment::EnvironmentId;
use crate::reservation::{MacAddress, Reservation};

/// Non-key field of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationField {
    IpAddress,
    Hostname,
    Description,
}

impl Display for ReservationField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpAddress => write!(f, "ip_address"),
            Self::Hostname => write!(f, "hostname"),
            Self::Description => write!(f, "description"),
        }
    }
}

/// Old and new value of one differing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: ReservationField,
    pub before: String,
    pub after: String,
}

/// A reservation present on both sides whose fields differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationUpdate {
    /// Observed value.
    pub before: Reservation,
    /// Desired value.
    pub after: Reservation,
    pub changes: Vec<FieldChange>,
}

impl ReservationUpdate {
    pub fn mac(&self) -> MacAddress {
        self.after.mac_address
    }

    /// `ip_address: 10.0.0.1 -> 10.0.0.2, hostname: a -> b`
    pub fn describe(&self) -> String {
        self.changes
            .iter()
            .map(|c| format!("{}: {} -> {}", c.field, c.before, c.after))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Changes needed to move one environment's observed state to its desired state.
///
/// Buckets are pairwise disjoint by MAC, each sorted by MAC, and together cover
/// every MAC seen on either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub environment: EnvironmentId,
    pub to_add: Vec<Reservation>,
    pub to_remove: Vec<Reservation>,
    pub to_update: Vec<ReservationUpdate>,
    pub unchanged: Vec<Reservation>,
    /// Observed-only MACs kept by the removal guard. Subset of `unchanged`.
    pub protected: Vec<MacAddress>,
    /// Desired state is empty and the plan removes every observed reservation.
    pub removes_everything: bool,
}

impl ReconciliationPlan {
    /// True when there is nothing to send to the controller.
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }

    pub fn change_count(&self) -> usize {
        self.to_add.len() + self.to_remove.len() + self.to_update.len()
    }
}
