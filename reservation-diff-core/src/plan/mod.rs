//! Three-way classification of desired against observed reservations.

pub mod engine;
pub mod result;

pub use engine::{plan, plan_with_options, PlanOptions};
pub use result::{FieldChange, ReconciliationPlan, ReservationField, ReservationUpdate};
