//! Reconciliation of DHCP static reservations between desired and observed state.
//!
//! Reservations are keyed by canonical MAC address. A plan classifies every
//! MAC into exactly one of add, remove, update or unchanged, and the apply
//! step drives a plan through an [`ApplyDriver`] one change at a time. Each
//! run is scoped to a single [`Environment`].

pub mod apply;
pub mod environment;
pub mod error;
pub mod format;
pub mod plan;
pub mod reconciler;
pub mod reservation;
pub mod store;

pub use apply::{
    apply_plan, ordered_changes, ApplyDriver, ApplyOptions, CancelFlag, Change, ChangeKind,
    ChangeOutcome, ChangeRecord, ChangeStatus, RunReport, RunState,
};
pub use environment::{
    Connection, Credential, Environment, EnvironmentConfig, EnvironmentId, EnvironmentRegistry,
    ProcessEnv, SecretSource,
};
pub use error::{AddressField, BoxError, ReconcileError, StateSide};
pub use format::{format_json, format_plan_summary, format_plan_text, format_report_text};
pub use plan::{
    plan, plan_with_options, FieldChange, PlanOptions, ReconciliationPlan, ReservationField,
    ReservationUpdate,
};
pub use reconciler::{ImportOutcome, Observed, ObservedStateFetcher, Reconciler};
pub use reservation::{MacAddress, MacPrefix, RawReservation, Reservation, ReservationSet};
pub use store::{DesiredStateStore, JsonFileStore, StoreError};
