//! Per-environment pipeline: load desired, fetch observed, plan, apply or import.

use tracing::{debug, info};

use crate::apply::{apply_plan, ApplyDriver, ApplyOptions, RunReport};
use crate::environment::Environment;
use crate::error::{BoxError, ReconcileError, StateSide};
use crate::plan::{plan_with_options, PlanOptions, ReconciliationPlan};
use crate::reservation::{RawReservation, ReservationSet};
use crate::store::{DesiredStateStore, StoreError};

/// Live state returned by a fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observed {
    /// False when the controller has no site for the environment.
    pub site_found: bool,
    pub reservations: Vec<RawReservation>,
}

/// Reads the reservations a controller currently holds for one environment.
pub trait ObservedStateFetcher {
    fn fetch(&mut self, environment: &Environment) -> Result<Observed, BoxError>;
}

/// Result of importing live state into the desired-state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    /// How the stored file changed: `to_add` are newly recorded reservations.
    pub plan: ReconciliationPlan,
    pub saved: usize,
}

/// Reconciliation for exactly one environment.
pub struct Reconciler<'a> {
    environment: &'a Environment,
    options: PlanOptions,
}

impl<'a> Reconciler<'a> {
    /// Plan options start from the environment's protected prefixes.
    pub fn new(environment: &'a Environment) -> Self {
        Self {
            environment,
            options: PlanOptions {
                protected_prefixes: environment.protected_prefixes.clone(),
                retain_unlisted: false,
            },
        }
    }

    /// Keep observed reservations missing from desired state instead of removing them.
    pub fn retain_unlisted(mut self, retain: bool) -> Self {
        self.options.retain_unlisted = retain;
        self
    }

    /// Load and validate desired state.
    ///
    /// # Errors
    ///
    /// Store errors, [`ReconcileError::MalformedAddress`] and
    /// [`ReconcileError::DuplicateReservation`].
    pub fn load_desired(
        &self,
        store: &dyn DesiredStateStore,
    ) -> Result<ReservationSet, ReconcileError> {
        let raw = store.load(&self.environment.id)?;
        let desired = ReservationSet::from_raw(StateSide::Desired, &raw)?;
        debug!(environment = %self.environment.id, count = desired.len(), "loaded desired state");
        Ok(desired)
    }

    /// Fetch and validate observed state.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::Fetch`] on transport failure,
    /// [`ReconcileError::EnvironmentNotFound`] when the site is missing, and
    /// validation errors for the returned records.
    pub fn fetch_observed(
        &self,
        fetcher: &mut dyn ObservedStateFetcher,
    ) -> Result<ReservationSet, ReconcileError> {
        let observed = fetcher
            .fetch(self.environment)
            .map_err(|source| ReconcileError::Fetch {
                environment: self.environment.id.clone(),
                source,
            })?;
        if !observed.site_found {
            return Err(ReconcileError::EnvironmentNotFound(
                self.environment.id.clone(),
            ));
        }
        let set = ReservationSet::from_raw(StateSide::Observed, &observed.reservations)?;
        debug!(environment = %self.environment.id, count = set.len(), "fetched observed state");
        Ok(set)
    }

    /// Compute the plan. Desired state is validated before the controller is contacted.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::load_desired`] or [`Self::fetch_observed`].
    pub fn plan(
        &self,
        store: &dyn DesiredStateStore,
        fetcher: &mut dyn ObservedStateFetcher,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        let desired = self.load_desired(store)?;
        let observed = self.fetch_observed(fetcher)?;
        Ok(self.plan_sets(&desired, &observed))
    }

    pub fn plan_sets(
        &self,
        desired: &ReservationSet,
        observed: &ReservationSet,
    ) -> ReconciliationPlan {
        let plan = plan_with_options(&self.environment.id, desired, observed, &self.options);
        info!(
            environment = %self.environment.id,
            add = plan.to_add.len(),
            remove = plan.to_remove.len(),
            update = plan.to_update.len(),
            unchanged = plan.unchanged.len(),
            "planned"
        );
        plan
    }

    /// Execute a plan produced by this reconciler.
    pub fn apply(
        &self,
        plan: &ReconciliationPlan,
        driver: &mut dyn ApplyDriver,
        opts: &ApplyOptions,
    ) -> RunReport {
        apply_plan(plan, self.environment, driver, opts)
    }

    /// Record live state as the new desired baseline.
    ///
    /// A missing store file counts as an empty baseline; an unreadable or
    /// invalid one is an error and nothing is written.
    ///
    /// # Errors
    ///
    /// Store, fetch and validation errors.
    pub fn import(
        &self,
        store: &dyn DesiredStateStore,
        fetcher: &mut dyn ObservedStateFetcher,
    ) -> Result<ImportOutcome, ReconcileError> {
        let previous = match self.load_desired(store) {
            Ok(set) => set,
            Err(ReconcileError::Store(StoreError::Missing { .. })) => ReservationSet::new(),
            Err(err) => return Err(err),
        };
        let observed = self.fetch_observed(fetcher)?;

        // The file moves toward the controller, so observed plays "desired" here.
        let plan = plan_with_options(
            &self.environment.id,
            &observed,
            &previous,
            &PlanOptions::default(),
        );
        store.save(&self.environment.id, &observed)?;
        info!(
            environment = %self.environment.id,
            saved = observed.len(),
            "imported observed state"
        );

        Ok(ImportOutcome {
            plan,
            saved: observed.len(),
        })
    }
}
