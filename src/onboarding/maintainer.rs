//! Consistency maintainer — recomputes and stores the derived status inside
//! the unit of work of the mutation that invalidated it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::{EmployeeOnboarding, UnitOfWork};

use super::catalog::StepCatalog;
use super::profile::RequiredFieldSet;
use super::status::{AggregateInputs, DerivedOnboardingStatus, compute};

/// The only writer of `DerivedOnboardingStatus` rows.
#[derive(Debug, Clone)]
pub struct ConsistencyMaintainer {
    catalog: Arc<StepCatalog>,
    fields: RequiredFieldSet,
}

impl ConsistencyMaintainer {
    pub fn new(catalog: Arc<StepCatalog>, fields: RequiredFieldSet) -> Self {
        Self { catalog, fields }
    }

    pub fn fields(&self) -> &RequiredFieldSet {
        &self.fields
    }

    /// Recompute from the unit of work's current (uncommitted) view and
    /// overwrite the stored status. Commits together with the caller's writes.
    pub async fn refresh(
        &self,
        uow: &mut dyn UnitOfWork,
        now: DateTime<Utc>,
    ) -> Result<DerivedOnboardingStatus, DatabaseError> {
        let employee_id = uow.employee_id();
        let state = EmployeeOnboarding {
            progress: uow.load_progress().await?,
            profile: uow.load_profile().await?,
            status: uow.load_status().await?,
        };

        let status = self.compute(&state, now);
        uow.save_status(&status).await?;

        let was_onboarded = state.status.as_ref().is_some_and(|s| s.is_onboarded);
        match (was_onboarded, status.is_onboarded) {
            (false, true) => info!(%employee_id, "Employee completed onboarding"),
            (true, false) => info!(%employee_id, "Employee no longer onboarded"),
            _ => debug!(
                %employee_id,
                completed = status.completed_steps,
                total = status.total_steps,
                percentage = status.percentage,
                "Onboarding status refreshed"
            ),
        }
        Ok(status)
    }

    /// Pure recomputation over an already loaded state.
    pub fn compute(&self, state: &EmployeeOnboarding, now: DateTime<Utc>) -> DerivedOnboardingStatus {
        compute(AggregateInputs {
            catalog: &self.catalog,
            records: &state.progress,
            snapshot: &state.profile,
            fields: &self.fields,
            previous_completed_at: state
                .status
                .as_ref()
                .and_then(|s| s.onboarding_completed_at),
            now,
        })
    }
}
