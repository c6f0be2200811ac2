//! Store traits — backend-agnostic persistence for onboarding state.
//!
//! All writes go through a [`UnitOfWork`]: one exclusive, atomic unit per
//! employee. A step advance or profile edit and the status recomputation it
//! triggers share one unit, so they commit or roll back together.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::profile::ProfileSnapshot;
use crate::onboarding::state::StepProgressRecord;
use crate::onboarding::status::DerivedOnboardingStatus;

/// Consistent view of one employee's onboarding data.
#[derive(Debug, Clone, Default)]
pub struct EmployeeOnboarding {
    pub progress: Vec<StepProgressRecord>,
    pub profile: ProfileSnapshot,
    pub status: Option<DerivedOnboardingStatus>,
}

impl EmployeeOnboarding {
    /// No progress, no status and a blank profile.
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty() && self.status.is_none() && self.profile == ProfileSnapshot::default()
    }
}

/// A stored status row, as listed for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub employee_id: Uuid,
    #[serde(flatten)]
    pub status: DerivedOnboardingStatus,
}

/// Backend-agnostic onboarding store.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    /// Open an exclusive unit of work for `employee_id`. Units for the same
    /// employee are serialized; units for different employees do not share
    /// any rows.
    async fn begin(&self, employee_id: Uuid) -> Result<Box<dyn UnitOfWork>, DatabaseError>;

    /// Read one employee's committed state as a single consistent snapshot.
    async fn read(&self, employee_id: Uuid) -> Result<EmployeeOnboarding, DatabaseError>;

    /// Employees with progress records or a status row.
    async fn list_employees(&self) -> Result<Vec<Uuid>, DatabaseError>;

    /// All stored status rows.
    async fn list_statuses(&self) -> Result<Vec<StatusEntry>, DatabaseError>;
}

/// Atomic unit of work scoped to one employee.
///
/// Nothing is visible to other readers until [`UnitOfWork::commit`]. Dropping
/// a unit without committing discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    fn employee_id(&self) -> Uuid;

    async fn load_progress(&mut self) -> Result<Vec<StepProgressRecord>, DatabaseError>;

    async fn insert_progress(&mut self, records: &[StepProgressRecord])
    -> Result<(), DatabaseError>;

    async fn update_progress(&mut self, record: &StepProgressRecord) -> Result<(), DatabaseError>;

    async fn load_profile(&mut self) -> Result<ProfileSnapshot, DatabaseError>;

    async fn save_profile(&mut self, profile: &ProfileSnapshot) -> Result<(), DatabaseError>;

    async fn load_status(&mut self) -> Result<Option<DerivedOnboardingStatus>, DatabaseError>;

    async fn save_status(&mut self, status: &DerivedOnboardingStatus) -> Result<(), DatabaseError>;

    /// Remove progress, profile and status for the employee.
    async fn delete_employee(&mut self) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}
