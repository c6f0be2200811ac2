//! In-memory store — per-employee locking, copy-on-write units of work.
//!
//! Each employee's data sits behind its own `tokio::sync::Mutex`. A unit of
//! work holds that lock for its lifetime and edits a private copy, which
//! replaces the shared data only on commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::profile::ProfileSnapshot;
use crate::onboarding::state::StepProgressRecord;
use crate::onboarding::status::DerivedOnboardingStatus;
use crate::store::traits::{EmployeeOnboarding, OnboardingStore, StatusEntry, UnitOfWork};

type Slot = Arc<AsyncMutex<EmployeeOnboarding>>;
type SlotMap = Arc<Mutex<HashMap<Uuid, Slot>>>;

/// Process-local onboarding store.
#[derive(Default)]
pub struct MemoryStore {
    employees: SlotMap,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `employee_id`, created on first use.
    fn slot(&self, employee_id: Uuid) -> Result<Slot, DatabaseError> {
        let mut employees = self.employees.lock().map_err(poisoned)?;
        Ok(Arc::clone(employees.entry(employee_id).or_default()))
    }

    fn existing_slot(&self, employee_id: Uuid) -> Result<Option<Slot>, DatabaseError> {
        let employees = self.employees.lock().map_err(poisoned)?;
        Ok(employees.get(&employee_id).cloned())
    }

    fn all_slots(&self) -> Result<Vec<(Uuid, Slot)>, DatabaseError> {
        let employees = self.employees.lock().map_err(poisoned)?;
        Ok(employees
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> DatabaseError {
    DatabaseError::Pool("memory store index lock poisoned".to_string())
}

/// Whether `slot` is still the live slot for `employee_id`.
fn is_live(employees: &SlotMap, employee_id: Uuid, slot: &Slot) -> Result<bool, DatabaseError> {
    let employees = employees.lock().map_err(poisoned)?;
    Ok(employees
        .get(&employee_id)
        .is_some_and(|live| Arc::ptr_eq(live, slot)))
}

/// Drop the slot for `employee_id` if it holds nothing. Must be called with
/// the slot's lock held, so no unit can be mid-edit on it.
fn release_if_empty(
    employees: &SlotMap,
    employee_id: Uuid,
    slot: &Slot,
    state: &EmployeeOnboarding,
) -> Result<(), DatabaseError> {
    if !state.is_empty() {
        return Ok(());
    }
    let mut employees = employees.lock().map_err(poisoned)?;
    if employees
        .get(&employee_id)
        .is_some_and(|live| Arc::ptr_eq(live, slot))
    {
        employees.remove(&employee_id);
        debug!(%employee_id, "Released empty memory slot");
    }
    Ok(())
}

#[async_trait]
impl OnboardingStore for MemoryStore {
    async fn begin(&self, employee_id: Uuid) -> Result<Box<dyn UnitOfWork>, DatabaseError> {
        loop {
            let slot = self.slot(employee_id)?;
            let guard = Arc::clone(&slot).lock_owned().await;
            // The slot may have been released while we waited for it.
            if !is_live(&self.employees, employee_id, &slot)? {
                continue;
            }
            let working = (*guard).clone();
            debug!(%employee_id, "Memory unit of work opened");
            return Ok(Box::new(MemoryUnit {
                employee_id,
                employees: Arc::clone(&self.employees),
                slot,
                guard,
                working,
            }));
        }
    }

    async fn read(&self, employee_id: Uuid) -> Result<EmployeeOnboarding, DatabaseError> {
        match self.existing_slot(employee_id)? {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(EmployeeOnboarding::default()),
        }
    }

    async fn list_employees(&self) -> Result<Vec<Uuid>, DatabaseError> {
        let mut ids = Vec::new();
        for (id, slot) in self.all_slots()? {
            let state = slot.lock().await;
            if !state.progress.is_empty() || state.status.is_some() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn list_statuses(&self) -> Result<Vec<StatusEntry>, DatabaseError> {
        let mut entries = Vec::new();
        for (employee_id, slot) in self.all_slots()? {
            if let Some(status) = slot.lock().await.status.clone() {
                entries.push(StatusEntry {
                    employee_id,
                    status,
                });
            }
        }
        entries.sort_by_key(|e| e.employee_id);
        Ok(entries)
    }
}

struct MemoryUnit {
    employee_id: Uuid,
    employees: SlotMap,
    slot: Slot,
    guard: OwnedMutexGuard<EmployeeOnboarding>,
    working: EmployeeOnboarding,
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    fn employee_id(&self) -> Uuid {
        self.employee_id
    }

    async fn load_progress(&mut self) -> Result<Vec<StepProgressRecord>, DatabaseError> {
        Ok(self.working.progress.clone())
    }

    async fn insert_progress(
        &mut self,
        records: &[StepProgressRecord],
    ) -> Result<(), DatabaseError> {
        for record in records {
            if self
                .working
                .progress
                .iter()
                .any(|r| r.step_id == record.step_id)
            {
                return Err(DatabaseError::Constraint(format!(
                    "progress record for employee {} step {} already exists",
                    self.employee_id, record.step_id
                )));
            }
            self.working.progress.push(record.clone());
        }
        Ok(())
    }

    async fn update_progress(&mut self, record: &StepProgressRecord) -> Result<(), DatabaseError> {
        match self
            .working
            .progress
            .iter_mut()
            .find(|r| r.step_id == record.step_id)
        {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(DatabaseError::Query(format!(
                "no progress record for employee {} step {}",
                self.employee_id, record.step_id
            ))),
        }
    }

    async fn load_profile(&mut self) -> Result<ProfileSnapshot, DatabaseError> {
        Ok(self.working.profile.clone())
    }

    async fn save_profile(&mut self, profile: &ProfileSnapshot) -> Result<(), DatabaseError> {
        self.working.profile = profile.clone();
        Ok(())
    }

    async fn load_status(&mut self) -> Result<Option<DerivedOnboardingStatus>, DatabaseError> {
        Ok(self.working.status.clone())
    }

    async fn save_status(&mut self, status: &DerivedOnboardingStatus) -> Result<(), DatabaseError> {
        self.working.status = Some(status.clone());
        Ok(())
    }

    async fn delete_employee(&mut self) -> Result<(), DatabaseError> {
        self.working = EmployeeOnboarding::default();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryUnit {
            employee_id,
            employees,
            slot,
            mut guard,
            working,
        } = *self;
        *guard = working;
        release_if_empty(&employees, employee_id, &slot, &guard)?;
        debug!(%employee_id, "Memory unit of work committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryUnit {
            employee_id,
            employees,
            slot,
            guard,
            ..
        } = *self;
        release_if_empty(&employees, employee_id, &slot, &guard)?;
        debug!(%employee_id, "Memory unit of work rolled back");
        Ok(())
    }
}
