//! OnboardingEngine — step progress operations, profile edits and the read
//! surface, each run as one unit of work with its status recomputation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::OnboardingError;
use crate::store::{OnboardingStore, StatusEntry, UnitOfWork};

use super::catalog::{StepCatalog, StepId};
use super::maintainer::ConsistencyMaintainer;
use super::profile::{ProfileUpdate, REQUIRED_FIELDS, RequiredFieldSet};
use super::state::{StepProgressRecord, StepStatus};
use super::status::DerivedOnboardingStatus;

/// What `initialize` does for an employee that already has progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMode {
    /// Leave existing progress alone.
    #[default]
    Idempotent,
    /// Fail with `AlreadyInitialized`.
    Strict,
}

/// One catalog step with the employee's progress on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub step_id: StepId,
    pub name: String,
    pub order: u32,
    pub status: StepStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Read model returned by the status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatusView {
    pub employee_id: Uuid,
    #[serde(flatten)]
    pub status: DerivedOnboardingStatus,
    pub steps: Vec<StepView>,
    /// Presence of each required profile field.
    pub required_fields: BTreeMap<&'static str, bool>,
}

/// Result of a profile edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateOutcome {
    /// Current derived status, or `None` if onboarding was never initialized.
    pub status: Option<DerivedOnboardingStatus>,
    pub required_fields: BTreeMap<&'static str, bool>,
    /// Whether the edit flipped a required field and triggered a recompute.
    pub recomputed: bool,
}

/// Summary of a reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub checked: usize,
    pub repaired: usize,
}

/// Coordinates step progress and profile edits with the derived status.
pub struct OnboardingEngine {
    store: Arc<dyn OnboardingStore>,
    catalog: Arc<StepCatalog>,
    maintainer: ConsistencyMaintainer,
    init_mode: InitMode,
}

impl OnboardingEngine {
    pub fn new(store: Arc<dyn OnboardingStore>, catalog: Arc<StepCatalog>) -> Self {
        let maintainer = ConsistencyMaintainer::new(Arc::clone(&catalog), REQUIRED_FIELDS);
        Self {
            store,
            catalog,
            maintainer,
            init_mode: InitMode::default(),
        }
    }

    /// Mode used by the employee-created hook.
    pub fn with_init_mode(mut self, mode: InitMode) -> Self {
        self.init_mode = mode;
        self
    }

    /// Swap the required field set.
    pub fn with_required_fields(mut self, fields: RequiredFieldSet) -> Self {
        self.maintainer = ConsistencyMaintainer::new(Arc::clone(&self.catalog), fields);
        self
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    // ── Employee lifecycle ──────────────────────────────────────────

    /// Hook for the employee directory: a new employee enters onboarding.
    pub async fn on_employee_created(
        &self,
        employee_id: Uuid,
    ) -> Result<DerivedOnboardingStatus, OnboardingError> {
        self.initialize(employee_id, self.init_mode).await
    }

    /// Hook for the employee directory: drop all onboarding data.
    pub async fn on_employee_removed(&self, employee_id: Uuid) -> Result<(), OnboardingError> {
        let mut uow = self.store.begin(employee_id).await?;
        let result = uow.delete_employee().await.map_err(OnboardingError::from);
        finish(uow, result).await?;
        info!(%employee_id, "Onboarding data removed");
        Ok(())
    }

    // ── Step progress ───────────────────────────────────────────────

    /// Create one `not_started` record per catalog step and the initial status.
    pub async fn initialize(
        &self,
        employee_id: Uuid,
        mode: InitMode,
    ) -> Result<DerivedOnboardingStatus, OnboardingError> {
        let mut uow = self.store.begin(employee_id).await?;
        let result = self.initialize_in(uow.as_mut(), mode).await;
        finish(uow, result).await
    }

    async fn initialize_in(
        &self,
        uow: &mut dyn UnitOfWork,
        mode: InitMode,
    ) -> Result<DerivedOnboardingStatus, OnboardingError> {
        let employee_id = uow.employee_id();
        let existing = uow.load_progress().await?;
        let status = uow.load_status().await?;

        if !existing.is_empty() || status.is_some() {
            if mode == InitMode::Strict {
                return Err(OnboardingError::AlreadyInitialized { employee_id });
            }
            debug!(%employee_id, "Onboarding already initialized");
            return match status {
                Some(status) => Ok(status),
                None => Ok(self.maintainer.refresh(uow, Utc::now()).await?),
            };
        }

        let records: Vec<StepProgressRecord> = self
            .catalog
            .steps()
            .iter()
            .map(|step| StepProgressRecord::new_not_started(employee_id, &step.id))
            .collect();
        uow.insert_progress(&records).await?;
        let status = self.maintainer.refresh(uow, Utc::now()).await?;
        info!(%employee_id, steps = records.len(), "Onboarding initialized");
        Ok(status)
    }

    /// Progress records in catalog order. Empty if never initialized.
    pub async fn get(&self, employee_id: Uuid) -> Result<Vec<StepProgressRecord>, OnboardingError> {
        let mut records = self.store.read(employee_id).await?.progress;
        records.sort_by_key(|r| {
            self.catalog
                .get(&r.step_id)
                .map(|s| s.order)
                .unwrap_or(u32::MAX)
        });
        Ok(records)
    }

    /// Move one step forward and recompute the status in the same unit of work.
    pub async fn advance(
        &self,
        employee_id: Uuid,
        step_id: &str,
    ) -> Result<DerivedOnboardingStatus, OnboardingError> {
        if !self.catalog.contains(step_id) {
            return Err(OnboardingError::UnknownStep {
                employee_id,
                step_id: step_id.to_string(),
            });
        }

        let mut uow = self.store.begin(employee_id).await?;
        let result = self.advance_in(uow.as_mut(), step_id).await;
        finish(uow, result).await
    }

    async fn advance_in(
        &self,
        uow: &mut dyn UnitOfWork,
        step_id: &str,
    ) -> Result<DerivedOnboardingStatus, OnboardingError> {
        let employee_id = uow.employee_id();
        let mut record = uow
            .load_progress()
            .await?
            .into_iter()
            .find(|r| r.step_id == step_id)
            .ok_or_else(|| OnboardingError::UnknownStep {
                employee_id,
                step_id: step_id.to_string(),
            })?;

        let now = Utc::now();
        let transition = record.advance(now);
        if transition.changed() {
            uow.update_progress(&record).await?;
            info!(
                %employee_id,
                step_id,
                from = %transition.from,
                to = %transition.to,
                "Step advanced"
            );
        } else {
            debug!(%employee_id, step_id, "Step already completed");
        }

        Ok(self.maintainer.refresh(uow, now).await?)
    }

    // ── Profile ─────────────────────────────────────────────────────

    /// Apply a profile edit. Recomputes the status when a required field
    /// becomes present or absent.
    pub async fn update_profile(
        &self,
        employee_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<ProfileUpdateOutcome, OnboardingError> {
        let mut uow = self.store.begin(employee_id).await?;
        let result = self.update_profile_in(uow.as_mut(), update).await;
        finish(uow, result).await
    }

    async fn update_profile_in(
        &self,
        uow: &mut dyn UnitOfWork,
        update: &ProfileUpdate,
    ) -> Result<ProfileUpdateOutcome, OnboardingError> {
        let employee_id = uow.employee_id();
        let fields = self.maintainer.fields();

        let before = uow.load_profile().await?;
        let mut after = before.clone();
        if update.apply(&mut after) {
            uow.save_profile(&after).await?;
        }

        let stored = uow.load_status().await?;
        let flipped = fields.presence_changed(&before, &after);
        let (status, recomputed) = match stored {
            Some(_) if flipped => (Some(self.maintainer.refresh(uow, Utc::now()).await?), true),
            other => (other, false),
        };

        debug!(%employee_id, recomputed, "Profile updated");
        Ok(ProfileUpdateOutcome {
            status,
            required_fields: fields.is_complete(&after),
            recomputed,
        })
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// The stored status with per-step detail.
    pub async fn status(&self, employee_id: Uuid) -> Result<OnboardingStatusView, OnboardingError> {
        let state = self.store.read(employee_id).await?;
        let status = state
            .status
            .ok_or(OnboardingError::NotInitialized { employee_id })?;

        let steps = self
            .catalog
            .steps()
            .iter()
            .map(|step| {
                let record = state.progress.iter().find(|r| r.step_id == step.id);
                StepView {
                    step_id: step.id.clone(),
                    name: step.name.clone(),
                    order: step.order,
                    status: record.map(|r| r.status).unwrap_or_default(),
                    completed_at: record.and_then(|r| r.completed_at),
                }
            })
            .collect();

        Ok(OnboardingStatusView {
            employee_id,
            status,
            steps,
            required_fields: self.maintainer.fields().is_complete(&state.profile),
        })
    }

    /// Every stored status row.
    pub async fn list_statuses(&self) -> Result<Vec<StatusEntry>, OnboardingError> {
        Ok(self.store.list_statuses().await?)
    }

    /// Whether the stored status equals a fresh recomputation.
    pub async fn is_consistent(&self, employee_id: Uuid) -> Result<bool, OnboardingError> {
        let state = self.store.read(employee_id).await?;
        let Some(stored) = state.status.clone() else {
            return Ok(state.progress.is_empty());
        };
        // `now` only matters when the stored row is not onboarded but should
        // be, which is a mismatch either way.
        Ok(self.maintainer.compute(&state, Utc::now()) == stored)
    }

    // ── Reconciliation ──────────────────────────────────────────────

    /// Bring one employee in line with the current catalog and field set:
    /// add records for new catalog steps and recompute the status.
    /// Returns `None` for employees that were never initialized.
    pub async fn reconcile(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<(DerivedOnboardingStatus, bool)>, OnboardingError> {
        let mut uow = self.store.begin(employee_id).await?;
        let result = self.reconcile_in(uow.as_mut()).await;
        finish(uow, result).await
    }

    async fn reconcile_in(
        &self,
        uow: &mut dyn UnitOfWork,
    ) -> Result<Option<(DerivedOnboardingStatus, bool)>, OnboardingError> {
        let employee_id = uow.employee_id();
        let progress = uow.load_progress().await?;
        let previous = uow.load_status().await?;
        if progress.is_empty() && previous.is_none() {
            return Ok(None);
        }

        let missing: Vec<StepProgressRecord> = self
            .catalog
            .steps()
            .iter()
            .filter(|step| !progress.iter().any(|r| r.step_id == step.id))
            .map(|step| StepProgressRecord::new_not_started(employee_id, &step.id))
            .collect();
        if !missing.is_empty() {
            uow.insert_progress(&missing).await?;
            info!(%employee_id, added = missing.len(), "Added records for new catalog steps");
        }

        let status = self.maintainer.refresh(uow, Utc::now()).await?;
        let repaired = !missing.is_empty() || previous.as_ref() != Some(&status);
        if repaired {
            warn!(%employee_id, "Stale onboarding status repaired");
        }
        Ok(Some((status, repaired)))
    }

    /// Reconcile every employee with onboarding data.
    pub async fn reconcile_all(&self) -> Result<ReconcileReport, OnboardingError> {
        let mut report = ReconcileReport::default();
        for employee_id in self.store.list_employees().await? {
            if let Some((_, repaired)) = self.reconcile(employee_id).await? {
                report.checked += 1;
                if repaired {
                    report.repaired += 1;
                }
            }
        }
        info!(
            checked = report.checked,
            repaired = report.repaired,
            "Onboarding reconciliation complete"
        );
        Ok(report)
    }
}

/// Commit on success, roll back on failure. The caller's error wins over a
/// rollback failure.
async fn finish<T>(
    uow: Box<dyn UnitOfWork>,
    result: Result<T, OnboardingError>,
) -> Result<T, OnboardingError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            let employee_id = uow.employee_id();
            if let Err(rollback_err) = uow.rollback().await {
                warn!(%employee_id, error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}
