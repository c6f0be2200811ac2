//! Derived onboarding status and the pure aggregation that produces it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::StepCatalog;
use super::profile::{ProfileSnapshot, RequiredFieldSet};
use super::state::StepProgressRecord;

/// Cached summary of an employee's onboarding. Always equal to
/// [`compute`] over the employee's current step records and profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedOnboardingStatus {
    pub is_onboarded: bool,
    pub completed_steps: u32,
    pub total_steps: u32,
    /// Whole-number percentage in `[0, 100]`.
    pub percentage: f64,
    pub onboarding_completed_at: Option<DateTime<Utc>>,
}

/// Everything [`compute`] depends on.
#[derive(Debug, Clone, Copy)]
pub struct AggregateInputs<'a> {
    pub catalog: &'a StepCatalog,
    pub records: &'a [StepProgressRecord],
    pub snapshot: &'a ProfileSnapshot,
    pub fields: &'a RequiredFieldSet,
    /// `onboarding_completed_at` of the previously stored status, if any.
    pub previous_completed_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

/// Combine step progress and profile completeness into a derived status.
///
/// Deterministic: identical inputs always give identical output.
pub fn compute(inputs: AggregateInputs<'_>) -> DerivedOnboardingStatus {
    let total_steps = inputs.catalog.total_steps();
    // Records for steps that have left the catalog do not count.
    let completed_steps = inputs
        .records
        .iter()
        .filter(|r| r.is_completed() && inputs.catalog.contains(&r.step_id))
        .count() as u32;

    let percentage = percentage(completed_steps, total_steps);
    let fields_ok = inputs.fields.all_complete(inputs.snapshot);
    let is_onboarded = fields_ok && total_steps > 0 && completed_steps == total_steps;

    let onboarding_completed_at = if is_onboarded {
        Some(inputs.previous_completed_at.unwrap_or(inputs.now))
    } else {
        None
    };

    DerivedOnboardingStatus {
        is_onboarded,
        completed_steps,
        total_steps,
        percentage,
        onboarding_completed_at,
    }
}

/// `round(100 * completed / total)`, or 0 for an empty catalog.
pub fn percentage(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (100.0 * f64::from(completed) / f64::from(total)).round()
}
