//! Step progress state machine — tracks where an employee is on each step.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::StepId;

/// Status of one (employee, step) pair.
///
/// Progresses linearly: NotStarted → InProgress → Completed. Completed is
/// terminal; advancing it again is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl StepStatus {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, target),
            (NotStarted, InProgress) | (InProgress, Completed) | (Completed, Completed)
        )
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The status `advance` moves to. Completed maps onto itself.
    pub fn next(&self) -> StepStatus {
        use StepStatus::*;
        match self {
            NotStarted => InProgress,
            InProgress | Completed => Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown step status {other:?}")),
        }
    }
}

/// Outcome of a single `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTransition {
    pub from: StepStatus,
    pub to: StepStatus,
}

impl StepTransition {
    /// False for the completed → completed no-op.
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// One progress record per (employee, step).
///
/// Invariant: `completed_at` is set iff `status == Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProgressRecord {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub step_id: StepId,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepProgressRecord {
    pub fn new_not_started(employee_id: Uuid, step_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id,
            step_id: step_id.to_string(),
            status: StepStatus::NotStarted,
            completed_at: None,
        }
    }

    /// Move one step forward. Reaching Completed stamps `completed_at = now`;
    /// advancing an already completed record leaves it untouched.
    pub fn advance(&mut self, now: DateTime<Utc>) -> StepTransition {
        let from = self.status;
        let to = from.next();
        debug_assert!(from.can_transition_to(to));
        if from != to {
            self.status = to;
            if to.is_terminal() {
                self.completed_at = Some(now);
            }
        }
        StepTransition { from, to }
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }
}
