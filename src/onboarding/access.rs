//! Access checks consulted before step advances.
//!
//! The policy itself lives outside this service; callers plug in an
//! implementation that asks whatever decides who may edit whose onboarding.

use uuid::Uuid;

use crate::error::OnboardingError;

pub trait AccessPolicy: Send + Sync {
    /// Allow or reject `actor` advancing steps for `employee_id`.
    fn authorize_step_advance(
        &self,
        actor: Option<&str>,
        employee_id: Uuid,
    ) -> Result<(), OnboardingError>;
}

/// Accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authorize_step_advance(
        &self,
        _actor: Option<&str>,
        _employee_id: Uuid,
    ) -> Result<(), OnboardingError> {
        Ok(())
    }
}
