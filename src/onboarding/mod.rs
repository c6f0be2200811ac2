//! Onboarding completion tracking.
//!
//! Each employee walks through the steps of a catalog while their profile
//! fills in. The derived status (completed steps, percentage, onboarded
//! flag) is recomputed inside every mutation that could change it, so the
//! stored row always matches its inputs.

pub mod access;
pub mod catalog;
pub mod engine;
pub mod maintainer;
pub mod profile;
pub mod routes;
pub mod state;
pub mod status;

pub use access::{AccessPolicy, AllowAll};
pub use catalog::{OnboardingStep, StepCatalog, StepId};
pub use engine::{
    InitMode, OnboardingEngine, OnboardingStatusView, ProfileUpdateOutcome, ReconcileReport,
    StepView,
};
pub use maintainer::ConsistencyMaintainer;
pub use profile::{ProfileSnapshot, ProfileUpdate, REQUIRED_FIELDS, RequiredFieldSet};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{StepProgressRecord, StepStatus};
pub use status::DerivedOnboardingStatus;
