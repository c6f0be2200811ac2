//! HR Onboarding — step progress and profile completeness, with a derived
//! onboarding status kept consistent on every write.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
