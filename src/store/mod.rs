//! Persistence layer — per-employee units of work over step progress,
//! profiles and derived status.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryStore;
pub use traits::{EmployeeOnboarding, OnboardingStore, StatusEntry, UnitOfWork};
