//! Step catalog — the ordered onboarding workflow every employee walks through.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Stable identifier of a catalog step, e.g. `"personal_details"`.
pub type StepId = String;

/// A single catalog entry. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingStep {
    pub id: StepId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 1-based position in the workflow.
    pub order: u32,
}

impl OnboardingStep {
    pub fn new(id: &str, name: &str, description: &str, order: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            order,
        }
    }
}

/// Read-only, ordered list of onboarding steps.
#[derive(Debug, Clone, Default)]
pub struct StepCatalog {
    steps: Vec<OnboardingStep>,
}

impl StepCatalog {
    /// Build a catalog, validating ids and orders. Steps are sorted by `order`.
    pub fn new(mut steps: Vec<OnboardingStep>) -> Result<Self, ConfigError> {
        validate(&steps)?;
        steps.sort_by_key(|s| s.order);
        if steps.is_empty() {
            tracing::warn!("Step catalog is empty; no employee can complete onboarding");
        }
        Ok(Self { steps })
    }

    /// Load a catalog from a JSON array of steps.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let steps: Vec<OnboardingStep> = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("step catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::new(steps)?;
        tracing::info!(
            path = %path.display(),
            steps = catalog.total_steps(),
            "Loaded step catalog"
        );
        Ok(catalog)
    }

    /// The built-in workflow.
    pub fn default_catalog() -> Self {
        Self {
            steps: vec![
                OnboardingStep::new(
                    "personal_details",
                    "Personal details",
                    "Confirm your name, date of birth and contact information.",
                    1,
                ),
                OnboardingStep::new(
                    "document_submission",
                    "Document submission",
                    "Upload identity, address and education documents.",
                    2,
                ),
                OnboardingStep::new(
                    "bank_and_tax",
                    "Bank and tax details",
                    "Provide salary account and tax registration details.",
                    3,
                ),
                OnboardingStep::new(
                    "policy_acknowledgement",
                    "Policy acknowledgement",
                    "Read and accept the employee handbook and code of conduct.",
                    4,
                ),
                OnboardingStep::new(
                    "it_setup",
                    "IT setup",
                    "Collect equipment and activate your accounts.",
                    5,
                ),
            ],
        }
    }

    pub fn steps(&self) -> &[OnboardingStep] {
        &self.steps
    }

    pub fn get(&self, step_id: &str) -> Option<&OnboardingStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.get(step_id).is_some()
    }

    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn validate(steps: &[OnboardingStep]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();
    let mut orders = HashSet::new();
    for step in steps {
        if step.id.trim().is_empty() {
            return Err(ConfigError::InvalidCatalog(format!(
                "step {:?} has a blank id",
                step.name
            )));
        }
        if !ids.insert(step.id.as_str()) {
            return Err(ConfigError::InvalidCatalog(format!(
                "duplicate step id {:?}",
                step.id
            )));
        }
        if step.order == 0 {
            return Err(ConfigError::InvalidCatalog(format!(
                "step {:?} has order 0; orders are 1-based",
                step.id
            )));
        }
        if !orders.insert(step.order) {
            return Err(ConfigError::InvalidCatalog(format!(
                "duplicate order {} (step {:?})",
                step.order, step.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_catalog_is_valid_and_ordered() {
        let catalog = StepCatalog::default_catalog();
        assert_eq!(catalog.total_steps(), 5);
        let rebuilt = StepCatalog::new(catalog.steps().to_vec()).unwrap();
        let orders: Vec<u32> = rebuilt.steps().iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn new_sorts_by_order() {
        let catalog = StepCatalog::new(vec![
            OnboardingStep::new("b", "B", "", 2),
            OnboardingStep::new("a", "A", "", 1),
        ])
        .unwrap();
        assert_eq!(catalog.steps()[0].id, "a");
        assert_eq!(catalog.steps()[1].id, "b");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = StepCatalog::new(vec![
            OnboardingStep::new("a", "A", "", 1),
            OnboardingStep::new("a", "Again", "", 2),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCatalog(_)));
    }

    #[test]
    fn rejects_duplicate_and_zero_orders() {
        assert!(
            StepCatalog::new(vec![
                OnboardingStep::new("a", "A", "", 1),
                OnboardingStep::new("b", "B", "", 1),
            ])
            .is_err()
        );
        assert!(StepCatalog::new(vec![OnboardingStep::new("a", "A", "", 0)]).is_err());
    }

    #[test]
    fn rejects_blank_id() {
        assert!(StepCatalog::new(vec![OnboardingStep::new("  ", "A", "", 1)]).is_err());
    }

    #[test]
    fn empty_catalog_is_allowed() {
        let catalog = StepCatalog::new(Vec::new()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.total_steps(), 0);
    }

    #[test]
    fn lookup_by_id() {
        let catalog = StepCatalog::default_catalog();
        assert_eq!(catalog.get("it_setup").unwrap().order, 5);
        assert!(catalog.contains("bank_and_tax"));
        assert!(!catalog.contains("payroll"));
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "laptop", "name": "Laptop", "order": 2}},
                {{"id": "contract", "name": "Contract", "description": "Sign it", "order": 1}}
            ]"#
        )
        .unwrap();

        let catalog = StepCatalog::from_json_file(file.path()).unwrap();
        assert_eq!(catalog.total_steps(), 2);
        assert_eq!(catalog.steps()[0].id, "contract");
        assert_eq!(catalog.steps()[1].description, "");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = StepCatalog::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
