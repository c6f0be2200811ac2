//! Profile completeness — which profile attributes onboarding depends on,
//! and whether an employee's profile currently has them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single attribute of the employee profile that onboarding reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAttribute {
    PhoneNumber,
    EmergencyContactName,
    EmergencyContactPhone,
    CurrentAddress,
    BankAccountNumber,
    BankName,
    BankRoutingCode,
    TaxId,
    NationalId,
}

/// The slice of an employee profile the completeness check needs.
///
/// Owned by the profile-edit flow; the engine only reads it and applies
/// `ProfileUpdate` patches handed to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub current_address: Option<String>,
    #[serde(default)]
    pub bank_account_number: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    /// IFSC-style branch routing code.
    #[serde(default)]
    pub bank_routing_code: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub national_id: Option<String>,
}

impl ProfileSnapshot {
    pub fn get(&self, attribute: ProfileAttribute) -> Option<&str> {
        self.slot(attribute).as_deref()
    }

    /// Whether `attribute` holds a non-blank value.
    pub fn is_present(&self, attribute: ProfileAttribute) -> bool {
        self.get(attribute).is_some_and(|v| !v.trim().is_empty())
    }

    fn slot(&self, attribute: ProfileAttribute) -> &Option<String> {
        use ProfileAttribute::*;
        match attribute {
            PhoneNumber => &self.phone_number,
            EmergencyContactName => &self.emergency_contact_name,
            EmergencyContactPhone => &self.emergency_contact_phone,
            CurrentAddress => &self.current_address,
            BankAccountNumber => &self.bank_account_number,
            BankName => &self.bank_name,
            BankRoutingCode => &self.bank_routing_code,
            TaxId => &self.tax_id,
            NationalId => &self.national_id,
        }
    }

    fn slot_mut(&mut self, attribute: ProfileAttribute) -> &mut Option<String> {
        use ProfileAttribute::*;
        match attribute {
            PhoneNumber => &mut self.phone_number,
            EmergencyContactName => &mut self.emergency_contact_name,
            EmergencyContactPhone => &mut self.emergency_contact_phone,
            CurrentAddress => &mut self.current_address,
            BankAccountNumber => &mut self.bank_account_number,
            BankName => &mut self.bank_name,
            BankRoutingCode => &mut self.bank_routing_code,
            TaxId => &mut self.tax_id,
            NationalId => &mut self.national_id,
        }
    }
}

/// A partial profile edit. `None` leaves a field alone; `Some("")` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_routing_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
}

impl ProfileUpdate {
    fn entries(&self) -> [(ProfileAttribute, &Option<String>); 9] {
        use ProfileAttribute::*;
        [
            (PhoneNumber, &self.phone_number),
            (EmergencyContactName, &self.emergency_contact_name),
            (EmergencyContactPhone, &self.emergency_contact_phone),
            (CurrentAddress, &self.current_address),
            (BankAccountNumber, &self.bank_account_number),
            (BankName, &self.bank_name),
            (BankRoutingCode, &self.bank_routing_code),
            (TaxId, &self.tax_id),
            (NationalId, &self.national_id),
        ]
    }

    /// Write the patch into `snapshot`. Returns true if any stored value changed.
    pub fn apply(&self, snapshot: &mut ProfileSnapshot) -> bool {
        let mut changed = false;
        for (attribute, value) in self.entries() {
            let Some(value) = value else { continue };
            let value = value.trim();
            let new_value = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
            let slot = snapshot.slot_mut(attribute);
            if *slot != new_value {
                *slot = new_value;
                changed = true;
            }
        }
        changed
    }
}

/// A load-bearing profile field. Composite fields have several parts and
/// count as present only when every part is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredField {
    pub name: &'static str,
    pub parts: &'static [ProfileAttribute],
}

impl RequiredField {
    pub fn is_present(&self, snapshot: &ProfileSnapshot) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(|p| snapshot.is_present(*p))
    }
}

/// Versioned list of the profile fields onboarding completeness depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredFieldSet {
    pub version: u32,
    pub fields: &'static [RequiredField],
}

/// The required field set in force.
pub const REQUIRED_FIELDS: RequiredFieldSet = RequiredFieldSet {
    version: 1,
    fields: &[
        RequiredField {
            name: "phone_number",
            parts: &[ProfileAttribute::PhoneNumber],
        },
        RequiredField {
            name: "emergency_contact",
            parts: &[
                ProfileAttribute::EmergencyContactName,
                ProfileAttribute::EmergencyContactPhone,
            ],
        },
        RequiredField {
            name: "current_address",
            parts: &[ProfileAttribute::CurrentAddress],
        },
        RequiredField {
            name: "bank_details",
            parts: &[
                ProfileAttribute::BankAccountNumber,
                ProfileAttribute::BankName,
                ProfileAttribute::BankRoutingCode,
            ],
        },
        RequiredField {
            name: "tax_id",
            parts: &[ProfileAttribute::TaxId],
        },
        RequiredField {
            name: "national_id",
            parts: &[ProfileAttribute::NationalId],
        },
    ],
};

impl RequiredFieldSet {
    /// Presence of each required field, keyed by field name.
    pub fn is_complete(&self, snapshot: &ProfileSnapshot) -> BTreeMap<&'static str, bool> {
        self.fields
            .iter()
            .map(|f| (f.name, f.is_present(snapshot)))
            .collect()
    }

    /// Whether every required field is present.
    pub fn all_complete(&self, snapshot: &ProfileSnapshot) -> bool {
        self.fields.iter().all(|f| f.is_present(snapshot))
    }

    /// Names of the required fields that are still absent.
    pub fn missing(&self, snapshot: &ProfileSnapshot) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| !f.is_present(snapshot))
            .map(|f| f.name)
            .collect()
    }

    /// Whether any required field flipped between absent and present.
    pub fn presence_changed(&self, before: &ProfileSnapshot, after: &ProfileSnapshot) -> bool {
        self.fields
            .iter()
            .any(|f| f.is_present(before) != f.is_present(after))
    }
}

#[cfg(test)]
pub(crate) fn complete_profile() -> ProfileSnapshot {
    ProfileSnapshot {
        phone_number: Some("+91 98765 43210".into()),
        emergency_contact_name: Some("Asha Rao".into()),
        emergency_contact_phone: Some("+91 91234 56789".into()),
        current_address: Some("12 MG Road, Bengaluru".into()),
        bank_account_number: Some("001234567890".into()),
        bank_name: Some("State Bank".into()),
        bank_routing_code: Some("SBIN0000123".into()),
        tax_id: Some("ABCDE1234F".into()),
        national_id: Some("1234 5678 9012".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_profile_is_complete() {
        let snapshot = complete_profile();
        assert!(REQUIRED_FIELDS.all_complete(&snapshot));
        assert!(REQUIRED_FIELDS.missing(&snapshot).is_empty());
        assert!(REQUIRED_FIELDS.is_complete(&snapshot).values().all(|v| *v));
    }

    #[test]
    fn empty_profile_misses_everything() {
        let snapshot = ProfileSnapshot::default();
        assert!(!REQUIRED_FIELDS.all_complete(&snapshot));
        assert_eq!(
            REQUIRED_FIELDS.missing(&snapshot).len(),
            REQUIRED_FIELDS.fields.len()
        );
    }

    #[test]
    fn whitespace_only_counts_as_absent() {
        let mut snapshot = complete_profile();
        snapshot.phone_number = Some("   ".into());
        let presence = REQUIRED_FIELDS.is_complete(&snapshot);
        assert!(!presence["phone_number"]);
        assert!(!REQUIRED_FIELDS.all_complete(&snapshot));
    }

    #[test]
    fn partial_bank_details_count_as_absent() {
        let mut snapshot = complete_profile();
        snapshot.bank_routing_code = None;
        let presence = REQUIRED_FIELDS.is_complete(&snapshot);
        assert!(!presence["bank_details"]);
        assert!(presence["phone_number"]);
        assert_eq!(REQUIRED_FIELDS.missing(&snapshot), vec!["bank_details"]);
    }

    #[test]
    fn partial_emergency_contact_counts_as_absent() {
        let mut snapshot = complete_profile();
        snapshot.emergency_contact_phone = Some(String::new());
        assert!(!REQUIRED_FIELDS.is_complete(&snapshot)["emergency_contact"]);
    }

    #[test]
    fn update_sets_trims_and_clears() {
        let mut snapshot = ProfileSnapshot {
            tax_id: Some("ABCDE1234F".into()),
            ..Default::default()
        };
        let update = ProfileUpdate {
            phone_number: Some("  555-0100 ".into()),
            tax_id: Some(String::new()),
            ..Default::default()
        };
        assert!(update.apply(&mut snapshot));
        assert_eq!(snapshot.phone_number.as_deref(), Some("555-0100"));
        assert!(snapshot.tax_id.is_none());

        // Re-applying the same patch is not a change.
        assert!(!update.apply(&mut snapshot));
    }

    #[test]
    fn empty_update_changes_nothing() {
        let mut snapshot = complete_profile();
        assert!(!ProfileUpdate::default().apply(&mut snapshot));
        assert_eq!(snapshot, complete_profile());
    }

    #[test]
    fn presence_changed_detects_both_directions() {
        let full = complete_profile();
        let mut without_phone = full.clone();
        without_phone.phone_number = None;
        assert!(REQUIRED_FIELDS.presence_changed(&without_phone, &full));
        assert!(REQUIRED_FIELDS.presence_changed(&full, &without_phone));

        let mut new_phone = full.clone();
        new_phone.phone_number = Some("555-0199".into());
        assert!(!REQUIRED_FIELDS.presence_changed(&full, &new_phone));
    }

    #[test]
    fn update_deserializes_camel_case() {
        let update: ProfileUpdate =
            serde_json::from_str(r#"{"phoneNumber": "555", "bankRoutingCode": "X1"}"#).unwrap();
        assert_eq!(update.phone_number.as_deref(), Some("555"));
        assert_eq!(update.bank_routing_code.as_deref(), Some("X1"));
        assert!(update.tax_id.is_none());
    }
}
