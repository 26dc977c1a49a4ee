use super::{FieldKind, FieldValue, ScalarField};
use serde::{Deserialize, Serialize};

/// Gender of a demographic bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    #[serde(rename = "GENDER_UNKNOWN")]
    Unknown = 0,
    #[serde(rename = "GENDER_FEMALE")]
    Female = 1,
    #[serde(rename = "GENDER_MALE")]
    Male = 2,
}

impl Gender {
    pub fn from_number(number: i32) -> Option<Self> {
        match number {
            0 => Some(Gender::Unknown),
            1 => Some(Gender::Female),
            2 => Some(Gender::Male),
            _ => None,
        }
    }
}

impl ScalarField for Gender {
    const KIND: FieldKind = FieldKind::Enum;
    const ENUM_VALUES: &'static [(&'static str, i32)] = &[
        ("GENDER_UNKNOWN", 0),
        ("GENDER_FEMALE", 1),
        ("GENDER_MALE", 2),
    ];

    fn into_value(self) -> FieldValue {
        FieldValue::Enum(self as i32)
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Enum(number) => Gender::from_number(number),
            _ => None,
        }
    }
}

message! {
    pub struct AgeRange {
        scalars { min_age: i32, max_age: i32 }
        messages {}
        repeated {}
    }
}

message! {
    /// Demographic bucket: gender and age range
    pub struct DemoBucket {
        scalars { gender: Gender }
        messages { age: AgeRange }
        repeated {}
    }
}

message! {
    pub struct DemoInfo {
        scalars { confidence: f64 }
        messages { demo_bucket: DemoBucket }
        repeated {}
    }
}

message! {
    /// One user identifier slot of a profile
    pub struct UserInfo {
        scalars {
            user_id: String,
            /// Stamped by the labeler from `user_id`
            user_id_fingerprint: u64,
        }
        messages { demo: DemoInfo }
        repeated {}
    }
}

message! {
    /// Alternate user identifier slots of an event
    pub struct ProfileInfo {
        scalars {}
        messages {
            email_user_info: UserInfo,
            phone_user_info: UserInfo,
            logged_in_id_user_info: UserInfo,
            logged_out_id_user_info: UserInfo,
            proprietary_id_space_1_user_info: UserInfo,
            proprietary_id_space_2_user_info: UserInfo,
            proprietary_id_space_3_user_info: UserInfo,
            proprietary_id_space_4_user_info: UserInfo,
            proprietary_id_space_5_user_info: UserInfo,
            proprietary_id_space_6_user_info: UserInfo,
            proprietary_id_space_7_user_info: UserInfo,
            proprietary_id_space_8_user_info: UserInfo,
            proprietary_id_space_9_user_info: UserInfo,
            proprietary_id_space_10_user_info: UserInfo,
        }
        repeated {}
    }
}

impl ProfileInfo {
    /// Every present user info slot, in field order.
    pub fn user_infos_mut(&mut self) -> impl Iterator<Item = &mut UserInfo> {
        [
            &mut self.email_user_info,
            &mut self.phone_user_info,
            &mut self.logged_in_id_user_info,
            &mut self.logged_out_id_user_info,
            &mut self.proprietary_id_space_1_user_info,
            &mut self.proprietary_id_space_2_user_info,
            &mut self.proprietary_id_space_3_user_info,
            &mut self.proprietary_id_space_4_user_info,
            &mut self.proprietary_id_space_5_user_info,
            &mut self.proprietary_id_space_6_user_info,
            &mut self.proprietary_id_space_7_user_info,
            &mut self.proprietary_id_space_8_user_info,
            &mut self.proprietary_id_space_9_user_info,
            &mut self.proprietary_id_space_10_user_info,
        ]
        .into_iter()
        .filter_map(Option::as_mut)
    }
}

message! {
    pub struct EventId {
        scalars {
            id: String,
            /// Stamped by the labeler from `id`
            id_fingerprint: u64,
        }
        messages {}
        repeated {}
    }
}

message! {
    pub struct GeoLocation {
        scalars { country_id: i32, region_id: i32, city_id: i32 }
        messages {}
        repeated {}
    }
}

message! {
    /// Raw input of one event, as received by the labeler
    pub struct LabelerInput {
        scalars { timestamp_usec: i64, user_agent: String }
        messages { event_id: EventId, geo: GeoLocation, profile_info: ProfileInfo }
        repeated {}
    }
}

message! {
    /// Label assigned to a virtual person
    pub struct PersonLabelAttributes {
        scalars {}
        messages { demo: DemoBucket }
        repeated {}
    }
}

message! {
    /// A label not yet collapsed: `labels[i]` has probability `probabilities[i]`
    pub struct QuantumLabel {
        scalars { seed: String }
        messages {}
        repeated { labels: PersonLabelAttributes, probabilities: f64 }
    }
}

message! {
    pub struct QuantumLabels {
        scalars {}
        messages {}
        repeated { quantum_labels: QuantumLabel }
    }
}

message! {
    /// Identity and label assigned by a population node
    pub struct VirtualPersonActivity {
        scalars { virtual_person_id: i64 }
        messages { label: PersonLabelAttributes }
        repeated {}
    }
}

message! {
    /// The record threaded through a model tree.
    ///
    /// `acting_fingerprint` drives every probabilistic decision; population
    /// nodes append to `virtual_person_activities`.
    pub struct LabelerEvent {
        scalars {
            acting_fingerprint: u64,
            person_country_code: String,
            person_region_code: String,
            multiplicity_person_index: i32,
            expected_multiplicity: f64,
        }
        messages {
            labeler_input: LabelerInput,
            corrected_demo: DemoBucket,
            acting_demo: DemoBucket,
            label: PersonLabelAttributes,
            quantum_labels: QuantumLabels,
        }
        repeated { virtual_person_activities: VirtualPersonActivity }
    }
}

impl LabelerEvent {
    /// The acting fingerprint, 0 when unset.
    pub fn fingerprint(&self) -> u64 {
        self.acting_fingerprint.unwrap_or(0)
    }
}

/// Result of labeling one input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerOutput {
    pub people: Vec<VirtualPersonActivity>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub serialized_debug_trace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_snake_case_and_skips_unset_fields() {
        let event = LabelerEvent {
            acting_fingerprint: Some(7),
            acting_demo: Some(DemoBucket {
                gender: Some(Gender::Female),
                ..Default::default()
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"acting_fingerprint":7,"acting_demo":{"gender":"GENDER_FEMALE"}}"#
        );
        let back: LabelerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn user_infos_mut_visits_present_slots_only() {
        let mut profile = ProfileInfo {
            email_user_info: Some(UserInfo::default()),
            proprietary_id_space_10_user_info: Some(UserInfo::default()),
            ..Default::default()
        };
        assert_eq!(profile.user_infos_mut().count(), 2);
    }

    #[test]
    fn profile_descriptor_has_fourteen_slots() {
        assert_eq!(ProfileInfo::DESCRIPTOR.fields.len(), 14);
    }
}
