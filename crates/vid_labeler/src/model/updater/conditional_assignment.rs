use crate::errors::{LabelerError, Result};
use crate::event::{FieldKind, FieldPath, LabelerEvent};
use crate::filter::FieldFilter;
use crate::model::config::ConditionalAssignmentConfig;

#[derive(Debug, Clone)]
struct Assignment {
    source: FieldPath,
    target: FieldPath,
}

/// Copies source fields to target fields when the condition matches.
/// Unset source fields are skipped one by one.
#[derive(Debug, Clone)]
pub struct ConditionalAssignment {
    condition: FieldFilter,
    assignments: Vec<Assignment>,
}

fn is_assignable(kind: FieldKind) -> bool {
    matches!(
        kind,
        FieldKind::Int32
            | FieldKind::UInt32
            | FieldKind::Int64
            | FieldKind::UInt64
            | FieldKind::Bool
            | FieldKind::Enum
            | FieldKind::String
    )
}

impl ConditionalAssignment {
    pub fn build(config: &ConditionalAssignmentConfig) -> Result<Self> {
        let condition = config.condition.as_ref().ok_or_else(|| {
            LabelerError::model("Condition is not set in ConditionalAssignment")
        })?;
        if config.assignments.is_empty() {
            return Err(LabelerError::model("No assignments in ConditionalAssignment"));
        }
        let condition = FieldFilter::new(condition)?;

        let assignments = config
            .assignments
            .iter()
            .map(|assignment| {
                let source = assignment.source_field.as_deref().ok_or_else(|| {
                    LabelerError::model(
                        "All assignments must have source_field set in ConditionalAssignment",
                    )
                })?;
                let target = assignment.target_field.as_deref().ok_or_else(|| {
                    LabelerError::model(
                        "All assignments must have target_field set in ConditionalAssignment",
                    )
                })?;
                let source = FieldPath::resolve(LabelerEvent::DESCRIPTOR, source)?;
                let target = FieldPath::resolve(LabelerEvent::DESCRIPTOR, target)?;
                if source.kind() != target.kind() {
                    return Err(LabelerError::model(format!(
                        "All assignments must have source_field and target_field being the same type in ConditionalAssignment: {source} is {}, {target} is {}",
                        source.kind(),
                        target.kind()
                    )));
                }
                if !is_assignable(source.kind()) {
                    return Err(LabelerError::model(format!(
                        "Unsupported field type for ConditionalAssignment: {}",
                        source.kind()
                    )));
                }
                Ok(Assignment { source, target })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            condition,
            assignments,
        })
    }

    pub fn update(&self, event: &mut LabelerEvent) -> Result<()> {
        if !self.condition.matches(event) {
            return Ok(());
        }
        for assignment in &self.assignments {
            if let Some(value) = assignment.source.get(event) {
                assignment.target.set(event, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AgeRange, DemoBucket, Gender};
    use crate::filter::{FieldFilterConfig, FilterOp};
    use crate::model::config::AssignmentConfig;

    fn demo(gender: Option<Gender>, min: Option<i32>, max: Option<i32>) -> DemoBucket {
        DemoBucket {
            gender,
            age: (min.is_some() || max.is_some()).then(|| AgeRange {
                min_age: min,
                max_age: max,
            }),
        }
    }

    fn has(name: &str) -> FieldFilterConfig {
        FieldFilterConfig::field(FilterOp::Has, name)
    }

    fn demo_copy_config() -> ConditionalAssignmentConfig {
        ConditionalAssignmentConfig {
            condition: Some(FieldFilterConfig::with_sub_filters(
                FilterOp::And,
                vec![
                    has("acting_demo.gender"),
                    has("acting_demo.age.min_age"),
                    has("acting_demo.age.max_age"),
                ],
            )),
            assignments: vec![
                AssignmentConfig::new("acting_demo.gender", "corrected_demo.gender"),
                AssignmentConfig::new("acting_demo.age.min_age", "corrected_demo.age.min_age"),
                AssignmentConfig::new("acting_demo.age.max_age", "corrected_demo.age.max_age"),
            ],
        }
    }

    #[test]
    fn build_errors() {
        let mut no_condition = demo_copy_config();
        no_condition.condition = None;
        assert!(ConditionalAssignment::build(&no_condition)
            .unwrap_err()
            .to_string()
            .contains("Condition is not set"));

        let mut bad_condition = demo_copy_config();
        bad_condition.condition = Some(FieldFilterConfig::op(FilterOp::Invalid));
        assert!(ConditionalAssignment::build(&bad_condition).is_err());

        let mut empty = demo_copy_config();
        empty.assignments.clear();
        assert!(ConditionalAssignment::build(&empty)
            .unwrap_err()
            .to_string()
            .contains("No assignments"));

        let mut no_source = demo_copy_config();
        no_source.assignments[0].source_field = None;
        assert!(ConditionalAssignment::build(&no_source)
            .unwrap_err()
            .to_string()
            .contains("source_field"));

        let mut no_target = demo_copy_config();
        no_target.assignments[2].target_field = None;
        assert!(ConditionalAssignment::build(&no_target)
            .unwrap_err()
            .to_string()
            .contains("target_field"));

        let mut mismatch = demo_copy_config();
        mismatch.assignments[0] = AssignmentConfig::new("acting_demo.gender", "person_country_code");
        assert!(ConditionalAssignment::build(&mismatch)
            .unwrap_err()
            .to_string()
            .contains("same type"));

        let mut unsupported = demo_copy_config();
        unsupported.assignments[0] =
            AssignmentConfig::new("expected_multiplicity", "expected_multiplicity");
        assert!(ConditionalAssignment::build(&unsupported)
            .unwrap_err()
            .to_string()
            .contains("Unsupported field type"));
    }

    #[test]
    fn assigns_all_fields_when_condition_matches() {
        let updater = ConditionalAssignment::build(&demo_copy_config()).unwrap();
        let mut event = LabelerEvent {
            acting_demo: Some(demo(Some(Gender::Female), Some(25), Some(29))),
            ..Default::default()
        };
        updater.update(&mut event).unwrap();
        assert_eq!(event.corrected_demo, event.acting_demo);
    }

    #[test]
    fn does_nothing_when_condition_fails() {
        let updater = ConditionalAssignment::build(&demo_copy_config()).unwrap();
        for acting in [
            demo(None, Some(25), Some(29)),
            demo(Some(Gender::Female), Some(25), None),
            demo(Some(Gender::Female), None, Some(29)),
        ] {
            let mut event = LabelerEvent {
                acting_demo: Some(acting),
                ..Default::default()
            };
            let before = event.clone();
            updater.update(&mut event).unwrap();
            assert_eq!(event, before);
        }
    }

    #[test]
    fn skips_unset_source_fields() {
        let config = ConditionalAssignmentConfig {
            condition: Some(has("acting_demo.age")),
            assignments: vec![
                AssignmentConfig::new("acting_demo.age.min_age", "corrected_demo.age.min_age"),
                AssignmentConfig::new("acting_demo.age.max_age", "corrected_demo.age.max_age"),
            ],
        };
        let updater = ConditionalAssignment::build(&config).unwrap();
        let mut event = LabelerEvent {
            acting_demo: Some(demo(None, None, Some(29))),
            ..Default::default()
        };
        updater.update(&mut event).unwrap();
        assert_eq!(event.corrected_demo, Some(demo(None, None, Some(29))));
    }
}
