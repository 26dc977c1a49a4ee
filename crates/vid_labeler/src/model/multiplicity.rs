//! Event multiplicity: how many virtual people one event stands for
//!
//! The expected multiplicity `m` is rounded stochastically per event: with
//! `n = floor(m)`, the event yields `n + 1` clones when its seed falls below
//! `frac(m) * u64::MAX` and `n` otherwise, so the clone count equals `m` in
//! expectation while staying deterministic for a given fingerprint.

use crate::errors::{LabelerError, Result};
use crate::event::{FieldKind, FieldPath, FieldValue, LabelerEvent};
use crate::hash::fingerprint64;
use crate::model::config::MultiplicityConfig;

#[derive(Debug, Clone)]
enum ExpectedMultiplicity {
    Constant(f64),
    Field(FieldPath),
}

#[derive(Debug, Clone)]
pub struct Multiplicity {
    expected: ExpectedMultiplicity,
    cap_at_max: bool,
    max_value: f64,
    person_index_field: FieldPath,
    random_seed: String,
}

fn required<'a, T>(value: &'a Option<T>, name: &str) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| LabelerError::model(format!("Multiplicity must set {name}.")))
}

impl Multiplicity {
    pub fn build(config: &MultiplicityConfig) -> Result<Self> {
        let person_index_field = required(&config.person_index_field, "person_index_field")?;
        let max_value = *required(&config.max_value, "max_value")?;
        let cap_at_max = *required(&config.cap_at_max, "cap_at_max")?;
        let random_seed = required(&config.random_seed, "random_seed")?.clone();

        let expected = match (
            config.expected_multiplicity,
            config.expected_multiplicity_field.as_deref(),
        ) {
            (Some(value), None) => ExpectedMultiplicity::Constant(value),
            (None, Some(field)) => {
                let path = FieldPath::resolve(LabelerEvent::DESCRIPTOR, field)?;
                if !path.kind().is_numeric() {
                    return Err(LabelerError::model(format!(
                        "Unsupported field type for multiplicity: {}",
                        path.kind()
                    )));
                }
                ExpectedMultiplicity::Field(path)
            }
            (None, None) => {
                return Err(LabelerError::model("Multiplicity must set multiplicity_ref."))
            }
            (Some(_), Some(_)) => {
                return Err(LabelerError::model(
                    "Multiplicity must set only one of expected_multiplicity and expected_multiplicity_field.",
                ))
            }
        };

        let person_index_field = FieldPath::resolve(LabelerEvent::DESCRIPTOR, person_index_field)?;
        if !person_index_field.kind().is_integer() {
            return Err(LabelerError::model(format!(
                "Invalid type for person_index_field: {}",
                person_index_field.kind()
            )));
        }

        Ok(Self {
            expected,
            cap_at_max,
            max_value,
            person_index_field,
            random_seed,
        })
    }

    /// Number of clones `event` expands into.
    pub fn compute_event_multiplicity(&self, event: &LabelerEvent) -> Result<usize> {
        let mut expected = match &self.expected {
            ExpectedMultiplicity::Constant(value) => *value,
            ExpectedMultiplicity::Field(path) => path
                .get(event)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| LabelerError::event("The multiplicity field is not set."))?,
        };
        if expected > self.max_value {
            if !self.cap_at_max {
                return Err(LabelerError::event(format!(
                    "Expected multiplicity = {expected}, which exceeds the specified max value = {}",
                    self.max_value
                )));
            }
            expected = self.max_value;
        }
        if expected < 0.0 {
            return Err(LabelerError::event(format!(
                "Expected multiplicity = {expected}, but multiplicity must >= 0."
            )));
        }
        let seed = fingerprint64(&format!("{}{}", self.random_seed, event.fingerprint()));
        Ok(bimodal_integer(expected, seed))
    }

    /// Fingerprint of clone `index`; clone 0 keeps the original.
    pub fn fingerprint_for_index(&self, fingerprint: u64, index: usize) -> u64 {
        if index == 0 {
            return fingerprint;
        }
        fingerprint64(&format!("{}-clone-{index}-{fingerprint}", self.random_seed))
    }

    pub fn set_person_index(&self, event: &mut LabelerEvent, index: usize) -> Result<()> {
        let value = i64::try_from(index)
            .ok()
            .and_then(|i| FieldValue::integer(self.person_index_field.kind(), i))
            .ok_or_else(|| {
                LabelerError::event(format!(
                    "person index {index} does not fit {}",
                    self.person_index_field
                ))
            })?;
        self.person_index_field.set(event, value)
    }

    pub fn person_index_kind(&self) -> FieldKind {
        self.person_index_field.kind()
    }
}

fn bimodal_integer(expectation: f64, seed: u64) -> usize {
    let integral = expectation.floor();
    let threshold = ((expectation - integral) * u64::MAX as f64) as u64;
    let n = integral as usize;
    if seed < threshold {
        n + 1
    } else {
        n
    }
}
