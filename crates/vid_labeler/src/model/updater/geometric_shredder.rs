use crate::errors::{LabelerError, Result};
use crate::event::{FieldKind, FieldPath, FieldValue, LabelerEvent};
use crate::hash::{exp_hash, fingerprint64};
use crate::model::config::GeometricShredderConfig;

/// Replaces a uint64 target field with a derived hash with a probability that
/// grows geometrically with the randomness field.
///
/// `shred_hash = floor(exp_hash(randomness) / -ln(psi))`; a zero shred hash
/// leaves the target untouched, anything else rehashes the target with it.
#[derive(Debug, Clone)]
pub struct GeometricShredder {
    psi: f32,
    randomness_field: FieldPath,
    target_field: FieldPath,
    random_seed: String,
}

fn uint64_path(path: Option<&str>, role: &str) -> Result<FieldPath> {
    let path = path.ok_or_else(|| {
        LabelerError::model(format!("{role} is not set in GeometricShredder"))
    })?;
    let path = FieldPath::resolve(LabelerEvent::DESCRIPTOR, path)?;
    if path.kind() != FieldKind::UInt64 {
        return Err(LabelerError::model(format!(
            "{role} type is not uint64 in GeometricShredder: {path}"
        )));
    }
    Ok(path)
}

impl GeometricShredder {
    pub fn build(config: &GeometricShredderConfig) -> Result<Self> {
        let psi = config.psi.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&psi) {
            return Err(LabelerError::model(format!(
                "Psi is not in [0, 1] in GeometricShredder: {psi}"
            )));
        }
        Ok(Self {
            psi,
            randomness_field: uint64_path(config.randomness_field.as_deref(), "randomness_field")?,
            target_field: uint64_path(config.target_field.as_deref(), "target_field")?,
            random_seed: config.random_seed.clone().unwrap_or_default(),
        })
    }

    fn read_u64(path: &FieldPath, event: &LabelerEvent) -> Option<u64> {
        match path.get(event) {
            Some(FieldValue::UInt64(v)) => Some(v),
            _ => None,
        }
    }

    fn shred_hash(&self, event: &LabelerEvent) -> Result<u64> {
        if self.psi == 0.0 {
            return Ok(0);
        }
        let randomness = Self::read_u64(&self.randomness_field, event).ok_or_else(|| {
            LabelerError::event("The randomness field is not set in the event.")
        })?;
        if self.psi == 1.0 {
            return Ok(randomness);
        }
        // ln(psi) is rounded to single precision before dividing
        let neg_ln_psi = -f64::from(f64::from(self.psi).ln() as f32);
        Ok((exp_hash(&randomness.to_string()) / neg_ln_psi).floor() as u64)
    }

    pub fn update(&self, event: &mut LabelerEvent) -> Result<()> {
        let shred_hash = self.shred_hash(event)?;
        if shred_hash == 0 {
            return Ok(());
        }
        let target = Self::read_u64(&self.target_field, event)
            .ok_or_else(|| LabelerError::event("The target field is not set in the event."))?;
        let shred = fingerprint64(&format!(
            "{target}-shred-{shred_hash}-{}",
            self.random_seed
        ));
        self.target_field.set(event, FieldValue::UInt64(shred))
    }
}
