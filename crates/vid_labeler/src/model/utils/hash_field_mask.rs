use crate::errors::{LabelerError, Result};
use crate::event::{FieldKind, FieldPath, LabelerEvent};
use crate::hash::fingerprint64;
use crate::model::config::FieldMask;
use crate::serde_canon::to_canonical_json;
use std::collections::HashMap;

/// Matches events against a table of column events by the hash of a fixed set
/// of fields. An unset field only matches the same field unset; a masked
/// sub-message matches only an identical sub-message.
#[derive(Debug, Clone)]
pub struct HashFieldMaskMatcher {
    paths: Vec<FieldPath>,
    hashes: HashMap<u64, usize>,
}

impl HashFieldMaskMatcher {
    pub fn build(events: &[LabelerEvent], mask: &FieldMask) -> Result<Self> {
        if events.is_empty() {
            return Err(LabelerError::model(
                "The events is empty when building HashFieldMaskMatcher.",
            ));
        }
        if mask.paths.is_empty() {
            return Err(LabelerError::model(
                "The hashFieldMask is empty when building HashFieldMaskMatcher.",
            ));
        }
        let paths = mask
            .paths
            .iter()
            .map(|p| FieldPath::resolve(LabelerEvent::DESCRIPTOR, p))
            .collect::<Result<Vec<_>>>()?;

        let mut matcher = Self {
            paths,
            hashes: HashMap::with_capacity(events.len()),
        };
        for (index, event) in events.iter().enumerate() {
            let hash = matcher.masked_hash(event)?;
            if matcher.hashes.insert(hash, index).is_some() {
                return Err(LabelerError::model(
                    "Multiple events have the same hash when applying hash field mask.",
                ));
            }
        }
        Ok(matcher)
    }

    /// Index of the column event whose masked fields equal those of `event`.
    pub fn get_match(&self, event: &LabelerEvent) -> Result<Option<usize>> {
        Ok(self.hashes.get(&self.masked_hash(event)?).copied())
    }

    fn masked_hash(&self, event: &LabelerEvent) -> Result<u64> {
        let mut masked = serde_json::Map::with_capacity(self.paths.len());
        for path in &self.paths {
            // sub-messages are compared whole
            let value = if path.kind() == FieldKind::Message {
                match path.get_message(event) {
                    Some(message) => message.to_json()?,
                    None => serde_json::Value::Null,
                }
            } else {
                path.get(event)
                    .map_or(serde_json::Value::Null, |v| v.to_json())
            };
            masked.insert(path.as_str().to_string(), value);
        }
        Ok(fingerprint64(&to_canonical_json(&masked)?))
    }
}
