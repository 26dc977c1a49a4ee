//! Field filters: structured conditions over event fields
//!
//! A [`FieldFilterConfig`] is the wire form used by branch conditions and
//! updaters; [`FieldFilter`] is its compiled form, with every field path
//! resolved and every literal parsed once at build time.

use crate::errors::{LabelerError, Result};
use crate::event::{FieldKind, FieldPath, FieldValue, LabelerEvent, MessageDescriptor, Reflect};
use serde::{Deserialize, Serialize};

/// Filter operators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOp {
    #[default]
    Invalid,
    True,
    Has,
    Equal,
    Gt,
    Lt,
    In,
    And,
    Or,
    Not,
    Partial,
}

/// Wire form of a field filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldFilterConfig {
    pub op: FilterOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_filters: Vec<FieldFilterConfig>,
}

impl FieldFilterConfig {
    pub fn op(op: FilterOp) -> Self {
        Self {
            op,
            ..Default::default()
        }
    }

    pub fn field(op: FilterOp, name: &str) -> Self {
        Self {
            op,
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn equal(name: &str, value: &str) -> Self {
        Self {
            op: FilterOp::Equal,
            name: Some(name.to_string()),
            value: Some(value.to_string()),
            sub_filters: Vec::new(),
        }
    }

    pub fn with_sub_filters(op: FilterOp, sub_filters: Vec<FieldFilterConfig>) -> Self {
        Self {
            op,
            sub_filters,
            ..Default::default()
        }
    }
}

/// A compiled field filter
#[derive(Debug, Clone)]
pub enum FieldFilter {
    True,
    Has(FieldPath),
    Equal(FieldPath, FieldValue),
    Gt(FieldPath, FieldValue),
    Lt(FieldPath, FieldValue),
    In(FieldPath, Vec<FieldValue>),
    And(Vec<FieldFilter>),
    Or(Vec<FieldFilter>),
    Not(Box<FieldFilter>),
    Partial(FieldPath, Vec<FieldFilter>),
}

impl FieldFilter {
    /// Compiles a filter over [`LabelerEvent`].
    pub fn new(config: &FieldFilterConfig) -> Result<Self> {
        Self::build(LabelerEvent::DESCRIPTOR, config)
    }

    /// Compiles a filter over messages described by `descriptor`.
    pub fn build(descriptor: &'static MessageDescriptor, config: &FieldFilterConfig) -> Result<Self> {
        let invalid = |reason: &str| {
            LabelerError::model(format!("{reason} in field filter: {config:?}"))
        };
        let path = || -> Result<FieldPath> {
            let name = config.name.as_deref().ok_or_else(|| invalid("name is not set"))?;
            FieldPath::resolve(descriptor, name)
        };
        let scalar_path = || -> Result<FieldPath> {
            let path = path()?;
            if !path.kind().is_scalar() {
                return Err(invalid("name must refer to a scalar field"));
            }
            Ok(path)
        };
        let literal = |path: &FieldPath, text: &str| -> Result<FieldValue> {
            FieldValue::parse(path.leaf(), text).ok_or_else(|| {
                invalid(&format!("value \"{text}\" is not a valid {}", path.kind()))
            })
        };
        let value = || config.value.as_deref().ok_or_else(|| invalid("value is not set"));
        let subs = |descriptor: &'static MessageDescriptor| -> Result<Vec<FieldFilter>> {
            if config.sub_filters.is_empty() {
                return Err(invalid("sub_filters is empty"));
            }
            config
                .sub_filters
                .iter()
                .map(|sub| Self::build(descriptor, sub))
                .collect()
        };

        match config.op {
            FilterOp::Invalid => Err(invalid("op is not set")),
            FilterOp::True => Ok(FieldFilter::True),
            FilterOp::Has => Ok(FieldFilter::Has(path()?)),
            FilterOp::Equal => {
                let path = scalar_path()?;
                let value = literal(&path, value()?)?;
                Ok(FieldFilter::Equal(path, value))
            }
            FilterOp::Gt | FilterOp::Lt => {
                let path = scalar_path()?;
                if !path.kind().is_numeric() {
                    return Err(invalid("GT and LT require a numeric field"));
                }
                let value = literal(&path, value()?)?;
                Ok(if config.op == FilterOp::Gt {
                    FieldFilter::Gt(path, value)
                } else {
                    FieldFilter::Lt(path, value)
                })
            }
            FilterOp::In => {
                let path = scalar_path()?;
                let values = value()?
                    .split(',')
                    .map(|text| literal(&path, text))
                    .collect::<Result<Vec<_>>>()?;
                Ok(FieldFilter::In(path, values))
            }
            FilterOp::And => Ok(FieldFilter::And(subs(descriptor)?)),
            FilterOp::Or => Ok(FieldFilter::Or(subs(descriptor)?)),
            FilterOp::Not => {
                let mut subs = subs(descriptor)?;
                if subs.len() != 1 {
                    return Err(invalid("NOT requires exactly one sub filter"));
                }
                Ok(FieldFilter::Not(Box::new(subs.remove(0))))
            }
            FilterOp::Partial => {
                let path = path()?;
                let inner = path
                    .message_descriptor()
                    .ok_or_else(|| invalid("PARTIAL requires a message field"))?;
                Ok(FieldFilter::Partial(path, subs(inner)?))
            }
        }
    }

    /// A filter matching events whose fields equal every set scalar of
    /// `event`. An event with no set scalar yields [`FieldFilter::True`].
    pub fn from_event(event: &LabelerEvent) -> Result<Self> {
        let mut equals = Vec::new();
        collect_equals(event, LabelerEvent::DESCRIPTOR, "", &mut equals)?;
        Ok(match equals.len() {
            0 => FieldFilter::True,
            1 => equals.remove(0),
            _ => FieldFilter::And(equals),
        })
    }

    pub fn matches(&self, event: &dyn Reflect) -> bool {
        self.matches_opt(Some(event))
    }

    /// `None` stands for an unset message: every field reads as unset.
    fn matches_opt(&self, message: Option<&dyn Reflect>) -> bool {
        let get = |path: &FieldPath| message.and_then(|m| path.get(m));
        match self {
            FieldFilter::True => true,
            FieldFilter::Has(path) => message.is_some_and(|m| path.is_set(m)),
            FieldFilter::Equal(path, value) => get(path).as_ref() == Some(value),
            FieldFilter::Gt(path, value) => get(path).is_some_and(|v| v > *value),
            FieldFilter::Lt(path, value) => get(path).is_some_and(|v| v < *value),
            FieldFilter::In(path, values) => get(path).is_some_and(|v| values.contains(&v)),
            FieldFilter::And(filters) => filters.iter().all(|f| f.matches_opt(message)),
            FieldFilter::Or(filters) => filters.iter().any(|f| f.matches_opt(message)),
            FieldFilter::Not(filter) => !filter.matches_opt(message),
            FieldFilter::Partial(path, filters) => {
                let inner = message.and_then(|m| path.get_message(m));
                filters.iter().all(|f| f.matches_opt(inner))
            }
        }
    }
}

fn collect_equals(
    message: &dyn Reflect,
    descriptor: &'static MessageDescriptor,
    prefix: &str,
    out: &mut Vec<FieldFilter>,
) -> Result<()> {
    for field in descriptor.fields {
        let name = format!("{prefix}{}", field.name);
        match field.kind {
            FieldKind::Repeated => {
                if message.repeated_len(field.name) > 0 {
                    return Err(LabelerError::model(format!(
                        "repeated field {name} cannot be used as a match condition"
                    )));
                }
            }
            FieldKind::Message => {
                if let (Some(child), Some(child_desc)) =
                    (message.message_field(field.name), field.message)
                {
                    collect_equals(child, child_desc, &format!("{name}."), out)?;
                }
            }
            _ => {
                if let Some(value) = message.get_field(field.name) {
                    let path = FieldPath::resolve(LabelerEvent::DESCRIPTOR, &name)?;
                    out.push(FieldFilter::Equal(path, value));
                }
            }
        }
    }
    Ok(())
}

/// Returns the index of the first filter matching an event.
#[derive(Debug, Clone)]
pub struct FieldFiltersMatcher {
    filters: Vec<FieldFilter>,
}

impl FieldFiltersMatcher {
    pub fn build(configs: &[FieldFilterConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Err(LabelerError::model(
                "The given field filter configs is empty.",
            ));
        }
        let filters = configs.iter().map(FieldFilter::new).collect::<Result<_>>()?;
        Ok(Self { filters })
    }

    pub fn from_filters(filters: Vec<FieldFilter>) -> Self {
        Self { filters }
    }

    pub fn first_match(&self, event: &LabelerEvent) -> Option<usize> {
        self.filters.iter().position(|f| f.matches(event))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
