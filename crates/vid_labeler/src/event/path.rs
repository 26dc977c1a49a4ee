use super::{FieldDescriptor, FieldKind, FieldValue, MessageDescriptor, Reflect};
use crate::errors::{LabelerError, Result};
use std::fmt;

/// A dotted field path resolved against a message descriptor.
///
/// Every segment except the last is a singular sub-message; the last segment
/// is a scalar or a sub-message. Paths never cross repeated fields.
#[derive(Clone)]
pub struct FieldPath {
    path: String,
    segments: Vec<&'static FieldDescriptor>,
}

impl FieldPath {
    pub fn resolve(root: &'static MessageDescriptor, path: &str) -> Result<Self> {
        let invalid = || {
            LabelerError::model(format!(
                "invalid field name \"{path}\" for message {}",
                root.name
            ))
        };
        if path.is_empty() {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        let mut current = Some(root);
        for name in path.split('.') {
            let descriptor = current.ok_or_else(invalid)?;
            let field = descriptor.field(name).ok_or_else(invalid)?;
            if field.kind == FieldKind::Repeated {
                return Err(invalid());
            }
            segments.push(field);
            current = field.message;
        }

        Ok(Self {
            path: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> FieldKind {
        self.leaf().kind
    }

    pub fn leaf(&self) -> &'static FieldDescriptor {
        // resolve() rejects empty paths
        self.segments[self.segments.len() - 1]
    }

    /// Descriptor of the sub-message the path points at, if any.
    pub fn message_descriptor(&self) -> Option<&'static MessageDescriptor> {
        self.leaf().message
    }

    fn parent<'a>(&self, root: &'a dyn Reflect) -> Option<&'a dyn Reflect> {
        let (_, parents) = self.segments.split_last()?;
        parents
            .iter()
            .try_fold(root, |message, field| message.message_field(field.name))
    }

    /// Value of the scalar at this path; `None` when it or any enclosing
    /// message is unset.
    pub fn get(&self, root: &dyn Reflect) -> Option<FieldValue> {
        self.parent(root)?.get_field(self.leaf().name)
    }

    /// The sub-message at this path, when set.
    pub fn get_message<'a>(&self, root: &'a dyn Reflect) -> Option<&'a dyn Reflect> {
        self.parent(root)?.message_field(self.leaf().name)
    }

    pub fn is_set(&self, root: &dyn Reflect) -> bool {
        if self.kind() == FieldKind::Message {
            self.get_message(root).is_some()
        } else {
            self.get(root).is_some()
        }
    }

    /// Writes the scalar at this path, creating enclosing messages.
    pub fn set(&self, root: &mut dyn Reflect, value: FieldValue) -> Result<()> {
        set_in(root, &self.segments, value)
    }
}

fn set_in(
    message: &mut dyn Reflect,
    segments: &[&'static FieldDescriptor],
    value: FieldValue,
) -> Result<()> {
    match segments {
        [leaf] => message.set_field(leaf.name, value),
        [head, rest @ ..] => {
            let name = message.descriptor().name;
            let child = message.message_field_mut(head.name).ok_or_else(|| {
                LabelerError::internal(format!("{name}.{} is not a message", head.name))
            })?;
            set_in(child, rest, value)
        }
        [] => Err(LabelerError::internal("empty field path")),
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPath").field(&self.path).finish()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
