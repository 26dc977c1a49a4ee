//! Event schema and field reflection
//!
//! The labeler threads a single mutable [`LabelerEvent`] through a model tree.
//! Updaters and filters address its fields by dotted path (for example
//! `labeler_input.event_id.id_fingerprint`), so every message type carries a
//! static [`MessageDescriptor`] and implements [`Reflect`] for name-based
//! access. Message structs are generated by the `message!` macro:
//! - scalar and sub-message fields are `Option<_>` (presence is tracked)
//! - repeated fields are `Vec<_>`
//! - [`Merge`] follows protobuf merge semantics

use crate::errors::{LabelerError, Result};
use std::fmt;

/// Kind of a message field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Bool,
    Enum,
    String,
    Message,
    Repeated,
}

impl FieldKind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldKind::Int32 | FieldKind::UInt32 | FieldKind::Int64 | FieldKind::UInt64
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, FieldKind::Float | FieldKind::Double)
    }

    pub fn is_scalar(self) -> bool {
        !matches!(self, FieldKind::Message | FieldKind::Repeated)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Int32 => "int32",
            FieldKind::UInt32 => "uint32",
            FieldKind::Int64 => "int64",
            FieldKind::UInt64 => "uint64",
            FieldKind::Float => "float",
            FieldKind::Double => "double",
            FieldKind::Bool => "bool",
            FieldKind::Enum => "enum",
            FieldKind::String => "string",
            FieldKind::Message => "message",
            FieldKind::Repeated => "repeated",
        };
        f.write_str(name)
    }
}

/// A typed scalar value read from or written to an event field.
///
/// Values of the same kind compare by their payload; enums carry the
/// numeric value of the variant.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum FieldValue {
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Enum(i32),
    String(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::UInt32(_) => FieldKind::UInt32,
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::UInt64(_) => FieldKind::UInt64,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Double(_) => FieldKind::Double,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Enum(_) => FieldKind::Enum,
            FieldValue::String(_) => FieldKind::String,
        }
    }

    /// Parses the textual form of a value for `field`. Enum fields accept the
    /// variant name or its number.
    pub fn parse(field: &FieldDescriptor, text: &str) -> Option<FieldValue> {
        let text = text.trim();
        let value = match field.kind {
            FieldKind::Int32 => FieldValue::Int32(text.parse().ok()?),
            FieldKind::UInt32 => FieldValue::UInt32(text.parse().ok()?),
            FieldKind::Int64 => FieldValue::Int64(text.parse().ok()?),
            FieldKind::UInt64 => FieldValue::UInt64(text.parse().ok()?),
            FieldKind::Float => FieldValue::Float(text.parse().ok()?),
            FieldKind::Double => FieldValue::Double(text.parse().ok()?),
            FieldKind::Bool => FieldValue::Bool(text.parse().ok()?),
            FieldKind::Enum => {
                let number = match field.enum_values.iter().find(|(name, _)| *name == text) {
                    Some((_, number)) => *number,
                    None => text.parse().ok()?,
                };
                if !field.enum_values.iter().any(|(_, n)| *n == number) {
                    return None;
                }
                FieldValue::Enum(number)
            }
            FieldKind::String => FieldValue::String(text.to_string()),
            FieldKind::Message | FieldKind::Repeated => return None,
        };
        Some(value)
    }

    /// Builds an integer value of `kind` from `value`, or `None` when the kind
    /// is not an integer kind or the value is out of range.
    pub fn integer(kind: FieldKind, value: i64) -> Option<FieldValue> {
        match kind {
            FieldKind::Int32 => i32::try_from(value).ok().map(FieldValue::Int32),
            FieldKind::UInt32 => u32::try_from(value).ok().map(FieldValue::UInt32),
            FieldKind::Int64 => Some(FieldValue::Int64(value)),
            FieldKind::UInt64 => u64::try_from(value).ok().map(FieldValue::UInt64),
            _ => None,
        }
    }

    /// Numeric view of the value, `None` for non-numeric kinds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int32(v) => Some(f64::from(*v)),
            FieldValue::UInt32(v) => Some(f64::from(*v)),
            FieldValue::Int64(v) => Some(*v as f64),
            FieldValue::UInt64(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(f64::from(*v)),
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Int32(v) => (*v).into(),
            FieldValue::UInt32(v) => (*v).into(),
            FieldValue::Int64(v) => (*v).into(),
            FieldValue::UInt64(v) => (*v).into(),
            FieldValue::Float(v) => f64::from(*v).into(),
            FieldValue::Double(v) => (*v).into(),
            FieldValue::Bool(v) => (*v).into(),
            FieldValue::Enum(v) => (*v).into(),
            FieldValue::String(v) => v.clone().into(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Double(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Enum(v) => write!(f, "{v}"),
            FieldValue::String(v) => f.write_str(v),
        }
    }
}

/// Rust types usable as scalar message fields.
pub trait ScalarField: Clone + Sized {
    const KIND: FieldKind;
    const ENUM_VALUES: &'static [(&'static str, i32)] = &[];

    fn into_value(self) -> FieldValue;
    fn from_value(value: FieldValue) -> Option<Self>;
}

macro_rules! scalar_field {
    ($ty:ty, $kind:ident) => {
        impl ScalarField for $ty {
            const KIND: FieldKind = FieldKind::$kind;

            fn into_value(self) -> FieldValue {
                FieldValue::$kind(self)
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

scalar_field!(i32, Int32);
scalar_field!(u32, UInt32);
scalar_field!(i64, Int64);
scalar_field!(u64, UInt64);
scalar_field!(f32, Float);
scalar_field!(f64, Double);
scalar_field!(bool, Bool);
scalar_field!(String, String);

/// Static description of one message field
#[derive(Debug)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Descriptor of the sub-message for `FieldKind::Message` fields
    pub message: Option<&'static MessageDescriptor>,
    /// Variant names and numbers for `FieldKind::Enum` fields
    pub enum_values: &'static [(&'static str, i32)],
}

/// Static description of a message type
#[derive(Debug)]
pub struct MessageDescriptor {
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl MessageDescriptor {
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Name-based access to the fields of a message.
pub trait Reflect: fmt::Debug + Send + Sync {
    fn descriptor(&self) -> &'static MessageDescriptor;

    /// Value of a set scalar field.
    fn get_field(&self, name: &str) -> Option<FieldValue>;

    /// Writes a scalar field; fails when `value` has the wrong kind.
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// A set sub-message.
    fn message_field(&self, name: &str) -> Option<&dyn Reflect>;

    /// A sub-message, created empty when unset.
    fn message_field_mut(&mut self, name: &str) -> Option<&mut dyn Reflect>;

    /// Number of entries of a repeated field.
    fn repeated_len(&self, name: &str) -> usize;

    /// The whole message as JSON, unset fields omitted.
    fn to_json(&self) -> Result<serde_json::Value>;
}

/// Protobuf-style merge: set scalars overwrite, sub-messages merge
/// recursively and repeated fields append.
pub trait Merge {
    fn merge_from(&mut self, other: &Self);
}

impl<T: Clone> Merge for Vec<T> {
    fn merge_from(&mut self, other: &Self) {
        self.extend(other.iter().cloned());
    }
}

pub(crate) fn wrong_kind(message: &str, field: &str, value: &FieldValue) -> LabelerError {
    LabelerError::internal(format!(
        "cannot assign {} value {value} to {message}.{field}",
        value.kind()
    ))
}

/// Declares a message struct together with its descriptor, [`Reflect`] and
/// [`Merge`] implementations.
macro_rules! message {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            scalars { $( $(#[$smeta:meta])* $sfield:ident : $sty:ty ),* $(,)? }
            messages { $( $(#[$mmeta:meta])* $mfield:ident : $mty:ty ),* $(,)? }
            repeated { $( $(#[$rmeta:meta])* $rfield:ident : $rty:ty ),* $(,)? }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(
                $(#[$smeta])*
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $sfield: Option<$sty>,
            )*
            $(
                $(#[$mmeta])*
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $mfield: Option<$mty>,
            )*
            $(
                $(#[$rmeta])*
                #[serde(skip_serializing_if = "Vec::is_empty")]
                pub $rfield: Vec<$rty>,
            )*
        }

        impl $name {
            pub const DESCRIPTOR: &'static $crate::event::MessageDescriptor =
                &$crate::event::MessageDescriptor {
                    name: stringify!($name),
                    fields: &[
                        $(
                            $crate::event::FieldDescriptor {
                                name: stringify!($sfield),
                                kind: <$sty as $crate::event::ScalarField>::KIND,
                                message: None,
                                enum_values: <$sty as $crate::event::ScalarField>::ENUM_VALUES,
                            },
                        )*
                        $(
                            $crate::event::FieldDescriptor {
                                name: stringify!($mfield),
                                kind: $crate::event::FieldKind::Message,
                                message: Some(<$mty>::DESCRIPTOR),
                                enum_values: &[],
                            },
                        )*
                        $(
                            $crate::event::FieldDescriptor {
                                name: stringify!($rfield),
                                kind: $crate::event::FieldKind::Repeated,
                                message: None,
                                enum_values: &[],
                            },
                        )*
                    ],
                };
        }

        impl $crate::event::Reflect for $name {
            fn descriptor(&self) -> &'static $crate::event::MessageDescriptor {
                Self::DESCRIPTOR
            }

            fn get_field(&self, name: &str) -> Option<$crate::event::FieldValue> {
                let _ = name;
                $(
                    if name == stringify!($sfield) {
                        return self
                            .$sfield
                            .clone()
                            .map($crate::event::ScalarField::into_value);
                    }
                )*
                None
            }

            fn set_field(
                &mut self,
                name: &str,
                value: $crate::event::FieldValue,
            ) -> $crate::errors::Result<()> {
                $(
                    if name == stringify!($sfield) {
                        let typed = <$sty as $crate::event::ScalarField>::from_value(value.clone())
                            .ok_or_else(|| {
                                $crate::event::wrong_kind(stringify!($name), name, &value)
                            })?;
                        self.$sfield = Some(typed);
                        return Ok(());
                    }
                )*
                Err($crate::event::wrong_kind(stringify!($name), name, &value))
            }

            fn message_field(&self, name: &str) -> Option<&dyn $crate::event::Reflect> {
                let _ = name;
                $(
                    if name == stringify!($mfield) {
                        return self
                            .$mfield
                            .as_ref()
                            .map(|m| m as &dyn $crate::event::Reflect);
                    }
                )*
                None
            }

            fn message_field_mut(
                &mut self,
                name: &str,
            ) -> Option<&mut dyn $crate::event::Reflect> {
                let _ = name;
                $(
                    if name == stringify!($mfield) {
                        return Some(
                            self.$mfield.get_or_insert_with(Default::default)
                                as &mut dyn $crate::event::Reflect,
                        );
                    }
                )*
                None
            }

            fn repeated_len(&self, name: &str) -> usize {
                let _ = name;
                $(
                    if name == stringify!($rfield) {
                        return self.$rfield.len();
                    }
                )*
                0
            }

            fn to_json(&self) -> $crate::errors::Result<::serde_json::Value> {
                Ok(::serde_json::to_value(self)?)
            }
        }

        impl $crate::event::Merge for $name {
            fn merge_from(&mut self, other: &Self) {
                let _ = other;
                $(
                    if other.$sfield.is_some() {
                        self.$sfield = other.$sfield.clone();
                    }
                )*
                $(
                    if let Some(source) = &other.$mfield {
                        $crate::event::Merge::merge_from(
                            self.$mfield.get_or_insert_with(Default::default),
                            source,
                        );
                    }
                )*
                $(
                    $crate::event::Merge::merge_from(&mut self.$rfield, &other.$rfield);
                )*
            }
        }
    };
}

mod path;
mod types;

pub use path::FieldPath;
pub use types::*;
