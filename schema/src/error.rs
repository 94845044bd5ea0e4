//! Schema construction and value validation errors.

use std::fmt;

use crate::value::Value;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while building a schema or parsing its JSON form.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Two fields share the same name.
    DuplicateFieldName { name: String },

    /// A field size is outside the legal span for its type.
    InvalidFieldSize { name: String, size: usize },

    /// A fixed-point field without a positive `decimals`.
    MissingDecimals { name: String },

    /// A default value that cannot be coerced to the field type.
    InvalidDefault { name: String, source: ValueError },

    /// An unrecognized field type string in JSON.
    UnknownFieldType { found: String },

    /// A pipeline string that does not split into modifiers.
    PipelineFormat { pipeline: String },

    /// An unrecognized pipeline modifier.
    UnknownModifier { found: String },

    /// An unrecognized decoder kind.
    UnknownDecoder { found: String },

    /// A decoder parameter that is required but absent.
    MissingParam {
        decoder: &'static str,
        param: &'static str,
    },

    /// A decoder parameter with an unusable value.
    InvalidParam {
        decoder: &'static str,
        param: &'static str,
        reason: String,
    },

    /// An int-map key that does not parse as a signed 64-bit integer.
    InvalidIntMapKey { map_id: String, key: String },

    /// Any other structural defect in the JSON form.
    Malformed { reason: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateFieldName { name } => {
                write!(f, "duplicate field name: {name}")
            }
            Self::InvalidFieldSize { name, size } => {
                write!(f, "invalid size {size} for field \"{name}\"")
            }
            Self::MissingDecimals { name } => {
                write!(
                    f,
                    "\"decimals\" must be > 0 for fixed point field \"{name}\""
                )
            }
            Self::InvalidDefault { name, source } => {
                write!(
                    f,
                    "default value does not match type of field \"{name}\": {source}"
                )
            }
            Self::UnknownFieldType { found } => {
                write!(f, "unknown field type \"{found}\"")
            }
            Self::PipelineFormat { pipeline } => {
                write!(f, "wrong pipeline format: \"{pipeline}\"")
            }
            Self::UnknownModifier { found } => {
                write!(f, "\"{found}\" is not a pipeline modifier")
            }
            Self::UnknownDecoder { found } => {
                write!(f, "unknown decoder \"{found}\"")
            }
            Self::MissingParam { decoder, param } => {
                write!(f, "{decoder} decoder: missing \"{param}\" parameter")
            }
            Self::InvalidParam {
                decoder,
                param,
                reason,
            } => {
                write!(f, "{decoder} decoder: \"{param}\" parameter {reason}")
            }
            Self::InvalidIntMapKey { map_id, key } => {
                write!(f, "can't parse \"{key}\" as int key (map \"{map_id}\")")
            }
            Self::Malformed { reason } => {
                write!(f, "malformed schema: {reason}")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidDefault { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised when a value fails validation against a field.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The value cannot be coerced to the field's type family.
    InvalidType { expected: &'static str },

    /// The value falls outside the field's representable span.
    OutOfRange {
        value: Value,
        min: Value,
        max: Value,
    },

    /// A float that is NaN or infinite.
    NotFinite,

    /// A buffer whose bit size exceeds the field size.
    BufferOverflow { bits: usize, max_bits: usize },
}

impl ValueError {
    /// Returns `true` for the type-mismatch variant (always fatal on set),
    /// `false` for the range family (buffer writes still truncate).
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::InvalidType { .. })
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidType { expected } => {
                write!(f, "value is not a valid {expected}")
            }
            Self::OutOfRange { value, min, max } => {
                write!(f, "value {value} out of range [{min}, {max}]")
            }
            Self::NotFinite => {
                write!(f, "value is not a finite number")
            }
            Self::BufferOverflow { bits, max_bits } => {
                write!(
                    f,
                    "buffer size {bits} bits exceeds field size {max_bits} bits"
                )
            }
        }
    }
}

impl std::error::Error for ValueError {}
