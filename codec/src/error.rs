//! Error types for state and queue operations.

use std::fmt;

use bitbuf::BitBufError;
use schema::{DecoderKind, ValueError};

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while reading, writing, encoding or decoding
/// states and state queues.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// A value failed validation against a field.
    Value { field: String, source: ValueError },

    /// A name that is neither a field, a decoded field nor an alias.
    FieldNotFound { name: String },

    /// A state whose schema hash differs from the queue's.
    SchemaMismatch,

    /// An `IntMap` decoder referencing an undeclared int map.
    MapNotFound { map_id: String },

    /// A flag name not present in the decoder's flag table.
    UnknownFlag { flag: String },

    /// A flag whose bit position does not fit the source field.
    FlagBitOutOfRange {
        flag: String,
        bit: u8,
        size: usize,
    },

    /// An encode through a decoder that has no encode side.
    ReadOnlyDecoder { kind: DecoderKind },

    /// Pop from a queue holding no states.
    EmptyQueue,

    /// Indexed access past the end of a queue.
    IndexOutOfRange { index: usize, len: usize },

    /// A raw state image whose size does not match the schema.
    SizeMismatch { expected: usize, found: usize },

    /// A decoded queue payload that does not split into whole states.
    PayloadNotAligned { bytes: usize, state_bytes: usize },

    /// A compression or decompression step failed.
    Compression { message: String },

    /// A bit-level operation failed.
    Bits(BitBufError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { field, source } => {
                write!(f, "field \"{field}\": {source}")
            }
            Self::FieldNotFound { name } => {
                write!(f, "field \"{name}\" not found in schema")
            }
            Self::SchemaMismatch => {
                write!(f, "state schema does not match the queue schema")
            }
            Self::MapNotFound { map_id } => {
                write!(f, "map \"{map_id}\" not found")
            }
            Self::UnknownFlag { flag } => {
                write!(f, "unknown flag \"{flag}\"")
            }
            Self::FlagBitOutOfRange { flag, bit, size } => {
                write!(
                    f,
                    "flag \"{flag}\" bit position {bit} exceeds field size {size} bits"
                )
            }
            Self::ReadOnlyDecoder { kind } => {
                write!(f, "{kind} is a read-only decoder (can't encode)")
            }
            Self::EmptyQueue => {
                write!(f, "queue is empty")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for queue of {len} states")
            }
            Self::SizeMismatch { expected, found } => {
                write!(
                    f,
                    "state image is {found} bytes, schema requires {expected}"
                )
            }
            Self::PayloadNotAligned { bytes, state_bytes } => {
                write!(
                    f,
                    "payload of {bytes} bytes is not a whole number of {state_bytes}-byte states"
                )
            }
            Self::Compression { message } => {
                write!(f, "compression error: {message}")
            }
            Self::Bits(e) => {
                write!(f, "bit buffer error: {e}")
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Value { source, .. } => Some(source),
            Self::Bits(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BitBufError> for CodecError {
    fn from(err: BitBufError) -> Self {
        Self::Bits(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_value_includes_field_name() {
        let err = CodecError::Value {
            field: "SPEED".into(),
            source: ValueError::InvalidType { expected: "integer" },
        };
        let msg = err.to_string();
        assert!(msg.contains("\"SPEED\""));
        assert!(msg.contains("integer"));
    }

    #[test]
    fn error_display_flag_bit() {
        let err = CodecError::FlagBitOutOfRange {
            flag: "flag4".into(),
            bit: 4,
            size: 4,
        };
        assert_eq!(
            err.to_string(),
            "flag \"flag4\" bit position 4 exceeds field size 4 bits"
        );
    }

    #[test]
    fn error_display_read_only() {
        let err = CodecError::ReadOnlyDecoder {
            kind: DecoderKind::IntMap,
        };
        let msg = err.to_string();
        assert!(msg.contains("IntMap"));
        assert!(msg.contains("read-only"));
    }

    #[test]
    fn error_display_index_out_of_range() {
        let err = CodecError::IndexOutOfRange { index: 2, len: 2 };
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn error_from_bitbuf_error() {
        let err: CodecError = BitBufError::UnexpectedEof {
            requested: 8,
            available: 0,
        }
        .into();
        assert!(matches!(err, CodecError::Bits(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_source_threads_value_error() {
        let err = CodecError::Value {
            field: "F".into(),
            source: ValueError::NotFinite,
        };
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<CodecError>();
    }
}
