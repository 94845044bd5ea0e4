//! Error types for bit buffer operations.

use std::fmt;

/// Result type for bit buffer operations.
pub type BitBufResult<T> = Result<T, BitBufError>;

/// Errors that can occur during bit-level reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitBufError {
    /// A bit range falls outside the buffer.
    OutOfBounds {
        /// Start of the requested range, in bits.
        offset: usize,
        /// Length of the requested range, in bits.
        bits: usize,
        /// Logical size of the buffer, in bits.
        bit_len: usize,
    },

    /// Attempted to pop more bits than the buffer holds.
    UnexpectedEof {
        /// Number of bits requested.
        requested: usize,
        /// Number of bits available.
        available: usize,
    },

    /// Invalid bit count for an integer operation.
    InvalidBitCount {
        /// The invalid bit count provided.
        bits: usize,
        /// Maximum allowed bits for this operation.
        max_bits: usize,
    },

    /// Buffer size is not a whole number of matrix rows.
    DimensionMismatch {
        /// Logical size of the buffer, in bits.
        bit_len: usize,
        /// Requested row width, in bits.
        row_bits: usize,
    },
}

impl fmt::Display for BitBufError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds {
                offset,
                bits,
                bit_len,
            } => {
                write!(
                    f,
                    "bit range {offset}..{} is out of bounds for a {bit_len}-bit buffer",
                    offset + bits
                )
            }
            Self::UnexpectedEof {
                requested,
                available,
            } => {
                write!(
                    f,
                    "unexpected EOF: requested {requested} bits, {available} available"
                )
            }
            Self::InvalidBitCount { bits, max_bits } => {
                write!(f, "invalid bit count {bits}, maximum allowed is {max_bits}")
            }
            Self::DimensionMismatch { bit_len, row_bits } => {
                write!(
                    f,
                    "buffer of {bit_len} bits is not a whole number of {row_bits}-bit rows"
                )
            }
        }
    }
}

impl std::error::Error for BitBufError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_out_of_bounds() {
        let err = BitBufError::OutOfBounds {
            offset: 4,
            bits: 8,
            bit_len: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("4..12"), "should mention the range");
        assert!(msg.contains("10"), "should mention the buffer size");
    }

    #[test]
    fn error_display_unexpected_eof() {
        let err = BitBufError::UnexpectedEof {
            requested: 8,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains('8'), "should mention requested bits");
        assert!(msg.contains('3'), "should mention available bits");
        assert!(msg.contains("EOF"), "should mention EOF");
    }

    #[test]
    fn error_display_invalid_bit_count() {
        let err = BitBufError::InvalidBitCount {
            bits: 65,
            max_bits: 64,
        };
        let msg = err.to_string();
        assert!(msg.contains("65"), "should mention the invalid count");
        assert!(msg.contains("64"), "should mention the maximum");
    }

    #[test]
    fn error_display_dimension_mismatch() {
        let err = BitBufError::DimensionMismatch {
            bit_len: 10,
            row_bits: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn error_equality_and_clone() {
        let err = BitBufError::UnexpectedEof {
            requested: 8,
            available: 3,
        };
        assert_eq!(err, err.clone());
        assert_ne!(
            err,
            BitBufError::UnexpectedEof {
                requested: 8,
                available: 4,
            }
        );
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<BitBufError>();
    }
}
