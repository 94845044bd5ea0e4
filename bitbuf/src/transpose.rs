//! Bit-matrix transposition.
//!
//! A buffer of `R × C` bits can be viewed as a row-major bit matrix with
//! `C`-bit rows. Transposing it makes bit `k` of every row contiguous in
//! the output, which clusters same-position bits of repeated records and
//! helps downstream LZ compression.

use crate::buffer::BitBuffer;
use crate::error::{BitBufError, BitBufResult};

/// Transposes the buffer viewed as a row-major matrix of `row_bits`-bit rows.
///
/// The output is the transposed matrix, again row-major (rows of
/// `bit_size / row_bits` bits). Applying the transpose twice with the
/// swapped dimension restores the original buffer:
/// `transpose_bits(&transpose_bits(&b, d)?, b.bit_size() / d)? == b`.
///
/// An empty buffer transposes to an empty buffer.
///
/// # Errors
///
/// Returns [`BitBufError::DimensionMismatch`] if `row_bits` is zero or the
/// buffer size is not a whole number of rows.
pub fn transpose_bits(input: &BitBuffer, row_bits: usize) -> BitBufResult<BitBuffer> {
    if input.is_empty() {
        return Ok(BitBuffer::new());
    }
    if row_bits == 0 || input.bit_size() % row_bits != 0 {
        return Err(BitBufError::DimensionMismatch {
            bit_len: input.bit_size(),
            row_bits,
        });
    }

    let rows = input.bit_size() / row_bits;
    let mut out = BitBuffer::with_bit_size(input.bit_size());
    for r in 0..rows {
        for c in 0..row_bits {
            if input.bit(r * row_bits + c)? {
                out.set_bit(c * rows + r, true)?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_transposes_to_empty() {
        let buf = BitBuffer::new();
        let out = transpose_bits(&buf, 8).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn identity_on_single_row() {
        let buf = BitBuffer::from_bytes(vec![0b1011_0010]);
        let out = transpose_bits(&buf, 8).unwrap();
        // One row of 8 bits becomes eight rows of 1 bit: same bit string.
        assert_eq!(out.as_bytes(), buf.as_bytes());
    }

    #[test]
    fn identity_on_single_column() {
        let buf = BitBuffer::from_bytes(vec![0b1011_0010]);
        let out = transpose_bits(&buf, 1).unwrap();
        assert_eq!(out.as_bytes(), buf.as_bytes());
    }

    #[test]
    fn transpose_two_by_eight() {
        // Two 8-bit rows.
        let buf = BitBuffer::from_bytes(vec![0b1111_0000, 0b1010_1010]);
        let out = transpose_bits(&buf, 8).unwrap();
        // Column k of the input becomes row k (2 bits) of the output:
        // (1,1) (1,0) (1,1) (1,0) (0,1) (0,0) (0,1) (0,0)
        assert_eq!(out.as_bytes(), &[0b1110_1110, 0b0100_0100]);
    }

    #[test]
    fn transpose_is_involutive() {
        let buf = BitBuffer::from_bytes(vec![0x3E, 0xA1, 0x5C, 0x77, 0x08, 0xFF]);
        let once = transpose_bits(&buf, 12).unwrap();
        let twice = transpose_bits(&once, buf.bit_size() / 12).unwrap();
        assert_eq!(twice, buf);
    }

    #[test]
    fn transpose_clusters_repeated_records() {
        // Four identical 8-bit records: every output row is all-ones or
        // all-zeros.
        let buf = BitBuffer::from_bytes(vec![0b1100_0001; 4]);
        let out = transpose_bits(&buf, 8).unwrap();
        assert_eq!(out.as_bytes(), &[0xFF, 0x00, 0x00, 0x0F]);
    }

    #[test]
    fn rejects_zero_row_width() {
        let buf = BitBuffer::from_bytes(vec![0xFF]);
        assert!(matches!(
            transpose_bits(&buf, 0),
            Err(BitBufError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_partial_rows() {
        let buf = BitBuffer::from_bytes(vec![0xFF]);
        assert!(matches!(
            transpose_bits(&buf, 3),
            Err(BitBufError::DimensionMismatch {
                bit_len: 8,
                row_bits: 3
            })
        ));
    }
}
