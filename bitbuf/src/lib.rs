//! Low-level bit storage primitives for the statepack codec.
//!
//! This crate provides [`BitBuffer`], an owned bit-addressed buffer with
//! random-access reads/writes at arbitrary bit offsets and FIFO push/pop at
//! the tail/head, plus [`transpose_bits`] for bit-matrix transposition.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads/writes are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about schemas,
//!   fields, or states.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bitbuf::BitBuffer;
//!
//! let mut buf = BitBuffer::with_bit_size(12);
//! buf.write_uint(0, 3, 0b101).unwrap();
//! buf.write_uint(3, 9, 42).unwrap();
//!
//! assert_eq!(buf.read_uint(0, 3).unwrap(), 0b101);
//! assert_eq!(buf.read_uint(3, 9).unwrap(), 42);
//! ```

mod buffer;
mod error;
mod transpose;

pub use buffer::BitBuffer;
pub use error::{BitBufError, BitBufResult};
pub use transpose::transpose_bits;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = BitBuffer::new();
        let _ = BitBuffer::with_bit_size(8);
        let _: BitBufResult<()> = Ok(());
    }

    #[test]
    fn uint_roundtrip_various_sizes() {
        let test_cases = [
            (0b1010u64, 4usize),
            (0xFFu64, 8usize),
            (0xABCDu64, 16usize),
            (0x1234_5678u64, 32usize),
            (u64::MAX, 64usize),
        ];

        for (value, bits) in test_cases {
            let mut buf = BitBuffer::with_bit_size(bits);
            buf.write_uint(0, bits, value).unwrap();
            assert_eq!(
                buf.read_uint(0, bits).unwrap(),
                value,
                "roundtrip failed for {bits}-bit value {value}"
            );
        }
    }

    #[test]
    fn bytes_roundtrip_through_fifo() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut buf = BitBuffer::new();
        buf.push_bits(&payload, 32);

        let head = buf.pop_bits(32).unwrap();
        assert_eq!(head.as_bytes(), &payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn transpose_roundtrip_via_fifo_buffer() {
        let mut buf = BitBuffer::new();
        for i in 0u8..16 {
            buf.push_bits(&[i.wrapping_mul(37)], 8);
        }
        let t = transpose_bits(&buf, 8).unwrap();
        let back = transpose_bits(&t, 16).unwrap();
        assert_eq!(back, buf);
    }
}
