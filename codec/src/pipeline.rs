//! Queue buffer transforms: transposition, gzip and zstd.

use std::io::{Read, Write};

use bitbuf::{transpose_bits, BitBuffer};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use schema::Modifier;

use crate::error::{CodecError, CodecResult};

/// Applies one encoder pipeline step.
///
/// `state_bits` is the byte-padded bit size of one state, the row width the
/// transposition pivots on.
pub(crate) fn encode_step(
    modifier: Modifier,
    input: BitBuffer,
    state_bits: usize,
) -> CodecResult<BitBuffer> {
    match modifier {
        Modifier::Transpose => Ok(transpose_bits(&input, state_bits)?),
        Modifier::Gzip => Ok(BitBuffer::from_bytes(gzip_encode(input.as_bytes())?)),
        Modifier::Zstd => Ok(BitBuffer::from_bytes(zstd_encode(input.as_bytes())?)),
    }
}

/// Applies one decoder pipeline step.
///
/// On decode the transposition pivots on the state count, the inverse
/// orientation of the encode step; an empty buffer skips the step.
pub(crate) fn decode_step(
    modifier: Modifier,
    input: BitBuffer,
    state_bytes: usize,
) -> CodecResult<BitBuffer> {
    match modifier {
        Modifier::Transpose => {
            if input.is_empty() || state_bytes == 0 {
                return Ok(input);
            }
            let num_states = input.byte_size() / state_bytes;
            Ok(transpose_bits(&input, num_states)?)
        }
        Modifier::Gzip => Ok(BitBuffer::from_bytes(gzip_decode(input.as_bytes())?)),
        Modifier::Zstd => Ok(BitBuffer::from_bytes(zstd_decode(input.as_bytes())?)),
    }
}

fn gzip_encode(data: &[u8]) -> CodecResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(compression_error)?;
    encoder.finish().map_err(compression_error)
}

fn gzip_decode(data: &[u8]) -> CodecResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(compression_error)?;
    Ok(out)
}

fn zstd_encode(data: &[u8]) -> CodecResult<Vec<u8>> {
    zstd::encode_all(data, 0).map_err(compression_error)
}

fn zstd_decode(data: &[u8]) -> CodecResult<Vec<u8>> {
    zstd::decode_all(data).map_err(compression_error)
}

fn compression_error(err: std::io::Error) -> CodecError {
    CodecError::Compression {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_roundtrip() {
        let data = b"a highly repetitive payload payload payload payload".to_vec();
        let packed = gzip_encode(&data).unwrap();
        assert_eq!(gzip_decode(&packed).unwrap(), data);
        assert!(packed.len() < data.len());
    }

    #[test]
    fn zstd_roundtrip() {
        let data = vec![0xA5u8; 4096];
        let packed = zstd_encode(&data).unwrap();
        assert_eq!(zstd_decode(&packed).unwrap(), data);
        assert!(packed.len() < data.len());
    }

    #[test]
    fn gzip_rejects_garbage() {
        let err = gzip_decode(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap_err();
        assert!(matches!(err, CodecError::Compression { .. }));
    }

    #[test]
    fn zstd_rejects_garbage() {
        let err = zstd_decode(&[0x00, 0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, CodecError::Compression { .. }));
    }

    #[test]
    fn transpose_steps_are_inverse() {
        // Four 16-bit states.
        let buffer = BitBuffer::from_bytes(vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let encoded = encode_step(Modifier::Transpose, buffer.clone(), 16).unwrap();
        let decoded = decode_step(Modifier::Transpose, encoded, 2).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn transpose_decode_skips_empty_input() {
        let out = decode_step(Modifier::Transpose, BitBuffer::new(), 4).unwrap();
        assert!(out.is_empty());
    }
}
