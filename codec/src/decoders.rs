//! Decode/encode behavior of the virtual (decoded) fields.
//!
//! Descriptors live in the schema crate; this module interprets them over a
//! concrete [`State`]. Every transform reads or writes its source field
//! through [`State::get`]/[`State::set`], so alias resolution and field
//! validation apply on the way through.

use schema::{Decoder, Value, ValueError};

use crate::error::{CodecError, CodecResult};
use crate::state::State;

/// Computes the decoded view of a virtual field.
pub(crate) fn decode_virtual(state: &State<'_>, decoder: &Decoder) -> CodecResult<Value> {
    match decoder {
        Decoder::BufferToString { from } => {
            let value = state.get(from)?;
            let bytes = value.as_bytes().ok_or_else(|| CodecError::Value {
                field: from.clone(),
                source: ValueError::InvalidType {
                    expected: "byte buffer",
                },
            })?;
            let prefix = bytes.split(|&b| b == 0).next().unwrap_or(&[]);
            let text = std::str::from_utf8(prefix).map_err(|_| CodecError::Value {
                field: from.clone(),
                source: ValueError::InvalidType {
                    expected: "UTF-8 string",
                },
            })?;
            Ok(Value::Str(text.to_owned()))
        }

        Decoder::IntMap { from, map_id } => {
            let value = state.get(from)?;
            let key = value.as_i64().ok_or_else(|| CodecError::Value {
                field: from.clone(),
                source: ValueError::InvalidType { expected: "integer" },
            })?;
            let map = state
                .schema()
                .int_map(map_id)
                .ok_or_else(|| CodecError::MapNotFound {
                    map_id: map_id.clone(),
                })?;
            // An absent key is data, not an error: peers may ship values the
            // map has no label for yet.
            Ok(map
                .get(&key)
                .map_or(Value::Str("UNKNOWN".into()), Value::from_json))
        }

        Decoder::NumberToUnixTsMs { from, year, factor } => {
            let value = state.get(from)?;
            let v = value.as_f64().ok_or_else(|| CodecError::Value {
                field: from.clone(),
                source: ValueError::InvalidType { expected: "number" },
            })?;
            let unix_ms = epoch_millis(*year) + (v * factor).round() as i64;
            Ok(Value::Uint(unix_ms as u64))
        }

        Decoder::Flags { from, flags } => {
            let field = state
                .schema()
                .field(from)
                .ok_or_else(|| CodecError::FieldNotFound { name: from.clone() })?;
            let value = state.get(from)?;
            let raw = value.as_u64().ok_or_else(|| CodecError::Value {
                field: from.clone(),
                source: ValueError::InvalidType {
                    expected: "unsigned integer",
                },
            })?;
            let mut names = Vec::new();
            for (flag, &bit) in flags {
                if usize::from(bit) >= field.size() {
                    return Err(CodecError::FlagBitOutOfRange {
                        flag: flag.clone(),
                        bit,
                        size: field.size(),
                    });
                }
                if raw & (1 << bit) != 0 {
                    names.push(Value::Str(flag.clone()));
                }
            }
            Ok(Value::List(names))
        }
    }
}

/// Writes a value back through a virtual field's encode side.
pub(crate) fn encode_virtual(
    state: &mut State<'_>,
    decoder: &Decoder,
    value: Value,
) -> CodecResult<()> {
    match decoder {
        Decoder::BufferToString { from } => {
            let text = value.as_str().ok_or_else(|| CodecError::Value {
                field: from.clone(),
                source: ValueError::InvalidType { expected: "string" },
            })?;
            state.set(from, text.as_bytes().to_vec())
        }

        Decoder::IntMap { .. } => Err(CodecError::ReadOnlyDecoder {
            kind: decoder.kind(),
        }),

        Decoder::NumberToUnixTsMs { from, year, factor } => {
            let unix_ms = value.as_u64().ok_or_else(|| CodecError::Value {
                field: from.clone(),
                source: ValueError::InvalidType {
                    expected: "unsigned integer",
                },
            })?;
            let offset = (unix_ms as i64 - epoch_millis(*year)) as f64 / factor;
            state.set(from, offset)
        }

        Decoder::Flags { from, flags } => {
            let Value::List(names) = value else {
                return Err(CodecError::Value {
                    field: from.clone(),
                    source: ValueError::InvalidType {
                        expected: "list of strings",
                    },
                });
            };
            let field = state
                .schema()
                .field(from)
                .ok_or_else(|| CodecError::FieldNotFound { name: from.clone() })?;
            let mut raw = 0u64;
            for name in &names {
                let name = name.as_str().ok_or_else(|| CodecError::Value {
                    field: from.clone(),
                    source: ValueError::InvalidType {
                        expected: "list of strings",
                    },
                })?;
                let &bit = flags
                    .get(name)
                    .ok_or_else(|| CodecError::UnknownFlag { flag: name.into() })?;
                if usize::from(bit) >= field.size() {
                    return Err(CodecError::FlagBitOutOfRange {
                        flag: name.to_owned(),
                        bit,
                        size: field.size(),
                    });
                }
                raw |= 1 << bit;
            }
            state.set(from, raw)
        }
    }
}

/// Unix milliseconds of `year`-01-01T00:00:00Z, proleptic Gregorian.
fn epoch_millis(year: u32) -> i64 {
    let year = i64::from(year);
    let leaps_before = |y: i64| y / 4 - y / 100 + y / 400;
    let days = 365 * (year - 1970) + leaps_before(year - 1) - leaps_before(1969);
    days * 86_400_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_known_years() {
        assert_eq!(epoch_millis(1970), 0);
        assert_eq!(epoch_millis(1971), 365 * 86_400_000);
        // 1972 is the first leap year after the epoch.
        assert_eq!(epoch_millis(1973), (3 * 365 + 1) * 86_400_000);
        assert_eq!(epoch_millis(2021), 1_609_459_200_000);
        assert_eq!(epoch_millis(2022), 1_640_995_200_000);
        // 2000 was a leap year (divisible by 400), 2100 is not.
        assert_eq!(epoch_millis(2001), epoch_millis(2000) + 366 * 86_400_000);
    }
}
