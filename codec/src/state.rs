//! A single bit-packed state record.

use std::collections::BTreeMap;

use bitbuf::BitBuffer;
use schema::{FieldDef, FieldKind, StateSchema, Value, ValueError};

use crate::decoders;
use crate::error::{CodecError, CodecResult};

/// One record over a schema: a bit-packed value for every schema field,
/// plus a virtual view over the schema's decoded fields.
///
/// A state exclusively owns its bit buffer; cloning produces an independent
/// deep copy that shares the same schema reference. All access goes through
/// [`get`](Self::get) and [`set`](Self::set), which resolve aliases and
/// validate values against the field declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct State<'a> {
    schema: &'a StateSchema,
    buffer: BitBuffer,
}

impl<'a> State<'a> {
    /// Creates a state with every field set to its default value.
    #[must_use]
    pub fn new(schema: &'a StateSchema) -> Self {
        let mut state = Self {
            schema,
            buffer: BitBuffer::with_bit_size(schema.byte_size() * 8),
        };
        let mut offset = 0;
        for field in schema.fields() {
            // Defaults are normalized at schema build, so the write cannot
            // fail.
            let _ = state.write_field(field, offset, field.default_value());
            offset += field.size();
        }
        state
    }

    /// Returns the schema this state is bound to.
    #[must_use]
    pub fn schema(&self) -> &'a StateSchema {
        self.schema
    }

    /// Returns the raw bit-packed image of the state.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Returns a copy of the raw bit-packed image.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.as_bytes().to_vec()
    }

    /// Writes the raw image into `out`, which must be exactly
    /// `schema.byte_size()` bytes.
    pub fn write_to(&self, out: &mut [u8]) -> CodecResult<()> {
        if out.len() != self.schema.byte_size() {
            return Err(CodecError::SizeMismatch {
                expected: self.schema.byte_size(),
                found: out.len(),
            });
        }
        out.copy_from_slice(self.buffer.as_bytes());
        Ok(())
    }

    /// Replaces the state contents with a raw image of exactly
    /// `schema.byte_size()` bytes.
    pub fn load(&mut self, data: &[u8]) -> CodecResult<()> {
        if data.len() != self.schema.byte_size() {
            return Err(CodecError::SizeMismatch {
                expected: self.schema.byte_size(),
                found: data.len(),
            });
        }
        self.buffer = BitBuffer::from_bytes(data.to_vec());
        Ok(())
    }

    /// Reads a field or decoded field, resolving aliases first.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FieldNotFound`] for an undeclared name and the
    /// decoder's error for a failing virtual field.
    pub fn get(&self, name: &str) -> CodecResult<Value> {
        let schema = self.schema;
        let name = schema.resolve_alias(name);
        if let Some((field, offset)) = schema.field_entry(name) {
            return self.read_field(field, offset);
        }
        if let Some(decoded) = schema.decoded_field(name) {
            return decoders::decode_virtual(self, decoded.decoder());
        }
        Err(CodecError::FieldNotFound {
            name: name.to_owned(),
        })
    }

    /// Writes a field or decoded field, resolving aliases first.
    ///
    /// The value is validated before the write. A type mismatch is fatal; an
    /// out-of-range value is fatal for every kind except buffers, where the
    /// truncating write is still performed and the range error is returned
    /// afterwards so the caller learns about the data loss.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> CodecResult<()> {
        let value = value.into();
        let schema = self.schema;
        let name = schema.resolve_alias(name);

        if let Some(decoded) = schema.decoded_field(name) {
            return decoders::encode_virtual(self, decoded.decoder(), value);
        }

        let Some((field, offset)) = schema.field_entry(name) else {
            return Err(CodecError::FieldNotFound {
                name: name.to_owned(),
            });
        };

        let validation = field.validate(&value);
        if let Err(source) = &validation {
            if source.is_type_error() || field.kind() != FieldKind::Buffer {
                return Err(CodecError::Value {
                    field: name.to_owned(),
                    source: source.clone(),
                });
            }
        }

        self.write_field(field, offset, &value)?;

        if let Err(source) = validation {
            // Oversized buffer input: the truncated write happened, surface
            // the range error so the caller is informed of the loss.
            return Err(CodecError::Value {
                field: name.to_owned(),
                source,
            });
        }
        Ok(())
    }

    /// Returns whether `value` equals the current field value under the
    /// field's canonical representation.
    ///
    /// Fixed-point candidates are normalized through the
    /// scale-round-unscale pipeline, so two floats mapping to the same
    /// integer carrier are deemed equal.
    pub fn same(&self, name: &str, value: &Value) -> CodecResult<bool> {
        let schema = self.schema;
        let name = schema.resolve_alias(name);

        if let Some((field, offset)) = schema.field_entry(name) {
            let invalid = |expected| CodecError::Value {
                field: name.to_owned(),
                source: ValueError::InvalidType { expected },
            };
            return match field.kind() {
                FieldKind::Fixed => {
                    let v = value.as_f64().ok_or_else(|| invalid("number"))?;
                    let candidate = (v * field.factor()).round();
                    let raw = self.buffer.read_uint(offset, field.size())?;
                    Ok(sign_extend(raw, field.size()) == candidate as i64)
                }
                FieldKind::Ufixed => {
                    let v = value.as_f64().ok_or_else(|| invalid("number"))?;
                    let candidate = (v * field.factor()).round();
                    if candidate < 0.0 {
                        return Ok(false);
                    }
                    let raw = self.buffer.read_uint(offset, field.size())?;
                    Ok(raw == candidate as u64)
                }
                _ => {
                    let candidate = canonicalize(field, value).map_err(|source| {
                        CodecError::Value {
                            field: name.to_owned(),
                            source,
                        }
                    })?;
                    Ok(self.read_field(field, offset)? == candidate)
                }
            };
        }

        if schema.decoded_field(name).is_some() {
            return Ok(self.get(name)? == *value);
        }
        Err(CodecError::FieldNotFound {
            name: name.to_owned(),
        })
    }

    /// Produces a map of every canonical field, every decoded field and
    /// every alias (mapped to the value of its target).
    pub fn to_map(&self) -> CodecResult<BTreeMap<String, Value>> {
        let mut map = BTreeMap::new();
        for field in self.schema.fields() {
            map.insert(field.name().to_owned(), self.get(field.name())?);
        }
        for decoded in self.schema.decoded_fields() {
            map.insert(decoded.name().to_owned(), self.get(decoded.name())?);
        }
        for (alias, target) in self.schema.aliases() {
            if let Some(value) = map.get(target) {
                let value = value.clone();
                map.insert(alias.to_owned(), value);
            }
        }
        Ok(map)
    }

    fn read_field(&self, field: &FieldDef, offset: usize) -> CodecResult<Value> {
        let value = match field.kind() {
            FieldKind::Int => {
                let raw = self.buffer.read_uint(offset, field.size())?;
                Value::Int(sign_extend(raw, field.size()))
            }
            FieldKind::Uint => Value::Uint(self.buffer.read_uint(offset, field.size())?),
            FieldKind::Fixed => {
                let raw = self.buffer.read_uint(offset, field.size())?;
                Value::Float(sign_extend(raw, field.size()) as f64 / field.factor())
            }
            FieldKind::Ufixed => {
                let raw = self.buffer.read_uint(offset, field.size())?;
                Value::Float(raw as f64 / field.factor())
            }
            FieldKind::Bool => Value::Bool(self.buffer.read_uint(offset, 1)? != 0),
            FieldKind::Float32 => {
                let raw = self.buffer.read_uint(offset, 32)?;
                Value::Float(f64::from(f32::from_bits(raw as u32)))
            }
            FieldKind::Float64 => {
                let raw = self.buffer.read_uint(offset, 64)?;
                Value::Float(f64::from_bits(raw))
            }
            FieldKind::Buffer => Value::Bytes(self.buffer.read_bytes(offset, field.size())?),
        };
        Ok(value)
    }

    fn write_field(&mut self, field: &FieldDef, offset: usize, value: &Value) -> CodecResult<()> {
        let invalid = |expected| CodecError::Value {
            field: field.name().to_owned(),
            source: ValueError::InvalidType { expected },
        };
        match field.kind() {
            FieldKind::Int => {
                let v = value.as_i64().ok_or_else(|| invalid("integer"))?;
                self.buffer.write_uint(offset, field.size(), v as u64)?;
            }
            FieldKind::Uint => {
                let v = value.as_u64().ok_or_else(|| invalid("unsigned integer"))?;
                self.buffer.write_uint(offset, field.size(), v)?;
            }
            FieldKind::Fixed => {
                let v = value.as_f64().ok_or_else(|| invalid("number"))?;
                let carrier = (v * field.factor()).round() as i64;
                self.buffer.write_uint(offset, field.size(), carrier as u64)?;
            }
            FieldKind::Ufixed => {
                let v = value.as_f64().ok_or_else(|| invalid("number"))?;
                let carrier = (v * field.factor()).round() as u64;
                self.buffer.write_uint(offset, field.size(), carrier)?;
            }
            FieldKind::Bool => {
                let v = value.as_bool().ok_or_else(|| invalid("boolean"))?;
                self.buffer.write_uint(offset, 1, u64::from(v))?;
            }
            FieldKind::Float32 => {
                let v = value.as_f64().ok_or_else(|| invalid("number"))?;
                self.buffer
                    .write_uint(offset, 32, u64::from((v as f32).to_bits()))?;
            }
            FieldKind::Float64 => {
                let v = value.as_f64().ok_or_else(|| invalid("number"))?;
                self.buffer.write_uint(offset, 64, v.to_bits())?;
            }
            FieldKind::Buffer => {
                let bytes = value.as_bytes().ok_or_else(|| invalid("byte buffer"))?;
                self.buffer.write_bytes(offset, bytes, field.size())?;
            }
        }
        Ok(())
    }
}

fn sign_extend(raw: u64, bits: usize) -> i64 {
    if bits < 64 && (raw >> (bits - 1)) & 1 == 1 {
        (raw | (u64::MAX << bits)) as i64
    } else {
        raw as i64
    }
}

/// Converts a candidate into the value [`State::read_field`] would return
/// after a round-trip through the bit buffer.
fn canonicalize(field: &FieldDef, value: &Value) -> Result<Value, ValueError> {
    let invalid = |expected| ValueError::InvalidType { expected };
    let canonical = match field.kind() {
        FieldKind::Int => Value::Int(value.as_i64().ok_or_else(|| invalid("integer"))?),
        FieldKind::Uint => Value::Uint(value.as_u64().ok_or_else(|| invalid("unsigned integer"))?),
        FieldKind::Bool => Value::Bool(value.as_bool().ok_or_else(|| invalid("boolean"))?),
        FieldKind::Float32 => Value::Float(f64::from(
            value.as_f64().ok_or_else(|| invalid("number"))? as f32,
        )),
        FieldKind::Float64 => Value::Float(value.as_f64().ok_or_else(|| invalid("number"))?),
        FieldKind::Buffer => {
            let bytes = value.as_bytes().ok_or_else(|| invalid("byte buffer"))?;
            let mut padded = bytes.to_vec();
            padded.resize(field.byte_capacity(), 0);
            if field.size() % 8 != 0 {
                let mask = 0xFFu8 << (8 - field.size() % 8);
                if let Some(last) = padded.last_mut() {
                    *last &= mask;
                }
            }
            Value::Bytes(padded)
        }
        FieldKind::Fixed | FieldKind::Ufixed => {
            unreachable!("fixed-point comparison goes through the carrier")
        }
    };
    Ok(canonical)
}
