//! Field descriptors, normalization and validation.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value as JsonValue;

use crate::error::{SchemaError, SchemaResult, ValueError};
use crate::value::Value;

/// The wire type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Signed integer, two's complement over `size` bits.
    Int,
    /// Unsigned integer over `size` bits.
    Uint,
    /// Signed fixed-point number carried as a scaled integer.
    Fixed,
    /// Unsigned fixed-point number carried as a scaled integer.
    Ufixed,
    /// Single bit.
    Bool,
    /// IEEE 754 single precision, 32 bits.
    Float32,
    /// IEEE 754 double precision, 64 bits.
    Float64,
    /// Raw bit run.
    Buffer,
}

impl FieldKind {
    /// Returns the JSON name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Fixed => "fixed",
            Self::Ufixed => "ufixed",
            Self::Bool => "bool",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Buffer => "buffer",
        }
    }

    /// Parses a JSON type name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "uint" => Some(Self::Uint),
            "fixed" => Some(Self::Fixed),
            "ufixed" => Some(Self::Ufixed),
            "bool" => Some(Self::Bool),
            "float32" => Some(Self::Float32),
            "float64" => Some(Self::Float64),
            "buffer" => Some(Self::Buffer),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field definition within a schema.
///
/// Fields are created through the per-kind constructors and normalized when
/// the schema is built: type-specific size rules are enforced, the default
/// value is coerced to its canonical runtime representation, and the
/// fixed-point scale factor is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    name: String,
    kind: FieldKind,
    size: usize,
    decimals: u32,
    default_value: Value,
    aliases: Vec<String>,
    factor: f64,
}

impl FieldDef {
    fn new(name: impl Into<String>, kind: FieldKind, size: usize, decimals: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            decimals,
            default_value: Value::Null,
            aliases: Vec::new(),
            factor: 1.0,
        }
    }

    /// Creates a signed integer field of `size` bits.
    #[must_use]
    pub fn int(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, FieldKind::Int, size, 0)
    }

    /// Creates an unsigned integer field of `size` bits.
    #[must_use]
    pub fn uint(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, FieldKind::Uint, size, 0)
    }

    /// Creates a signed fixed-point field of `size` bits with `decimals`
    /// decimal places.
    #[must_use]
    pub fn fixed(name: impl Into<String>, size: usize, decimals: u32) -> Self {
        Self::new(name, FieldKind::Fixed, size, decimals)
    }

    /// Creates an unsigned fixed-point field of `size` bits with `decimals`
    /// decimal places.
    #[must_use]
    pub fn ufixed(name: impl Into<String>, size: usize, decimals: u32) -> Self {
        Self::new(name, FieldKind::Ufixed, size, decimals)
    }

    /// Creates a single-bit boolean field.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool, 1, 0)
    }

    /// Creates a 32-bit float field.
    #[must_use]
    pub fn float32(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float32, 32, 0)
    }

    /// Creates a 64-bit float field.
    #[must_use]
    pub fn float64(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float64, 64, 0)
    }

    /// Creates a raw buffer field of `size` bits.
    #[must_use]
    pub fn buffer(name: impl Into<String>, size: usize) -> Self {
        Self::new(name, FieldKind::Buffer, size, 0)
    }

    /// Sets the default value, coerced to the field type at schema build.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Adds alternate names that resolve to this field.
    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field kind.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns the size in bits.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of decimal places (fixed-point kinds only).
    #[must_use]
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Returns the normalized default value.
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Returns the alternate names of this field.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Returns the cached fixed-point scale factor (`10^decimals`).
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Returns the byte capacity of a buffer field (`⌈size/8⌉`).
    #[must_use]
    pub fn byte_capacity(&self) -> usize {
        self.size.div_ceil(8)
    }

    /// Enforces type-specific size rules and coerces the default value to
    /// its canonical runtime representation.
    pub(crate) fn normalize(&mut self) -> SchemaResult<()> {
        let zero = match self.kind {
            FieldKind::Int => {
                if self.size == 0 || self.size > 64 {
                    return Err(self.size_error());
                }
                Value::Int(0)
            }
            FieldKind::Uint => {
                if self.size == 0 || self.size > 64 {
                    return Err(self.size_error());
                }
                Value::Uint(0)
            }
            FieldKind::Fixed | FieldKind::Ufixed => {
                if self.size == 0 || self.size > 64 {
                    return Err(self.size_error());
                }
                if self.decimals == 0 {
                    return Err(SchemaError::MissingDecimals {
                        name: self.name.clone(),
                    });
                }
                self.factor = 10f64.powi(self.decimals as i32);
                Value::Float(0.0)
            }
            FieldKind::Bool => {
                self.size = 1;
                Value::Bool(false)
            }
            FieldKind::Float32 => {
                self.size = 32;
                Value::Float(0.0)
            }
            FieldKind::Float64 => {
                self.size = 64;
                Value::Float(0.0)
            }
            FieldKind::Buffer => {
                if self.size == 0 {
                    return Err(self.size_error());
                }
                Value::Bytes(vec![0; self.byte_capacity()])
            }
        };

        if self.default_value == Value::Null {
            self.default_value = zero;
            return Ok(());
        }

        let invalid = |expected: &'static str| SchemaError::InvalidDefault {
            name: self.name.clone(),
            source: ValueError::InvalidType { expected },
        };
        self.default_value = match self.kind {
            FieldKind::Int => Value::Int(
                self.default_value
                    .as_i64()
                    .ok_or_else(|| invalid("integer"))?,
            ),
            FieldKind::Uint => Value::Uint(
                self.default_value
                    .as_u64()
                    .ok_or_else(|| invalid("unsigned integer"))?,
            ),
            FieldKind::Fixed | FieldKind::Ufixed | FieldKind::Float64 => Value::Float(
                self.default_value
                    .as_f64()
                    .ok_or_else(|| invalid("number"))?,
            ),
            FieldKind::Float32 => Value::Float(f64::from(
                self.default_value
                    .as_f64()
                    .ok_or_else(|| invalid("number"))? as f32,
            )),
            FieldKind::Bool => Value::Bool(
                self.default_value
                    .as_bool()
                    .ok_or_else(|| invalid("boolean"))?,
            ),
            FieldKind::Buffer => match &self.default_value {
                Value::Bytes(bytes) => Value::Bytes(bytes.clone()),
                Value::Str(encoded) => Value::Bytes(
                    BASE64
                        .decode(encoded)
                        .map_err(|_| invalid("base64 string"))?,
                ),
                _ => return Err(invalid("byte buffer")),
            },
        };
        Ok(())
    }

    fn size_error(&self) -> SchemaError {
        SchemaError::InvalidFieldSize {
            name: self.name.clone(),
            size: self.size,
        }
    }

    fn int_bounds(&self) -> (i64, i64) {
        if self.size == 64 {
            (i64::MIN, i64::MAX)
        } else {
            (-(1i64 << (self.size - 1)), (1i64 << (self.size - 1)) - 1)
        }
    }

    fn uint_max(&self) -> u64 {
        if self.size == 64 {
            u64::MAX
        } else {
            (1u64 << self.size) - 1
        }
    }

    /// Validates a value against the field's type family and range.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidType`] when the value cannot be coerced
    /// to the field's family, and a range-family error
    /// ([`ValueError::OutOfRange`], [`ValueError::NotFinite`] or
    /// [`ValueError::BufferOverflow`]) when it exceeds the representable
    /// span.
    pub fn validate(&self, value: &Value) -> Result<(), ValueError> {
        match self.kind {
            FieldKind::Int => {
                let v = value.as_i64().ok_or(ValueError::InvalidType {
                    expected: "integer",
                })?;
                let (min, max) = self.int_bounds();
                if v < min || v > max {
                    return Err(ValueError::OutOfRange {
                        value: Value::Int(v),
                        min: Value::Int(min),
                        max: Value::Int(max),
                    });
                }
            }
            FieldKind::Uint => {
                let v = value.as_u64().ok_or(ValueError::InvalidType {
                    expected: "unsigned integer",
                })?;
                let max = self.uint_max();
                if v > max {
                    return Err(ValueError::OutOfRange {
                        value: Value::Uint(v),
                        min: Value::Uint(0),
                        max: Value::Uint(max),
                    });
                }
            }
            FieldKind::Fixed | FieldKind::Ufixed => {
                let v = value
                    .as_f64()
                    .ok_or(ValueError::InvalidType { expected: "number" })?;
                if !v.is_finite() {
                    return Err(ValueError::NotFinite);
                }
                let (min, max) = self.fixed_bounds();
                if v < min || v > max {
                    return Err(ValueError::OutOfRange {
                        value: Value::Float(v),
                        min: Value::Float(min),
                        max: Value::Float(max),
                    });
                }
            }
            FieldKind::Bool => {
                value.as_bool().ok_or(ValueError::InvalidType {
                    expected: "boolean",
                })?;
            }
            FieldKind::Float32 => {
                let v = value
                    .as_f64()
                    .ok_or(ValueError::InvalidType { expected: "number" })?;
                if !v.is_finite() {
                    return Err(ValueError::NotFinite);
                }
                if v < f64::from(f32::MIN) || v > f64::from(f32::MAX) {
                    return Err(ValueError::OutOfRange {
                        value: Value::Float(v),
                        min: Value::Float(f64::from(f32::MIN)),
                        max: Value::Float(f64::from(f32::MAX)),
                    });
                }
            }
            FieldKind::Float64 => {
                let v = value
                    .as_f64()
                    .ok_or(ValueError::InvalidType { expected: "number" })?;
                if !v.is_finite() {
                    return Err(ValueError::NotFinite);
                }
            }
            FieldKind::Buffer => {
                let bytes = value.as_bytes().ok_or(ValueError::InvalidType {
                    expected: "byte buffer",
                })?;
                let bits = bytes.len() * 8;
                if bits > self.size {
                    return Err(ValueError::BufferOverflow {
                        bits,
                        max_bits: self.size,
                    });
                }
            }
        }
        Ok(())
    }

    fn fixed_bounds(&self) -> (f64, f64) {
        let (min_carrier, max_carrier) = match self.kind {
            FieldKind::Fixed => {
                let (min, max) = self.int_bounds();
                (min as f64, max as f64)
            }
            FieldKind::Ufixed => (0.0, self.uint_max() as f64),
            _ => unreachable!("fixed_bounds is only called for fixed-point kinds"),
        };
        (min_carrier / self.factor, max_carrier / self.factor)
    }

    /// Returns the `(min, max)` pair of representable values.
    ///
    /// For buffers the pair is `(0, byte_capacity)`.
    #[must_use]
    pub fn range(&self) -> (Value, Value) {
        match self.kind {
            FieldKind::Int => {
                let (min, max) = self.int_bounds();
                (Value::Int(min), Value::Int(max))
            }
            FieldKind::Uint => (Value::Uint(0), Value::Uint(self.uint_max())),
            FieldKind::Fixed | FieldKind::Ufixed => {
                let (min, max) = self.fixed_bounds();
                (Value::Float(min), Value::Float(max))
            }
            FieldKind::Bool => (Value::Bool(false), Value::Bool(true)),
            FieldKind::Float32 => (
                Value::Float(f64::from(f32::MIN)),
                Value::Float(f64::from(f32::MAX)),
            ),
            FieldKind::Float64 => (Value::Float(f64::MIN), Value::Float(f64::MAX)),
            FieldKind::Buffer => (
                Value::Uint(0),
                Value::Uint(self.byte_capacity() as u64),
            ),
        }
    }

    /// Serializes the field to its JSON object form.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        map.insert("name".into(), JsonValue::String(self.name.clone()));
        map.insert("type".into(), JsonValue::String(self.kind.as_str().into()));
        map.insert("size".into(), JsonValue::from(self.size));
        if matches!(self.kind, FieldKind::Fixed | FieldKind::Ufixed) {
            map.insert("decimals".into(), JsonValue::from(self.decimals));
        }
        map.insert("defaultValue".into(), self.default_value.to_json());
        if !self.aliases.is_empty() {
            map.insert(
                "aliases".into(),
                JsonValue::Array(
                    self.aliases
                        .iter()
                        .map(|a| JsonValue::String(a.clone()))
                        .collect(),
                ),
            );
        }
        JsonValue::Object(map)
    }

    /// Parses a field from its JSON object form and normalizes it.
    pub fn from_json(json: &JsonValue) -> SchemaResult<Self> {
        let obj = json.as_object().ok_or_else(|| SchemaError::Malformed {
            reason: "field entry is not an object".into(),
        })?;
        let name = obj
            .get("name")
            .and_then(JsonValue::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SchemaError::Malformed {
                reason: "field name not found".into(),
            })?;
        let type_str = obj
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| SchemaError::Malformed {
                reason: format!("field \"{name}\" has no type"),
            })?;
        let kind = FieldKind::parse(type_str).ok_or_else(|| SchemaError::UnknownFieldType {
            found: type_str.to_owned(),
        })?;
        let size = obj
            .get("size")
            .and_then(JsonValue::as_u64)
            .unwrap_or(0) as usize;
        let decimals = obj
            .get("decimals")
            .and_then(JsonValue::as_u64)
            .unwrap_or(0) as u32;

        let mut field = Self::new(name, kind, size, decimals);
        if let Some(default) = obj.get("defaultValue") {
            field.default_value = Value::from_json(default);
        }
        if let Some(aliases) = obj.get("aliases") {
            let aliases = aliases
                .as_array()
                .ok_or_else(|| SchemaError::Malformed {
                    reason: format!("aliases of field \"{name}\" is not an array"),
                })?;
            field.aliases = aliases
                .iter()
                .map(|a| {
                    a.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| SchemaError::Malformed {
                            reason: format!("alias of field \"{name}\" is not a string"),
                        })
                })
                .collect::<SchemaResult<_>>()?;
        }
        field.normalize()?;
        Ok(field)
    }
}
