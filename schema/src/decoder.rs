//! Decoded (virtual) field descriptors.
//!
//! A decoder describes how a virtual field projects one of the schema's
//! wire fields into an alternative view: a NUL-terminated string, a label
//! from an integer map, an absolute unix-milliseconds timestamp, or a set of
//! flag names. The descriptor is pure data; the decode/encode behavior over
//! a concrete state lives in the codec layer.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::{SchemaError, SchemaResult};

/// The kind of a decoded-field transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    BufferToString,
    IntMap,
    NumberToUnixTsMs,
    Flags,
}

impl DecoderKind {
    /// Returns the JSON name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BufferToString => "BufferToString",
            Self::IntMap => "IntMap",
            Self::NumberToUnixTsMs => "NumberToUnixTsMs",
            Self::Flags => "Flags",
        }
    }

    /// Parses a JSON decoder name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "BufferToString" => Some(Self::BufferToString),
            "IntMap" => Some(Self::IntMap),
            "NumberToUnixTsMs" => Some(Self::NumberToUnixTsMs),
            "Flags" => Some(Self::Flags),
            _ => None,
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded-field transform with its parameters.
///
/// `IntMap` is read-only: its encode side is rejected by the codec layer as
/// an unsupported operation, a static property of the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoder {
    /// Reads a buffer field as a UTF-8 string up to the first NUL byte.
    BufferToString { from: String },

    /// Maps a signed integer field through a named int map.
    IntMap { from: String, map_id: String },

    /// Reconstructs an absolute unix-milliseconds timestamp from a narrow
    /// offset: `unix_millis(year-01-01) + round(value × factor)`.
    NumberToUnixTsMs { from: String, year: u32, factor: f64 },

    /// Projects an unsigned field into the set of flag names whose bit is
    /// set.
    Flags {
        from: String,
        flags: BTreeMap<String, u8>,
    },
}

impl Decoder {
    /// Constructs a decoder from its JSON kind name and parameter object.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDecoder`] for an unrecognized kind and
    /// a parameter error when a required parameter is absent or unusable.
    pub fn new(kind: &str, params: &JsonValue) -> SchemaResult<Self> {
        let kind = DecoderKind::parse(kind).ok_or_else(|| SchemaError::UnknownDecoder {
            found: kind.to_owned(),
        })?;
        Self::with_kind(kind, params)
    }

    /// Constructs a decoder of a known kind from a parameter object.
    pub fn with_kind(kind: DecoderKind, params: &JsonValue) -> SchemaResult<Self> {
        let name = kind.as_str();
        match kind {
            DecoderKind::BufferToString => Ok(Self::BufferToString {
                from: str_param(name, params, "from")?,
            }),
            DecoderKind::IntMap => Ok(Self::IntMap {
                from: str_param(name, params, "from")?,
                map_id: str_param(name, params, "mapId")?,
            }),
            DecoderKind::NumberToUnixTsMs => {
                let from = str_param(name, params, "from")?;
                let year = uint_param(name, params, "year")?;
                let factor = float_param(name, params, "factor")?;
                if year < 1970 {
                    return Err(SchemaError::InvalidParam {
                        decoder: name,
                        param: "year",
                        reason: "must be >= 1970".into(),
                    });
                }
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(SchemaError::InvalidParam {
                        decoder: name,
                        param: "factor",
                        reason: "must be > 0".into(),
                    });
                }
                let year = u32::try_from(year).map_err(|_| SchemaError::InvalidParam {
                    decoder: name,
                    param: "year",
                    reason: "is too large".into(),
                })?;
                Ok(Self::NumberToUnixTsMs { from, year, factor })
            }
            DecoderKind::Flags => {
                let from = str_param(name, params, "from")?;
                let raw = params
                    .get("flags")
                    .and_then(JsonValue::as_object)
                    .ok_or(SchemaError::MissingParam {
                        decoder: name,
                        param: "flags",
                    })?;
                let mut flags = BTreeMap::new();
                for (flag, bit) in raw {
                    let bit = bit
                        .as_u64()
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or_else(|| SchemaError::InvalidParam {
                            decoder: name,
                            param: "flags",
                            reason: format!("flag \"{flag}\" bit position is not a valid u8"),
                        })?;
                    flags.insert(flag.clone(), bit);
                }
                Ok(Self::Flags { from, flags })
            }
        }
    }

    /// Returns the kind of this decoder.
    #[must_use]
    pub fn kind(&self) -> DecoderKind {
        match self {
            Self::BufferToString { .. } => DecoderKind::BufferToString,
            Self::IntMap { .. } => DecoderKind::IntMap,
            Self::NumberToUnixTsMs { .. } => DecoderKind::NumberToUnixTsMs,
            Self::Flags { .. } => DecoderKind::Flags,
        }
    }

    /// Returns the name of the wire field this decoder reads.
    #[must_use]
    pub fn from_field(&self) -> &str {
        match self {
            Self::BufferToString { from }
            | Self::IntMap { from, .. }
            | Self::NumberToUnixTsMs { from, .. }
            | Self::Flags { from, .. } => from,
        }
    }

    /// Returns `true` when the decoder has no encode side.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::IntMap { .. })
    }

    /// Projects the parameters back into their JSON object form.
    #[must_use]
    pub fn params(&self) -> JsonValue {
        match self {
            Self::BufferToString { from } => serde_json::json!({ "from": from }),
            Self::IntMap { from, map_id } => {
                serde_json::json!({ "from": from, "mapId": map_id })
            }
            Self::NumberToUnixTsMs { from, year, factor } => {
                serde_json::json!({ "from": from, "year": year, "factor": factor })
            }
            Self::Flags { from, flags } => serde_json::json!({ "from": from, "flags": flags }),
        }
    }
}

fn str_param(decoder: &'static str, params: &JsonValue, param: &'static str) -> SchemaResult<String> {
    params
        .get(param)
        .and_then(JsonValue::as_str)
        .map(str::to_owned)
        .ok_or(SchemaError::MissingParam { decoder, param })
}

/// Accepts a JSON number or a numeric string, as emitted by some legacy
/// schema writers.
fn uint_param(decoder: &'static str, params: &JsonValue, param: &'static str) -> SchemaResult<u64> {
    let value = params
        .get(param)
        .ok_or(SchemaError::MissingParam { decoder, param })?;
    match value {
        JsonValue::Number(n) => n.as_u64().ok_or_else(|| SchemaError::InvalidParam {
            decoder,
            param,
            reason: "is not an unsigned integer".into(),
        }),
        JsonValue::String(s) => s.parse().map_err(|_| SchemaError::InvalidParam {
            decoder,
            param,
            reason: "is not an unsigned integer".into(),
        }),
        _ => Err(SchemaError::InvalidParam {
            decoder,
            param,
            reason: "is not an unsigned integer".into(),
        }),
    }
}

fn float_param(decoder: &'static str, params: &JsonValue, param: &'static str) -> SchemaResult<f64> {
    let value = params
        .get(param)
        .ok_or(SchemaError::MissingParam { decoder, param })?;
    match value {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| SchemaError::InvalidParam {
            decoder,
            param,
            reason: "is not a number".into(),
        }),
        JsonValue::String(s) => s.parse().map_err(|_| SchemaError::InvalidParam {
            decoder,
            param,
            reason: "is not a number".into(),
        }),
        _ => Err(SchemaError::InvalidParam {
            decoder,
            param,
            reason: "is not a number".into(),
        }),
    }
}

/// A virtual field definition: a name, the decoder that computes it, and
/// optional aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFieldDef {
    name: String,
    decoder: Decoder,
    aliases: Vec<String>,
}

impl DecodedFieldDef {
    /// Creates a decoded-field definition.
    #[must_use]
    pub fn new(name: impl Into<String>, decoder: Decoder) -> Self {
        Self {
            name: name.into(),
            decoder,
            aliases: Vec::new(),
        }
    }

    /// Adds alternate names that resolve to this decoded field.
    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the decoded-field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the decoder.
    #[must_use]
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Returns the alternate names of this decoded field.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Serializes to the v2 JSON object form.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        map.insert("name".into(), JsonValue::String(self.name.clone()));
        map.insert(
            "decoder".into(),
            JsonValue::String(self.decoder.kind().as_str().into()),
        );
        map.insert("params".into(), self.decoder.params());
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

    /// Parses the v2 JSON object form.
    pub fn from_json(json: &JsonValue) -> SchemaResult<Self> {
        let obj = json.as_object().ok_or_else(|| SchemaError::Malformed {
            reason: "decoded field entry is not an object".into(),
        })?;
        let name = obj
            .get("name")
            .and_then(JsonValue::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SchemaError::Malformed {
                reason: "decoded field name not found".into(),
            })?;
        let kind = obj
            .get("decoder")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| SchemaError::Malformed {
                reason: format!("decoded field \"{name}\" has no decoder"),
            })?;
        let params = obj.get("params").cloned().unwrap_or(JsonValue::Null);
        let mut def = Self::new(name, Decoder::new(kind, &params)?);
        if let Some(aliases) = obj.get("aliases").and_then(JsonValue::as_array) {
            def.aliases = aliases
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_owned)
                .collect();
        }
        Ok(def)
    }
}
