//! Schema construction, JSON round-trip and content hashing.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::decoder::{Decoder, DecodedFieldDef, DecoderKind};
use crate::error::{SchemaError, SchemaResult};
use crate::field::FieldDef;
use crate::pipeline::{join_pipeline, parse_pipeline, Modifier};

/// Schema JSON version with decoded fields as a single object list.
pub const SCHEMA_VERSION_2_0: &str = "2.0";
/// Legacy schema JSON version with `mappedFields`/`decodedFields` maps.
pub const SCHEMA_VERSION_1_0: &str = "1.0";

/// An integer-to-value mapping used by `IntMap` decoders.
pub type IntMap = BTreeMap<i64, JsonValue>;

/// A validated, immutable schema for bit-packed state records.
///
/// A schema declares an ordered list of typed, bit-sized fields plus
/// optional decoded (virtual) fields, integer maps and a compression
/// pipeline. Field offsets are the prefix sums of the declared sizes and
/// are fixed for the life of the schema. Schemas are immutable after
/// construction and can be shared freely across states and queues.
///
/// The schema's identity is the SHA-256 of its canonical JSON form; two
/// schemas with the same declared content hash identically regardless of
/// map insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSchema {
    meta: serde_json::Map<String, JsonValue>,
    fields: Vec<FieldDef>,
    offsets: Vec<usize>,
    index: BTreeMap<String, usize>,
    decoded_fields: BTreeMap<String, DecodedFieldDef>,
    int_maps: BTreeMap<String, IntMap>,
    encoder_pipeline: Vec<Modifier>,
    aliases: BTreeMap<String, String>,
    bit_size: usize,
    byte_size: usize,
    hash: [u8; 32],
}

impl StateSchema {
    /// Creates a schema builder.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns a field by canonical name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Returns a field and its bit offset by canonical name.
    #[must_use]
    pub fn field_entry(&self, name: &str) -> Option<(&FieldDef, usize)> {
        self.index.get(name).map(|&i| (&self.fields[i], self.offsets[i]))
    }

    /// Returns the decoded fields, ordered by name.
    pub fn decoded_fields(&self) -> impl Iterator<Item = &DecodedFieldDef> {
        self.decoded_fields.values()
    }

    /// Returns a decoded field by name.
    #[must_use]
    pub fn decoded_field(&self, name: &str) -> Option<&DecodedFieldDef> {
        self.decoded_fields.get(name)
    }

    /// Returns an int map by ID.
    #[must_use]
    pub fn int_map(&self, map_id: &str) -> Option<&IntMap> {
        self.int_maps.get(map_id)
    }

    /// Returns the free-form meta map.
    #[must_use]
    pub fn meta(&self) -> &serde_json::Map<String, JsonValue> {
        &self.meta
    }

    /// Resolves an alias to the canonical field or decoded-field name it
    /// targets; a name that is not an alias resolves to itself.
    #[must_use]
    pub fn resolve_alias<'n>(&'n self, name: &'n str) -> &'n str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Returns all `(alias, canonical name)` pairs, ordered by alias.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, t)| (a.as_str(), t.as_str()))
    }

    /// Returns the encoder pipeline modifiers in application order.
    #[must_use]
    pub fn encoder_pipeline(&self) -> &[Modifier] {
        &self.encoder_pipeline
    }

    /// Returns the decoder pipeline (the encoder pipeline reversed).
    pub fn decoder_pipeline(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.encoder_pipeline.iter().rev().copied()
    }

    /// Returns the total size of the fields in bits.
    #[must_use]
    pub fn bit_size(&self) -> usize {
        self.bit_size
    }

    /// Returns the total size of the fields in whole bytes (`⌈bits/8⌉`).
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Returns the SHA-256 of the canonical JSON form.
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    /// Returns the content hash as a standard base64 string.
    #[must_use]
    pub fn hash_string(&self) -> String {
        BASE64.encode(self.hash)
    }

    /// Serializes the schema into its canonical v2.0 JSON form.
    ///
    /// Decoded fields are emitted sorted by name and `meta` is omitted when
    /// empty; both rules keep the content hash stable.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        map.insert(
            "version".into(),
            JsonValue::String(SCHEMA_VERSION_2_0.into()),
        );
        map.insert(
            "encoderPipeline".into(),
            JsonValue::String(join_pipeline(&self.encoder_pipeline)),
        );
        map.insert(
            "decoderIntMaps".into(),
            JsonValue::Object(
                self.int_maps
                    .iter()
                    .map(|(id, entries)| {
                        let entries = entries
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.clone()))
                            .collect();
                        (id.clone(), JsonValue::Object(entries))
                    })
                    .collect(),
            ),
        );
        map.insert(
            "decodedFields".into(),
            JsonValue::Array(self.decoded_fields.values().map(DecodedFieldDef::to_json).collect()),
        );
        map.insert(
            "fields".into(),
            JsonValue::Array(self.fields.iter().map(FieldDef::to_json).collect()),
        );
        if !self.meta.is_empty() {
            map.insert("meta".into(), JsonValue::Object(self.meta.clone()));
        }
        JsonValue::Object(map)
    }

    /// Parses a schema from its JSON form.
    ///
    /// A `version` of `"2.0"` selects the current form; an absent version or
    /// `"1.0"` selects the legacy form, whose `mappedFields` and
    /// string-decoder `decodedFields` are upgraded to the v2 model in
    /// memory.
    pub fn from_json(json: &JsonValue) -> SchemaResult<Self> {
        let obj = json.as_object().ok_or_else(|| SchemaError::Malformed {
            reason: "schema is not an object".into(),
        })?;

        let version = obj
            .get("version")
            .and_then(JsonValue::as_str)
            .unwrap_or(SCHEMA_VERSION_1_0);

        let mut builder = StateSchema::builder();

        if let Some(meta) = obj.get("meta").and_then(JsonValue::as_object) {
            for (key, value) in meta {
                builder = builder.meta(key.as_str(), value.clone());
            }
        }

        if let Some(pipeline) = obj.get("encoderPipeline") {
            let pipeline = pipeline.as_str().ok_or_else(|| SchemaError::Malformed {
                reason: "encoderPipeline is not a string".into(),
            })?;
            builder = builder.pipeline(pipeline);
        }

        let fields = obj
            .get("fields")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| SchemaError::Malformed {
                reason: "fields list not found".into(),
            })?;
        for field in fields {
            builder = builder.field(FieldDef::from_json(field)?);
        }

        for (map_id, entries) in obj
            .get("decoderIntMaps")
            .and_then(JsonValue::as_object)
            .into_iter()
            .flatten()
        {
            let entries = entries.as_object().ok_or_else(|| SchemaError::Malformed {
                reason: format!("can't parse map \"{map_id}\": not an object"),
            })?;
            let mut int_map = IntMap::new();
            for (key, value) in entries {
                let key_int = key
                    .parse::<i64>()
                    .map_err(|_| SchemaError::InvalidIntMapKey {
                        map_id: map_id.clone(),
                        key: key.clone(),
                    })?;
                int_map.insert(key_int, value.clone());
            }
            builder = builder.int_map(map_id.as_str(), int_map);
        }

        if version == SCHEMA_VERSION_2_0 {
            for entry in obj
                .get("decodedFields")
                .and_then(JsonValue::as_array)
                .into_iter()
                .flatten()
            {
                builder = builder.decoded_field(DecodedFieldDef::from_json(entry)?);
            }
        } else {
            // v1: mapped fields are always IntMap decoders keyed by name.
            for (name, params) in obj
                .get("mappedFields")
                .and_then(JsonValue::as_object)
                .into_iter()
                .flatten()
            {
                let decoder = Decoder::with_kind(DecoderKind::IntMap, params)?;
                builder = builder.decoded_field(DecodedFieldDef::new(name.as_str(), decoder));
            }
            // v1: decoded fields name a decoder kind and a source field.
            for (name, entry) in obj
                .get("decodedFields")
                .and_then(JsonValue::as_object)
                .into_iter()
                .flatten()
            {
                let from = entry
                    .get("from")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| SchemaError::Malformed {
                        reason: format!("no source field specified for decoded field \"{name}\""),
                    })?;
                let kind = entry
                    .get("decoder")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| SchemaError::Malformed {
                        reason: format!("no decoder specified for decoded field \"{name}\""),
                    })?;
                let decoder = Decoder::new(kind, &serde_json::json!({ "from": from }))?;
                builder = builder.decoded_field(DecodedFieldDef::new(name.as_str(), decoder));
            }
        }

        builder.build()
    }

    /// Parses a schema from a JSON string.
    pub fn from_json_str(raw: &str) -> SchemaResult<Self> {
        let json: JsonValue =
            serde_json::from_str(raw).map_err(|e| SchemaError::Malformed {
                reason: e.to_string(),
            })?;
        Self::from_json(&json)
    }
}

impl Serialize for StateSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// Builder for [`StateSchema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    meta: serde_json::Map<String, JsonValue>,
    pipeline: String,
    fields: Vec<FieldDef>,
    decoded_fields: Vec<DecodedFieldDef>,
    int_maps: BTreeMap<String, IntMap>,
}

impl SchemaBuilder {
    /// Sets the encoder pipeline string (e.g. `"t:z"`).
    #[must_use]
    pub fn pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = pipeline.into();
        self
    }

    /// Adds a meta entry.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Adds a field definition.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a decoded-field definition.
    #[must_use]
    pub fn decoded_field(mut self, field: DecodedFieldDef) -> Self {
        self.decoded_fields.push(field);
        self
    }

    /// Adds an int map under the given ID.
    #[must_use]
    pub fn int_map(mut self, map_id: impl Into<String>, map: IntMap) -> Self {
        self.int_maps.insert(map_id.into(), map);
        self
    }

    /// Validates and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for an unknown pipeline modifier, an
    /// illegal field size or decimals declaration, an uncoercible default
    /// value, or a duplicate field name.
    pub fn build(self) -> SchemaResult<StateSchema> {
        let encoder_pipeline = parse_pipeline(&self.pipeline)?;

        let mut fields = Vec::with_capacity(self.fields.len());
        let mut offsets = Vec::with_capacity(self.fields.len());
        let mut index = BTreeMap::new();
        let mut bit_size = 0usize;
        for mut field in self.fields {
            field.normalize()?;
            if index.insert(field.name().to_owned(), fields.len()).is_some() {
                return Err(SchemaError::DuplicateFieldName {
                    name: field.name().to_owned(),
                });
            }
            offsets.push(bit_size);
            bit_size += field.size();
            fields.push(field);
        }

        let decoded_fields: BTreeMap<String, DecodedFieldDef> = self
            .decoded_fields
            .into_iter()
            .map(|field| (field.name().to_owned(), field))
            .collect();

        let mut aliases = BTreeMap::new();
        for field in &fields {
            for alias in field.aliases() {
                aliases.insert(alias.clone(), field.name().to_owned());
            }
        }
        for field in decoded_fields.values() {
            for alias in field.aliases() {
                aliases.insert(alias.clone(), field.name().to_owned());
            }
        }

        let mut schema = StateSchema {
            meta: self.meta,
            fields,
            offsets,
            index,
            decoded_fields,
            int_maps: self.int_maps,
            encoder_pipeline,
            aliases,
            bit_size,
            byte_size: bit_size.div_ceil(8),
            hash: [0; 32],
        };
        schema.hash = canonical_hash(&schema)?;
        Ok(schema)
    }
}

fn canonical_hash(schema: &StateSchema) -> SchemaResult<[u8; 32]> {
    let canonical = serde_json::to_vec(&schema.to_json()).map_err(|e| SchemaError::Malformed {
        reason: e.to_string(),
    })?;
    let digest = Sha256::digest(&canonical);
    Ok(digest.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn demo_schema() -> StateSchema {
        StateSchema::builder()
            .pipeline("t:z")
            .field(FieldDef::int("STATE_CODE", 2))
            .field(FieldDef::int("CHAR", 8))
            .field(FieldDef::boolean("BOOL"))
            .field(FieldDef::uint("TS_SEC", 48))
            .field(FieldDef::buffer("MSG", 96))
            .decoded_field(DecodedFieldDef::new(
                "MESSAGE",
                Decoder::BufferToString { from: "MSG".into() },
            ))
            .decoded_field(DecodedFieldDef::new(
                "STATE",
                Decoder::IntMap {
                    from: "STATE_CODE".into(),
                    map_id: "STATE_MAP".into(),
                },
            ))
            .int_map(
                "STATE_MAP",
                IntMap::from([
                    (0, serde_json::json!("IDLE")),
                    (1, serde_json::json!("STOPPED")),
                    (2, serde_json::json!("RUNNING")),
                ]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn builder_computes_sizes_and_offsets() {
        let schema = demo_schema();
        assert_eq!(schema.bit_size(), 2 + 8 + 1 + 48 + 96);
        assert_eq!(schema.byte_size(), 20);

        let (field, offset) = schema.field_entry("STATE_CODE").unwrap();
        assert_eq!(offset, 0);
        assert_eq!(field.size(), 2);

        let (field, offset) = schema.field_entry("MSG").unwrap();
        assert_eq!(offset, 59);
        assert_eq!(field.size(), 96);

        assert!(schema.field_entry("NOPE").is_none());
    }

    #[test]
    fn builder_rejects_duplicate_names() {
        let err = StateSchema::builder()
            .field(FieldDef::boolean("A"))
            .field(FieldDef::uint("A", 8))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldName { .. }));
    }

    #[test]
    fn builder_rejects_unknown_pipeline() {
        let err = StateSchema::builder()
            .pipeline("t:nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownModifier { .. }));
    }

    #[test]
    fn builder_normalizes_defaults() {
        let schema = StateSchema::builder()
            .field(FieldDef::fixed("X", 10, 2).with_default(-5.12))
            .build()
            .unwrap();
        assert_eq!(
            schema.field("X").unwrap().default_value(),
            &Value::Float(-5.12)
        );
    }

    #[test]
    fn decoder_pipeline_is_reversed() {
        let schema = demo_schema();
        assert_eq!(
            schema.encoder_pipeline(),
            &[Modifier::Transpose, Modifier::Gzip]
        );
        assert_eq!(
            schema.decoder_pipeline().collect::<Vec<_>>(),
            vec![Modifier::Gzip, Modifier::Transpose]
        );
    }

    #[test]
    fn hash_is_deterministic() {
        let schema = demo_schema();
        assert_eq!(schema.hash(), schema.hash());
        assert_eq!(schema.hash(), demo_schema().hash());
        assert_eq!(schema.hash_string().len(), 44);
    }

    #[test]
    fn hash_changes_with_content() {
        let base = demo_schema();
        let renamed = StateSchema::builder()
            .pipeline("t:z")
            .field(FieldDef::int("STATE_CODE", 2))
            .build()
            .unwrap();
        assert_ne!(base.hash(), renamed.hash());
    }

    #[test]
    fn meta_alters_hash_only_when_non_empty() {
        let bare = StateSchema::builder()
            .field(FieldDef::boolean("A"))
            .build()
            .unwrap();
        let with_meta = StateSchema::builder()
            .field(FieldDef::boolean("A"))
            .meta("class", serde_json::json!("A"))
            .build()
            .unwrap();
        assert_ne!(bare.hash(), with_meta.hash());
        assert!(bare.to_json().get("meta").is_none());
        assert_eq!(with_meta.to_json()["meta"]["class"], "A");

        // An explicitly empty meta object hashes like an absent one.
        let explicit_empty = StateSchema::from_json_str(
            r#"{ "meta": {}, "fields": [ { "name": "A", "type": "bool" } ] }"#,
        )
        .unwrap();
        let absent = StateSchema::from_json_str(
            r#"{ "fields": [ { "name": "A", "type": "bool" } ] }"#,
        )
        .unwrap();
        assert_eq!(explicit_empty.hash(), absent.hash());
        assert_eq!(explicit_empty.hash(), bare.hash());
    }

    #[test]
    fn decoded_fields_iterate_sorted_by_name() {
        let schema = demo_schema();
        let names: Vec<_> = schema.decoded_fields().map(DecodedFieldDef::name).collect();
        assert_eq!(names, vec!["MESSAGE", "STATE"]);
    }

    #[test]
    fn int_map_lookup() {
        let schema = demo_schema();
        let map = schema.int_map("STATE_MAP").unwrap();
        assert_eq!(map.get(&2), Some(&serde_json::json!("RUNNING")));
        assert!(schema.int_map("NOPE").is_none());
    }

    #[test]
    fn alias_index_covers_fields_and_decoded_fields() {
        let schema = StateSchema::builder()
            .field(FieldDef::uint("SPEED", 16).with_aliases(["VELOCITY", "V"]))
            .field(FieldDef::buffer("MSG", 40))
            .decoded_field(
                DecodedFieldDef::new(
                    "MESSAGE",
                    Decoder::BufferToString { from: "MSG".into() },
                )
                .with_aliases(["TEXT"]),
            )
            .build()
            .unwrap();

        assert_eq!(schema.resolve_alias("VELOCITY"), "SPEED");
        assert_eq!(schema.resolve_alias("V"), "SPEED");
        assert_eq!(schema.resolve_alias("TEXT"), "MESSAGE");
        assert_eq!(schema.resolve_alias("SPEED"), "SPEED");
        assert_eq!(schema.resolve_alias("UNDECLARED"), "UNDECLARED");
        assert_eq!(schema.aliases().count(), 3);
    }

    #[test]
    fn json_roundtrip_preserves_schema_and_hash() {
        let schema = demo_schema();
        let raw = serde_json::to_string(&schema).unwrap();
        let parsed: StateSchema = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, schema);
        assert_eq!(parsed.hash(), schema.hash());
    }
}
