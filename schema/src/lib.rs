//! Schema model for bit-packed state records.
//!
//! This crate defines how telemetry states are declared for encoding:
//! - Field descriptors (signed/unsigned integers, fixed-point, bool,
//!   float32/float64, raw buffers) with bit sizes, defaults and aliases
//! - Decoded (virtual) field descriptors and their int maps
//! - The encoder pipeline declaration (`t`, `z`, `zstd`)
//! - JSON (de)serialization in the v2.0 form with read-only v1.0 upgrade
//! - The SHA-256 content hash that identifies a schema across peers
//!
//! # Design Principles
//!
//! - **Explicit schemas** - No reflection on arbitrary Rust types; the
//!   schema is built at runtime or parsed from JSON.
//! - **Immutable after build** - Validation happens once; states and queues
//!   share the schema by reference without synchronization.
//! - **Deterministic hashing** - The canonical JSON form orders decoded
//!   fields by name and map keys lexicographically, so the hash never
//!   depends on insertion order.

mod decoder;
mod error;
mod field;
mod pipeline;
#[allow(clippy::module_inception)]
mod schema;
mod value;

pub use decoder::{DecodedFieldDef, Decoder, DecoderKind};
pub use error::{SchemaError, SchemaResult, ValueError};
pub use field::{FieldDef, FieldKind};
pub use pipeline::{join_pipeline, parse_pipeline, Modifier};
pub use schema::{IntMap, SchemaBuilder, StateSchema, SCHEMA_VERSION_1_0, SCHEMA_VERSION_2_0};
pub use value::Value;
