//! Encoder pipeline modifiers.

use std::fmt;

use crate::error::{SchemaError, SchemaResult};

/// A buffer transform applied while encoding a state queue.
///
/// The decoder pipeline is the encoder pipeline in reverse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Bit-matrix transposition (`"t"`), clusters same-position bits of
    /// adjacent states for better LZ compression.
    Transpose,
    /// Gzip compression (`"z"`), best compression level.
    Gzip,
    /// Zstd compression (`"zstd"`), single-threaded coder.
    Zstd,
}

impl Modifier {
    /// Returns the pipeline-string token of the modifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transpose => "t",
            Self::Gzip => "z",
            Self::Zstd => "zstd",
        }
    }

    /// Parses a pipeline-string token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "t" => Some(Self::Transpose),
            "z" => Some(Self::Gzip),
            "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a colon-separated pipeline string; the empty string is the empty
/// pipeline.
pub fn parse_pipeline(raw: &str) -> SchemaResult<Vec<Modifier>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(':')
        .map(|token| {
            if token.is_empty() {
                return Err(SchemaError::PipelineFormat {
                    pipeline: raw.to_owned(),
                });
            }
            Modifier::parse(token).ok_or_else(|| SchemaError::UnknownModifier {
                found: token.to_owned(),
            })
        })
        .collect()
}

/// Joins modifiers back into the colon-separated pipeline string.
#[must_use]
pub fn join_pipeline(modifiers: &[Modifier]) -> String {
    modifiers
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(":")
}
