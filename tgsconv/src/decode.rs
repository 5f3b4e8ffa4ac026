//! Decoding of uploaded sticker files.
//!
//! Telegram `.tgs` stickers are gzip-compressed Lottie JSON, but plain Lottie JSON is accepted as
//! well. Callers never say which one they are sending: [`decode`] first tries to gunzip and parse,
//! and falls back to parsing the buffer as-is. Every gzip failure (not gzip at all, truncated
//! stream, bad checksum) is treated the same way.

use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::Read;
use thiserror::Error;

/// A parsed keyframe animation.
///
/// Only syntactic JSON validity is guaranteed. Whether the document actually describes a
/// renderable animation is for the render engine to find out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnimationDocument(Value);

impl AnimationDocument {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Canvas width declared by the document (`w`)
    pub fn width(&self) -> Option<u64> {
        self.0.get("w").and_then(Value::as_u64)
    }

    /// Canvas height declared by the document (`h`)
    pub fn height(&self) -> Option<u64> {
        self.0.get("h").and_then(Value::as_u64)
    }

    /// Frames per second (`fr`)
    pub fn frame_rate(&self) -> Option<f64> {
        self.0.get("fr").and_then(Value::as_f64)
    }

    /// First frame of the animation (`ip`)
    pub fn in_point(&self) -> Option<f64> {
        self.0.get("ip").and_then(Value::as_f64)
    }

    /// Frame after the last one (`op`)
    pub fn out_point(&self) -> Option<f64> {
        self.0.get("op").and_then(Value::as_f64)
    }

    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
    }
}

impl From<Value> for AnimationDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Which interpretation of the upload produced the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// gzip-compressed JSON (`.tgs`)
    Gzip,
    /// Uncompressed JSON
    Json,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Gzip => f.write_str("gzip"),
            SourceFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The buffer is not a readable gzip stream
    #[error("gzip decompression failed: {0}")]
    Gunzip(#[source] std::io::Error),

    /// The bytes are not valid JSON
    #[error("{0}")]
    Json(#[source] serde_json::Error),

    /// Neither the compressed nor the raw interpretation is valid JSON. Carries the raw parse
    /// error, which is what callers get to see.
    #[error("{0}")]
    MalformedInput(#[source] serde_json::Error),
}

/// Decode an uploaded buffer into an animation document.
pub fn decode(buffer: &[u8]) -> Result<AnimationDocument, DecodeError> {
    decode_with_format(buffer).map(|(document, _)| document)
}

/// Like [`decode`], also reporting which interpretation succeeded.
pub fn decode_with_format(buffer: &[u8]) -> Result<(AnimationDocument, SourceFormat), DecodeError> {
    match try_gunzip_then_parse(buffer) {
        Ok(document) => Ok((document, SourceFormat::Gzip)),
        Err(gzip_error) => {
            tracing::trace!(error = %gzip_error, "Not a gzip-compressed document, parsing as raw JSON");
            try_parse_raw(buffer)
                .map(|document| (document, SourceFormat::Json))
                .map_err(DecodeError::MalformedInput)
        }
    }
}

pub fn try_gunzip_then_parse(buffer: &[u8]) -> Result<AnimationDocument, DecodeError> {
    let mut decompressed = Vec::new();
    GzDecoder::new(buffer)
        .read_to_end(&mut decompressed)
        .map_err(DecodeError::Gunzip)?;
    try_parse_raw(&decompressed).map_err(DecodeError::Json)
}

/// Parse `buffer` as JSON text. Invalid UTF-8 sequences are replaced with U+FFFD first, so a
/// stray byte inside a string value does not reject the whole document.
pub fn try_parse_raw(buffer: &[u8]) -> serde_json::Result<AnimationDocument> {
    let text = String::from_utf8_lossy(buffer);
    serde_json::from_str::<Value>(&text).map(AnimationDocument)
}
