//! HTTP request handlers.
//!
//! - [`convert`]: sticker upload, decoding, rendering and streaming of the result
//! - [`health`]: liveness probe

pub mod convert;
pub mod health;
