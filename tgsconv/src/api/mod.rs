//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Response bodies shared by the handlers and the error type
//!
//! # Routes
//!
//! - `GET /health`: liveness probe, always `{"status":"ok"}`
//! - `POST /convert`: multipart upload of a sticker, answers with a PNG of its first frame
//! - `GET /api-docs/openapi.json`: OpenAPI document for the above

pub mod handlers;
pub mod models;
