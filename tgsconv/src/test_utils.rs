//! Helpers shared by the handler and application tests.

use crate::config::Config;
use crate::render::MockRenderEngine;
use axum_test::TestServer;
use flate2::{Compression, write::GzEncoder};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Build an app around `engine`, storing artifacts directly in the returned temp dir.
///
/// Keep the `TempDir` alive for the duration of the test; dropping it removes the directory.
pub async fn create_test_app(engine: MockRenderEngine) -> (TestServer, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(temp_dir.path());

    let app = crate::Application::with_engine(config, Arc::new(engine))
        .await
        .expect("Failed to create application");

    (app.into_test_server(), temp_dir)
}

pub fn create_test_config(temp_dir: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        temp_dir: temp_dir.to_path_buf(),
        ..Config::default()
    }
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// A minimal 512x512 sticker: one shape layer with a single keyframe.
pub fn sample_animation() -> serde_json::Value {
    json!({
        "v": "5.5.2",
        "fr": 60,
        "ip": 0,
        "op": 180,
        "w": 512,
        "h": 512,
        "nm": "sticker",
        "ddd": 0,
        "assets": [],
        "layers": [{
            "ddd": 0,
            "ind": 1,
            "ty": 4,
            "nm": "circle",
            "sr": 1,
            "ks": {
                "o": { "a": 0, "k": 100 },
                "r": { "a": 0, "k": 0 },
                "p": { "a": 0, "k": [256, 256, 0] },
                "a": { "a": 0, "k": [0, 0, 0] },
                "s": {
                    "a": 1,
                    "k": [
                        { "t": 0, "s": [100, 100, 100], "i": { "x": [0.5], "y": [1] }, "o": { "x": [0.5], "y": [0] } },
                        { "t": 180, "s": [120, 120, 100] }
                    ]
                }
            },
            "shapes": [
                { "ty": "el", "p": { "a": 0, "k": [0, 0] }, "s": { "a": 0, "k": [200, 200] } },
                { "ty": "fl", "c": { "a": 0, "k": [1, 0.8, 0, 1] }, "o": { "a": 0, "k": 100 } }
            ],
            "ip": 0,
            "op": 180,
            "st": 0
        }]
    })
}
