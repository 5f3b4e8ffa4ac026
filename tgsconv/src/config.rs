//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `TGSCONV_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `TGSCONV_` override YAML values
//! 3. **PORT** - Special case: overrides `port` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `TGSCONV_RENDER__MAX_ATTEMPTS=5` sets the `render.max_attempts` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Listen on another port
//! PORT=8080
//!
//! # Keep artifacts somewhere else
//! TGSCONV_TEMP_DIR=/var/tmp/tgsconv
//!
//! # Use a different renderer binary and give each attempt 90 seconds
//! TGSCONV_RENDER__PROGRAM=/usr/local/bin/lottie-frame
//! TGSCONV_RENDER__ATTEMPT_TIMEOUT=90s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TGSCONV_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation, so an empty YAML file (or
/// no file at all) yields a working service on port 3000.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Directory holding rendered artifacts until they have been streamed back.
    /// Created at startup if absent.
    pub temp_dir: PathBuf,
    /// Multipart field carrying the sticker file
    pub upload_field: String,
    /// Maximum accepted request body size for `/convert`, in bytes
    pub max_upload_size: usize,
    /// Console log output format
    pub log_format: LogFormat,
    /// Renderer invocation and retry policy
    pub render: RenderConfig,
}

/// Console log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// How the external renderer is launched, and how often it is retried.
///
/// `args` is a template: the tokens `{input}`, `{output}`, `{width}`, `{height}`, `{frame}` and
/// `{headless}` are substituted per attempt, and an argument containing `{browser_arg}` is
/// repeated once for each entry of `browser_args`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Renderer executable, resolved through `PATH` when not absolute
    pub program: String,
    /// Argument template passed to the renderer
    pub args: Vec<String>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Frame to rasterize
    pub frame: u32,
    /// Total attempts per conversion, including the first one
    pub max_attempts: u32,
    /// Flags for the headless browser the renderer drives
    pub browser_args: Vec<String>,
    /// Headless mode requested from the browser
    pub headless: String,
    /// Upper bound for a single attempt. Unset means attempts may run indefinitely.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub attempt_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            temp_dir: PathBuf::from("temp"),
            upload_field: "tgs".to_string(),
            max_upload_size: 10 * 1024 * 1024,
            log_format: LogFormat::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: "puppeteer-lottie".to_string(),
            args: [
                "--input",
                "{input}",
                "--output",
                "{output}",
                "--width",
                "{width}",
                "--height",
                "{height}",
                "--frame",
                "{frame}",
                "--headless",
                "{headless}",
                "--browser-arg={browser_arg}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            width: 512,
            height: 512,
            frame: 0,
            max_attempts: 3,
            browser_args: [
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            headless: "new".to_string(),
            attempt_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from the file named in `args`, environment overrides applied.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // TGSCONV_CONFIG selects the file, it is not a config key
            .merge(Env::prefixed("TGSCONV_").ignore(&["config"]).split("__"))
            // Conventional PORT variable used by container platforms
            .merge(Env::raw().only(&["PORT"]))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.upload_field.is_empty(), "Config validation: upload_field must not be empty");
        anyhow::ensure!(self.max_upload_size > 0, "Config validation: max_upload_size must be greater than zero");
        anyhow::ensure!(
            !self.render.program.trim().is_empty(),
            "Config validation: render.program must name an executable"
        );
        anyhow::ensure!(
            self.render.width > 0 && self.render.height > 0,
            "Config validation: render size must be non-zero, got {}x{}",
            self.render.width,
            self.render.height
        );
        anyhow::ensure!(self.render.max_attempts >= 1, "Config validation: render.max_attempts must be at least 1");
        if let Some(timeout) = self.render.attempt_timeout {
            anyhow::ensure!(!timeout.is_zero(), "Config validation: render.attempt_timeout must be non-zero when set");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
