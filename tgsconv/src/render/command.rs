//! Render engine backed by an external renderer process.
//!
//! The document is written to a temporary `.json` file, then the configured program is run with
//! the argument template expanded. The default configuration targets `puppeteer-lottie`, which
//! drives headless Chromium. The process must exit with status 0 for the attempt to count as a
//! success.
//!
//! Template tokens:
//!
//! - `{input}`, `{output}`, `{width}`, `{height}`, `{frame}`, `{headless}`: substituted in place
//! - `{browser_arg}`: the argument is repeated once per configured browser flag, so
//!   `--browser-arg={browser_arg}` becomes `--browser-arg=--no-sandbox`, `--browser-arg=--disable-gpu`, ...

use super::{EngineError, RenderEngine, RenderJob};
use crate::config::RenderConfig;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Token repeating its argument once per browser flag
const BROWSER_ARG: &str = "{browser_arg}";

/// Keep this much of the renderer's stderr in error messages
const STDERR_TAIL: usize = 512;

#[derive(Debug, Clone)]
pub struct CommandRenderEngine {
    program: String,
    args: Vec<String>,
    browser_args: Vec<String>,
    headless: String,
}

impl CommandRenderEngine {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            browser_args: config.browser_args.clone(),
            headless: config.headless.clone(),
        }
    }

    /// Substitute the job's values into the argument template.
    fn expand_args(&self, job: &RenderJob, input: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let output = job.output.display().to_string();
        let width = job.width.to_string();
        let height = job.height.to_string();
        let frame = job.frame.to_string();

        let substitute = |arg: &str| {
            arg.replace("{input}", &input)
                .replace("{output}", &output)
                .replace("{width}", &width)
                .replace("{height}", &height)
                .replace("{frame}", &frame)
                .replace("{headless}", &self.headless)
        };

        let mut expanded = Vec::with_capacity(self.args.len() + self.browser_args.len());
        for arg in &self.args {
            if arg.contains(BROWSER_ARG) {
                expanded.extend(self.browser_args.iter().map(|flag| substitute(&arg.replace(BROWSER_ARG, flag))));
            } else {
                expanded.push(substitute(arg));
            }
        }
        expanded
    }
}

#[async_trait]
impl RenderEngine for CommandRenderEngine {
    #[tracing::instrument(skip_all, fields(program = %self.program, output = %job.output.display()))]
    async fn render_frame(&self, job: &RenderJob) -> Result<(), EngineError> {
        // Removed when dropped, whatever the outcome
        let input = tempfile::Builder::new().prefix("tgsconv-").suffix(".json").tempfile()?;
        tokio::fs::write(input.path(), job.document.to_json_vec()?).await?;

        let args = self.expand_args(job, input.path());
        tracing::debug!(?args, "Launching renderer");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Exited {
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }

        tracing::trace!(stdout_len = output.stdout.len(), "Renderer finished");
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let mut start = text.len().saturating_sub(STDERR_TAIL);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
