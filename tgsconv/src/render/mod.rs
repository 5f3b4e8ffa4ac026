//! Frame rendering with a bounded retry policy.
//!
//! The actual rasterization is delegated to a [`RenderEngine`]. Engines drive a headless browser
//! and fail transiently often enough that a single attempt is not good enough, so [`Renderer`]
//! calls the engine up to `max_attempts` times in a row, with no delay in between:
//!
//! ```text
//! Pending -> Attempt(1) -> Attempt(2) -> ... -> Attempt(max) -> Failed
//!                 \             \                    \
//!                  Success       Success              Success
//! ```
//!
//! Success means the engine returned `Ok`. The output file is not inspected.

pub mod command;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use command::CommandRenderEngine;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRenderEngine;

use crate::config::RenderConfig;
use crate::decode::AnimationDocument;
use crate::storage::ArtifactStore;
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Everything an engine needs for one attempt.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub document: AnimationDocument,
    /// Where the image must be written
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame: u32,
}

/// Failure of a single render attempt.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}: {stderr}")]
    Exited { status: std::process::ExitStatus, stderr: String },

    #[error("render attempt timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to prepare renderer input: {0}")]
    Input(#[from] std::io::Error),

    #[error("failed to serialize animation: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Trait for rasterizing one frame of an animation to an image file.
///
/// This abstraction keeps the retry and cleanup logic testable without launching a browser.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Render `job.frame` of `job.document` to `job.output`.
    async fn render_frame(&self, job: &RenderJob) -> Result<(), EngineError>;
}

/// All attempts failed.
#[derive(Debug, Error)]
#[error("Failed to convert TGS to PNG after {attempts} attempts")]
pub struct RenderFailure {
    pub attempts: u32,
    #[source]
    pub last_error: EngineError,
}

/// Successful outcome of [`retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    /// 1-based number of the attempt that succeeded
    pub attempts: u32,
}

/// Every attempt of [`retry`] failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` until it succeeds, at most `max_attempts` times (at least once).
///
/// The operation receives the 1-based attempt number. Failures are logged; there is no delay
/// between attempts.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, mut operation: F) -> Result<Attempted<T>, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Render succeeded after retrying");
                }
                return Ok(Attempted { value, attempts: attempt });
            }
            Err(error) => {
                warn!(attempt, max_attempts, error = %error, "Conversion attempt failed");
                if attempt >= max_attempts {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                attempt += 1;
            }
        }
    }
}

/// Fixed per-job parameters, taken from [`RenderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub frame: u32,
    pub max_attempts: u32,
    pub attempt_timeout: Option<Duration>,
}

impl From<&RenderConfig> for RenderSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            frame: config.frame,
            max_attempts: config.max_attempts,
            attempt_timeout: config.attempt_timeout,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

/// Renders documents into the artifact store, retrying the engine as configured.
#[derive(Clone)]
pub struct Renderer {
    engine: Arc<dyn RenderEngine>,
    artifacts: ArtifactStore,
    settings: RenderSettings,
}

impl Renderer {
    pub fn new(engine: Arc<dyn RenderEngine>, artifacts: ArtifactStore, settings: RenderSettings) -> Self {
        Self {
            engine,
            artifacts,
            settings,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Render the configured frame of `document` and return the artifact path.
    ///
    /// All attempts target the same freshly allocated path. If every attempt fails, whatever an
    /// attempt may have left at that path is removed before the failure is returned.
    #[instrument(skip_all, fields(artifact))]
    pub async fn render(&self, document: AnimationDocument) -> Result<PathBuf, RenderFailure> {
        let job = RenderJob {
            document,
            output: self.artifacts.allocate(),
            width: self.settings.width,
            height: self.settings.height,
            frame: self.settings.frame,
        };
        tracing::Span::current().record("artifact", tracing::field::display(job.output.display()));

        match retry(self.settings.max_attempts, |attempt| self.attempt(&job, attempt)).await {
            Ok(Attempted { attempts, .. }) => {
                debug!(attempts, "Rendered frame");
                Ok(job.output)
            }
            Err(RetryExhausted { attempts, last_error }) => {
                self.artifacts.discard(&job.output).await;
                let failure = RenderFailure { attempts, last_error };
                error!(error = %failure, cause = %failure.last_error, "Giving up on render");
                Err(failure)
            }
        }
    }

    async fn attempt(&self, job: &RenderJob, attempt: u32) -> Result<(), EngineError> {
        debug!(attempt, "Starting render attempt");
        match self.settings.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.engine.render_frame(job))
                .await
                .map_err(|_| EngineError::TimedOut(limit))?,
            None => self.engine.render_frame(job).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn document() -> AnimationDocument {
        AnimationDocument::from(json!({ "w": 512, "h": 512, "layers": [] }))
    }

    fn renderer(engine: Arc<dyn RenderEngine>, root: &std::path::Path) -> Renderer {
        Renderer::new(engine, ArtifactStore::new(root), RenderSettings::default())
    }

    #[tokio::test]
    async fn test_retry_first_success() {
        let result = retry(3, |_attempt| async { Ok::<_, String>("frame") }).await.unwrap();

        assert_eq!(result, Attempted { value: "frame", attempts: 1 });
    }

    #[tokio::test]
    async fn test_retry_two_failures_then_success() {
        let calls = AtomicU32::new(0);

        let result = retry(3, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("browser crashed on attempt {attempt}"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(result.value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_never_exceeds_max() {
        let calls = AtomicU32::new(0);

        let exhausted = retry(3, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(format!("failure {attempt}")) }
        })
        .await
        .unwrap_err();

        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_zero_still_attempts_once() {
        let exhausted = retry(0, |_| async { Err::<(), _>("nope") }).await.unwrap_err();
        assert_eq!(exhausted.attempts, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_renderer_succeeds_on_third_attempt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = MockRenderEngine::new();
        engine.push_failure("Target closed");
        engine.push_failure("Navigation timeout");
        engine.push_success();

        let path = renderer(Arc::new(engine.clone()), temp_dir.path())
            .render(document())
            .await
            .unwrap();

        assert_eq!(engine.call_count(), 3);
        assert!(path.starts_with(temp_dir.path()));
        assert!(path.exists());

        // every attempt targeted the same artifact with the fixed geometry
        let calls = engine.get_calls();
        assert!(calls.iter().all(|call| call.output == path));
        assert!(calls.iter().all(|call| call.width == 512 && call.height == 512 && call.frame == 0));
    }

    #[test_log::test(tokio::test)]
    async fn test_renderer_gives_up_after_three_attempts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let engine = MockRenderEngine::always_failing("Protocol error");

        let failure = renderer(Arc::new(engine.clone()), temp_dir.path())
            .render(document())
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.to_string(), "Failed to convert TGS to PNG after 3 attempts");
        assert_eq!(engine.call_count(), 3);
    }

    /// Writes a partial file, then fails.
    struct PartialWriter;

    #[async_trait]
    impl RenderEngine for PartialWriter {
        async fn render_frame(&self, job: &RenderJob) -> Result<(), EngineError> {
            tokio::fs::write(&job.output, b"\x89PN").await?;
            Err(EngineError::Other("page crashed mid-screenshot".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_render_leaves_no_artifact() {
        let temp_dir = tempfile::tempdir().unwrap();

        renderer(Arc::new(PartialWriter), temp_dir.path())
            .render(document())
            .await
            .unwrap_err();

        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    /// Never finishes.
    struct Hang;

    #[async_trait]
    impl RenderEngine for Hang {
        async fn render_frame(&self, _job: &RenderJob) -> Result<(), EngineError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = RenderSettings {
            max_attempts: 2,
            attempt_timeout: Some(Duration::from_secs(30)),
            ..RenderSettings::default()
        };

        let failure = Renderer::new(Arc::new(Hang), ArtifactStore::new(temp_dir.path()), settings)
            .render(document())
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 2);
        assert!(matches!(failure.last_error, EngineError::TimedOut(_)));
    }
}
