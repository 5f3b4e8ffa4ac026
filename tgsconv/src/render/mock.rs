//! Scripted render engine for tests.

use super::{EngineError, RenderEngine, RenderJob};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// Bytes written to the output path on a successful mock render: the PNG signature.
pub const PLACEHOLDER_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone)]
enum Outcome {
    Succeed,
    Fail(String),
}

/// Mock render engine for testing.
///
/// Outcomes queued with [`push_success`](Self::push_success) and
/// [`push_failure`](Self::push_failure) are consumed in FIFO order. Once the queue is empty the
/// engine falls back to its default outcome: success for [`MockRenderEngine::new`], failure for
/// [`MockRenderEngine::always_failing`].
///
/// # Example
/// ```ignore
/// let mock = MockRenderEngine::new();
/// mock.push_failure("Target closed");
/// // first attempt fails, every later one succeeds
/// ```
#[derive(Clone)]
pub struct MockRenderEngine {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    fallback: Outcome,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of a call made to the mock engine.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame: u32,
}

impl MockRenderEngine {
    /// Engine that succeeds unless told otherwise.
    pub fn new() -> Self {
        Self::with_fallback(Outcome::Succeed)
    }

    /// Engine that fails every attempt with `message` unless told otherwise.
    pub fn always_failing(message: impl Into<String>) -> Self {
        Self::with_fallback(Outcome::Fail(message.into()))
    }

    fn with_fallback(fallback: Outcome) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_success(&self) {
        self.outcomes.lock().push_back(Outcome::Succeed);
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.outcomes.lock().push_back(Outcome::Fail(message.into()));
    }

    /// Get all calls that have been made to this mock engine.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockRenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RenderEngine for MockRenderEngine {
    async fn render_frame(&self, job: &RenderJob) -> Result<(), EngineError> {
        self.calls.lock().push(MockCall {
            output: job.output.clone(),
            width: job.width,
            height: job.height,
            frame: job.frame,
        });

        let outcome = self.outcomes.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
        match outcome {
            Outcome::Succeed => {
                tokio::fs::write(&job.output, PLACEHOLDER_PNG).await?;
                Ok(())
            }
            Outcome::Fail(message) => Err(EngineError::Other(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(output: PathBuf) -> RenderJob {
        RenderJob {
            document: json!({}).into(),
            output,
            width: 64,
            height: 64,
            frame: 0,
        }
    }

    #[tokio::test]
    async fn test_mock_engine_fifo_then_fallback() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("out.png");
        let mock = MockRenderEngine::new();
        mock.push_failure("first");

        let err = mock.render_frame(&job(output.clone())).await.unwrap_err();
        assert_eq!(err.to_string(), "first");
        assert!(!output.exists());

        mock.render_frame(&job(output.clone())).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), PLACEHOLDER_PNG);

        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.get_calls()[0].width, 64);
    }

    #[tokio::test]
    async fn test_always_failing_can_be_scripted_to_succeed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mock = MockRenderEngine::always_failing("boom");
        mock.push_success();

        mock.render_frame(&job(temp_dir.path().join("a.png"))).await.unwrap();
        assert!(mock.render_frame(&job(temp_dir.path().join("b.png"))).await.is_err());
        assert!(mock.render_frame(&job(temp_dir.path().join("c.png"))).await.is_err());
    }
}
