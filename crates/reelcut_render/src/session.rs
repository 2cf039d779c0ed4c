use tokio::sync::{mpsc, Mutex, OnceCell};

use crate::compile::CompiledCommand;
use crate::engine::MediaEngine;
use crate::error::{RenderError, Result};
use crate::progress::fraction_to_percent;

/// Long-lived owner of one media engine instance.
///
/// The engine is loaded lazily on first use and reused for every later job.
/// A failed load leaves the session uninitialized so a later call may retry.
/// Jobs are serialized: the engine's virtual filesystem and progress routing
/// are shared state, so at most one `run_job` executes at a time.
pub struct EngineSession<E: MediaEngine> {
    engine: E,
    ready: OnceCell<()>,
    job_lock: Mutex<()>,
}

impl<E: MediaEngine> EngineSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            ready: OnceCell::new(),
            job_lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Load the engine if it is not loaded yet. Concurrent callers wait on
    /// the same attempt instead of starting their own.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                tracing::info!(engine = self.engine.name(), "loading media engine");
                match self.engine.load().await {
                    Ok(()) => {
                        tracing::info!(engine = self.engine.name(), "media engine ready");
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!(engine = self.engine.name(), error = %e, "media engine failed to load");
                        Err(match e {
                            RenderError::EngineLoad(msg) => RenderError::EngineLoad(msg),
                            other => RenderError::EngineLoad(other.to_string()),
                        })
                    }
                }
            })
            .await?;
        Ok(())
    }

    /// Stage `input`, run `command`, and return the bytes of `output_name`.
    ///
    /// Engine progress fractions are converted to integer percent and passed
    /// to `on_progress` as they arrive. Both logical files are deleted before
    /// this returns, on success and on every failure path.
    pub async fn run_job<F>(
        &self,
        input_name: &str,
        input: &[u8],
        output_name: &str,
        command: &CompiledCommand,
        on_progress: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(u8) + Send,
    {
        if !self.is_ready() {
            return Err(RenderError::EngineNotLoaded);
        }
        let _job = self.job_lock.lock().await;

        let result = self
            .stage_and_execute(input_name, input, output_name, command, on_progress)
            .await;

        self.cleanup(&[input_name, output_name]).await;

        result
    }

    async fn stage_and_execute<F>(
        &self,
        input_name: &str,
        input: &[u8],
        output_name: &str,
        command: &CompiledCommand,
        mut on_progress: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(u8) + Send,
    {
        self.engine.write_file(input_name, input).await?;
        tracing::debug!(input = input_name, bytes = input.len(), "staged input");

        let args = command.to_args();
        tracing::info!(command = %args.join(" "), "executing engine command");

        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let forward = async {
            while let Some(fraction) = rx.recv().await {
                on_progress(fraction_to_percent(fraction));
            }
        };
        let (exec_result, ()) = tokio::join!(self.engine.exec(&args, tx), forward);

        exec_result.map_err(|e| match e {
            RenderError::Processing(msg) => RenderError::Processing(msg),
            other => RenderError::Processing(other.to_string()),
        })?;

        match self.engine.read_file(output_name).await? {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(RenderError::OutputMissing(output_name.to_string())),
        }
    }

    async fn cleanup(&self, names: &[&str]) {
        for name in names {
            if let Err(e) = self.engine.delete_file(name).await {
                tracing::warn!(file = name, error = %e, "failed to remove staged file");
            }
        }
    }

    /// Files currently present in the engine's virtual filesystem.
    pub async fn staged_files(&self) -> Result<Vec<String>> {
        self.engine.list_files().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::memory::{ExecScript, MemoryEngine};
    use reelcut_core::filters::FilterChain;
    use reelcut_core::types::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn command() -> CompiledCommand {
        let params = ParameterSet {
            trim: Trim {
                start_secs: 0.0,
                end_secs: 4.0,
            },
            aspect: AspectRatio::new_unchecked(1, 1),
            fit: FrameFit::Cover,
            filter: "none".into(),
            adjustment: Adjustment::default(),
            quality: Quality::Hd720p,
            format: OutputFormat::Mp4,
            fps: FrameRate::Fps30,
            overlays: vec![],
        };
        compile("input.mp4", "output.mp4", &params, &FilterChain::default()).unwrap()
    }

    async fn ready_session(engine: MemoryEngine) -> EngineSession<MemoryEngine> {
        let session = EngineSession::new(engine);
        session.ensure_ready().await.unwrap();
        session
    }

    #[tokio::test]
    async fn ensure_ready_is_idempotent() {
        let session = EngineSession::new(MemoryEngine::new());
        assert!(!session.is_ready());
        session.ensure_ready().await.unwrap();
        session.ensure_ready().await.unwrap();
        assert!(session.is_ready());
        assert_eq!(session.engine().load_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_ensure_ready_loads_once() {
        let session = Arc::new(EngineSession::new(
            MemoryEngine::new().with_load_delay(Duration::from_millis(50)),
        ));

        let a = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ensure_ready().await })
        };
        let b = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ensure_ready().await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(session.engine().load_count(), 1);
    }

    #[tokio::test]
    async fn failed_load_can_be_retried() {
        let session = EngineSession::new(MemoryEngine::new().with_failing_loads(1));

        assert!(matches!(
            session.ensure_ready().await,
            Err(RenderError::EngineLoad(_))
        ));
        assert!(!session.is_ready());

        session.ensure_ready().await.unwrap();
        assert!(session.is_ready());
        assert_eq!(session.engine().load_count(), 2);
    }

    #[tokio::test]
    async fn run_job_requires_ready_engine() {
        let session = EngineSession::new(MemoryEngine::new());
        let result = session
            .run_job("input.mp4", b"data", "output.mp4", &command(), |_| {})
            .await;
        assert!(matches!(result, Err(RenderError::EngineNotLoaded)));
        assert_eq!(session.engine().exec_count(), 0);
    }

    #[tokio::test]
    async fn run_job_returns_output_and_cleans_up() {
        let session = ready_session(MemoryEngine::new()).await;
        let mut percents = Vec::new();

        let output = session
            .run_job("input.mp4", b"video-bytes", "output.mp4", &command(), |p| {
                percents.push(p)
            })
            .await
            .unwrap();

        assert_eq!(output, b"video-bytes");
        assert_eq!(percents, vec![0, 25, 50, 75, 100]);
        assert!(session.staged_files().await.unwrap().is_empty());
        assert_eq!(
            session.engine().last_args().unwrap(),
            command().to_args()
        );
    }

    #[tokio::test]
    async fn progress_is_passed_through_unmodified() {
        let script = ExecScript::CopyInput {
            progress: vec![0.1, 0.6, 0.4, 1.2],
        };
        let session = ready_session(MemoryEngine::new().with_script(script)).await;
        let mut percents = Vec::new();

        session
            .run_job("input.mp4", b"x", "output.mp4", &command(), |p| percents.push(p))
            .await
            .unwrap();

        assert_eq!(percents, vec![10, 60, 40, 100]);
    }

    #[tokio::test]
    async fn engine_failure_cleans_up_and_reports_processing_error() {
        let script = ExecScript::Fail {
            progress: vec![0.0, 0.3],
            message: "Invalid data found when processing input".into(),
        };
        let session = ready_session(MemoryEngine::new().with_script(script)).await;

        let result = session
            .run_job("input.mov", b"garbage", "output.mp4", &command(), |_| {})
            .await;

        match result {
            Err(RenderError::Processing(msg)) => assert!(msg.contains("Invalid data")),
            other => panic!("expected Processing, got {other:?}"),
        }
        assert!(session.staged_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_output_is_reported_after_cleanup() {
        let session =
            ready_session(MemoryEngine::new().with_script(ExecScript::NoOutput)).await;

        let result = session
            .run_job("input.mp4", b"x", "output.mp4", &command(), |_| {})
            .await;

        assert!(matches!(result, Err(RenderError::OutputMissing(name)) if name == "output.mp4"));
        assert!(session.staged_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn staging_failure_still_cleans_up() {
        let session = ready_session(MemoryEngine::new()).await;
        let result = session
            .run_job("bad/name.mp4", b"x", "output.mp4", &command(), |_| {})
            .await;
        assert!(matches!(result, Err(RenderError::InvalidLogicalName(_))));
        assert!(session.staged_files().await.unwrap().is_empty());
        assert_eq!(session.engine().exec_count(), 0);
    }

    #[tokio::test]
    async fn jobs_are_serialized() {
        let session = Arc::new(ready_session(MemoryEngine::new()).await);
        let cmd = command();

        let (a, b) = tokio::join!(
            session.run_job("input.mp4", b"first", "output.mp4", &cmd, |_| {}),
            session.run_job("input.mp4", b"second", "output.mp4", &cmd, |_| {}),
        );

        let mut outputs = vec![a.unwrap(), b.unwrap()];
        outputs.sort();
        assert_eq!(outputs, vec![b"first".to_vec(), b"second".to_vec()]);
        assert!(session.staged_files().await.unwrap().is_empty());
    }
}
