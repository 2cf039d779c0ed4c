use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::engine::{validate_logical_name, MediaEngine};
use crate::error::{RenderError, Result};

/// What `exec` does when called.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecScript {
    /// Emit the given fractions, then copy the `-i` input to the output name.
    CopyInput { progress: Vec<f64> },
    /// Emit the given fractions, then fail with the message.
    Fail { progress: Vec<f64>, message: String },
    /// Report success without writing any output.
    NoOutput,
}

impl Default for ExecScript {
    fn default() -> Self {
        ExecScript::CopyInput {
            progress: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        }
    }
}

/// In-process engine over a map of logical files. Execution is scripted: by
/// default the output is a copy of the input. Backs dry runs and pipeline tests.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    script: ExecScript,
    load_delay: Duration,
    failing_loads: AtomicUsize,
    loads: AtomicUsize,
    execs: AtomicUsize,
    last_args: Mutex<Option<Vec<String>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, script: ExecScript) -> Self {
        self.script = script;
        self
    }

    /// Make `load` take at least `delay`, widening the window for concurrent callers.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Fail the first `count` loads with an engine-load error.
    pub fn with_failing_loads(self, count: usize) -> Self {
        self.failing_loads.store(count, Ordering::SeqCst);
        self
    }

    /// Number of times `load` has been entered.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn exec_count(&self) -> usize {
        self.execs.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent `exec` call.
    pub fn last_args(&self) -> Option<Vec<String>> {
        self.last_args.lock().ok().and_then(|args| args.clone())
    }

    fn files(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| RenderError::Processing("virtual filesystem poisoned".into()))
    }

    fn emit(progress: &mpsc::UnboundedSender<f64>, fractions: &[f64]) {
        for fraction in fractions {
            let _ = progress.send(*fraction);
        }
    }
}

#[async_trait]
impl MediaEngine for MemoryEngine {
    async fn load(&self) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(RenderError::EngineLoad("simulated network failure".into()));
        }
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        validate_logical_name(name)?;
        self.files()?.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        validate_logical_name(name)?;
        Ok(self.files()?.get(name).cloned())
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        validate_logical_name(name)?;
        self.files()?.remove(name);
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files()?.keys().cloned().collect())
    }

    async fn exec(&self, args: &[String], progress: mpsc::UnboundedSender<f64>) -> Result<()> {
        self.execs.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_args.lock() {
            *last = Some(args.to_vec());
        }

        match &self.script {
            ExecScript::CopyInput { progress: fractions } => {
                let input = args
                    .iter()
                    .position(|a| a == "-i")
                    .and_then(|i| args.get(i + 1))
                    .ok_or_else(|| RenderError::Processing("missing -i argument".into()))?;
                let output = args
                    .last()
                    .ok_or_else(|| RenderError::Processing("missing output argument".into()))?;

                let data = self.files()?.get(input).cloned().ok_or_else(|| {
                    RenderError::Processing(format!("{input}: No such file or directory"))
                })?;
                Self::emit(&progress, fractions);
                self.files()?.insert(output.clone(), data);
                Ok(())
            }
            ExecScript::Fail {
                progress: fractions,
                message,
            } => {
                Self::emit(&progress, fractions);
                Err(RenderError::Processing(message.clone()))
            }
            ExecScript::NoOutput => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
