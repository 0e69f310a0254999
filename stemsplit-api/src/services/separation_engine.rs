//! Separation engine invocation
//!
//! The engine is an opaque executable: given `--model`, `--out` and an input
//! path it writes `{out}/{model}/{track}/{stem}.wav`. [`ProcessEngine`] runs it
//! as one supervised child process per job with a hard wall-clock timeout;
//! the child is killed when the timeout elapses. No retries.

use crate::models::SeparationJob;
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use stemsplit_common::config::EngineConfig;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Separation engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary missing or not executable
    #[error("Failed to launch separation engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine ran and exited unsuccessfully
    #[error("Separation engine exited with {status}: {diagnostics}")]
    Failed { status: String, diagnostics: String },

    /// Engine exceeded its wall-clock bound and was killed
    #[error("Separation engine did not finish within {} seconds", .0.as_secs())]
    TimedOut(Duration),
}

impl EngineError {
    /// Diagnostic text suitable for the `details` field of an error response
    pub fn details(&self) -> String {
        match self {
            EngineError::Spawn { source, .. } => source.to_string(),
            EngineError::Failed { diagnostics, .. } => diagnostics.clone(),
            EngineError::TimedOut(_) => self.to_string(),
        }
    }
}

/// Anything that can turn a [`SeparationJob`] into stem files on disk
#[async_trait]
pub trait SeparationEngine: Send + Sync {
    /// Run one separation to completion; must not retry
    async fn separate(&self, job: &SeparationJob) -> Result<(), EngineError>;

    /// Cheap availability check, bounded by `timeout`
    async fn probe(&self, timeout: Duration) -> Result<(), EngineError>;
}

/// Engine launched as a child process (Demucs CLI by default)
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl ProcessEngine {
    /// `command` is the program followed by any fixed arguments,
    /// e.g. `["python", "-m", "demucs"]`
    pub fn new(command: &[String], timeout: Duration) -> Self {
        let (program, leading_args) = match command.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => ("demucs".to_string(), Vec::new()),
        };
        Self {
            program,
            leading_args,
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.command, config.separation_timeout)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, timeout: Duration) -> Result<Output, EngineError> {
        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| EngineError::TimedOut(timeout))?
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(EngineError::Failed {
                status: output.status.to_string(),
                diagnostics: diagnostics(&output),
            })
        }
    }
}

#[async_trait]
impl SeparationEngine for ProcessEngine {
    async fn separate(&self, job: &SeparationJob) -> Result<(), EngineError> {
        let mut cmd = self.command();
        cmd.arg("--model")
            .arg(&job.model)
            .arg("--out")
            .arg(&job.output_dir)
            .arg(&job.input.path);

        info!(
            identity = %job.input.identity,
            model = %job.model,
            timeout_secs = self.timeout.as_secs(),
            "Starting separation engine"
        );

        let started = Instant::now();
        match self.run(cmd, self.timeout).await {
            Ok(output) => {
                debug!(
                    identity = %job.input.identity,
                    stdout_bytes = output.stdout.len(),
                    "Engine output captured"
                );
                info!(
                    identity = %job.input.identity,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Separation engine completed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    identity = %job.input.identity,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Separation engine failed"
                );
                Err(e)
            }
        }
    }

    async fn probe(&self, timeout: Duration) -> Result<(), EngineError> {
        let mut cmd = self.command();
        cmd.arg("--help");
        self.run(cmd, timeout).await.map(|_| ())
    }
}

/// Prefer stderr; fall back to stdout when the engine reported nothing there
fn diagnostics(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::{SeparationJob, StoredInput};
    use crate::services::artifact_namer::name_upload;
    use std::path::Path;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string(), "engine".to_string()]
    }

    fn job(root: &Path) -> SeparationJob {
        let identity = name_upload("song.mp3");
        let input = StoredInput {
            path: root.join(identity.as_str()),
            identity,
            original_filename: "song.mp3".to_string(),
            size: 0,
        };
        SeparationJob::new(input, "htdemucs_6s", root)
    }

    #[tokio::test]
    async fn passes_model_output_and_input_arguments() {
        let dir = TempDir::new().unwrap();
        let job = job(dir.path());
        let record = dir.path().join("args.txt");
        let engine = ProcessEngine::new(
            &sh(&format!("echo \"$@\" > '{}'", record.display())),
            Duration::from_secs(10),
        );

        engine.separate(&job).await.unwrap();

        let args = std::fs::read_to_string(&record).unwrap();
        assert_eq!(
            args.trim(),
            format!(
                "--model htdemucs_6s --out {} {}",
                job.output_dir.display(),
                job.input.path.display()
            )
        );
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let engine = ProcessEngine::new(
            &sh("echo 'model weights missing' >&2; exit 3"),
            Duration::from_secs(10),
        );

        let err = engine.separate(&job(dir.path())).await.unwrap_err();

        assert!(matches!(err, EngineError::Failed { .. }));
        assert_eq!(err.details(), "model weights missing");
    }

    #[tokio::test]
    async fn slow_engine_times_out() {
        let dir = TempDir::new().unwrap();
        let engine = ProcessEngine::new(&sh("sleep 5"), Duration::from_millis(200));

        let started = Instant::now();
        let err = engine.separate(&job(dir.path())).await.unwrap_err();

        assert!(matches!(err, EngineError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let engine = ProcessEngine::new(
            &["/nonexistent/stemsplit-engine".to_string()],
            Duration::from_secs(1),
        );

        let err = engine.probe(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[tokio::test]
    async fn probe_passes_help_flag() {
        let engine = ProcessEngine::new(
            &sh("test \"$1\" = --help"),
            Duration::from_secs(1),
        );
        assert!(engine.probe(Duration::from_secs(5)).await.is_ok());
    }
}
