//! Local process execution in a throwaway directory.

use crate::adapters::InMemoryContentStore;
use crate::error::EngineError;
use crate::ports::{ContentStore, ProcessRunner};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use fmtchain_types::FileSet;
use fmtchain_types::process::{CONCURRENCY_PLACEHOLDER, ProcessSpec, RawProcessResult};
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Prefix of every sandbox directory; output is scrubbed of paths carrying it.
pub const SANDBOX_PREFIX: &str = "fmtchain-sandbox-";

/// Materializes the input digest into a temp dir, runs the argv there and captures the
/// declared output files back into the store.
#[derive(Debug, Clone)]
pub struct LocalProcessRunner {
    store: Arc<InMemoryContentStore>,
    max_concurrency: usize,
    timeout: Option<Duration>,
}

impl LocalProcessRunner {
    pub fn new(store: Arc<InMemoryContentStore>) -> Self {
        let max_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            store,
            max_concurrency,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Concurrency actually handed to the tool for a spec.
    pub fn granted_concurrency(&self, spec: &ProcessSpec) -> usize {
        spec.concurrency_available.clamp(1, self.max_concurrency)
    }
}

/// Replaces the concurrency placeholder in every argument.
pub fn substitute_concurrency(argv: &[String], granted: usize) -> Vec<String> {
    let value = granted.to_string();
    argv.iter()
        .map(|arg| arg.replace(CONCURRENCY_PLACEHOLDER, &value))
        .collect()
}

async fn write_inputs(root: &Utf8Path, files: &FileSet) -> anyhow::Result<()> {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs_err::tokio::create_dir_all(parent).await?;
        }
        fs_err::tokio::write(&full, contents).await?;
    }
    Ok(())
}

async fn capture_outputs(root: &Utf8Path, outputs: &[Utf8PathBuf]) -> anyhow::Result<FileSet> {
    let mut captured = FileSet::new();
    for path in outputs {
        match fs_err::tokio::read(root.join(path)).await {
            Ok(bytes) => {
                captured.insert(path.clone(), bytes);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path, "declared output was not produced");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(captured)
}

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<RawProcessResult, EngineError> {
        let inputs = self.store.contents(&spec.input_digest).await?;

        let dir = tempfile::Builder::new()
            .prefix(SANDBOX_PREFIX)
            .tempdir()
            .context("create sandbox directory")
            .map_err(EngineError::Sandbox)?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|p| EngineError::Sandbox(anyhow!("non-utf8 sandbox path {}", p.display())))?;

        write_inputs(&root, &inputs)
            .await
            .context("materialize sandbox inputs")
            .map_err(EngineError::Sandbox)?;

        let argv = substitute_concurrency(&spec.argv, self.granted_concurrency(spec));
        let Some((program, args)) = argv.split_first() else {
            return Err(EngineError::Sandbox(anyhow!("empty argv for {}", spec.description)));
        };

        info!("{}", spec.description);
        debug!(argv = ?argv, sandbox = %root, "spawning");

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .current_dir(&root)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let child = command.output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| {
                    EngineError::Sandbox(anyhow!(
                        "{} timed out after {}s",
                        spec.description,
                        limit.as_secs()
                    ))
                })?,
            None => child.await,
        }
        .with_context(|| format!("spawn {program}"))
        .map_err(EngineError::Sandbox)?;

        // A signal-terminated child has no exit code.
        let exit_code = output.status.code().unwrap_or(-1);

        let captured = capture_outputs(&root, &spec.output_files)
            .await
            .context("capture sandbox outputs")
            .map_err(EngineError::Sandbox)?;
        let output_digest = self.store.store(captured).digest;

        debug!(exit_code, output = %output_digest, "process finished");

        Ok(RawProcessResult {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            output_digest,
        })
    }
}
