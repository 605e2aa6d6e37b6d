//! Port traits for every collaborator the pipeline talks to.
//!
//! Each call is a suspension point; implementations decide whether work is cached, remote or
//! local.

use crate::error::EngineError;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use fmtchain_types::process::{
    ConfigFiles, ConfigFilesRequest, ProcessSpec, RawProcessResult, ToolHandle, ToolRequest,
};
use fmtchain_types::{Digest, FileSet, Snapshot};

/// Provides a runnable tool for a runtime constraint.
#[async_trait]
pub trait ToolMaterializer: Send + Sync {
    async fn materialize(&self, request: &ToolRequest) -> Result<ToolHandle, EngineError>;
}

/// Reads source files into the content store.
#[async_trait]
pub trait SourceSnapshotter: Send + Sync {
    async fn snapshot_sources(&self, paths: &[Utf8PathBuf]) -> Result<Snapshot, EngineError>;
}

/// Looks up tool configuration. Missing files are simply absent from the result.
#[async_trait]
pub trait ConfigDiscovery: Send + Sync {
    async fn discover(&self, request: &ConfigFilesRequest) -> ConfigFiles;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Union of several digests. Fails if two of them disagree on a path.
    async fn merge(&self, digests: &[Digest]) -> Result<Digest, EngineError>;

    async fn snapshot(&self, digest: &Digest) -> Result<Snapshot, EngineError>;

    async fn contents(&self, digest: &Digest) -> Result<FileSet, EngineError>;
}

/// Executes a process spec in isolation. A non-zero exit is returned, not raised.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &ProcessSpec) -> Result<RawProcessResult, EngineError>;
}

/// File-system write operations.
pub trait WritePort: Send + Sync {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    /// Removing a file that is already gone succeeds.
    fn remove_file(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// The collaborators one run needs, borrowed for its duration.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub tools: &'a dyn ToolMaterializer,
    pub sources: &'a dyn SourceSnapshotter,
    pub config: &'a dyn ConfigDiscovery,
    pub store: &'a dyn ContentStore,
    pub runner: &'a dyn ProcessRunner,
}
