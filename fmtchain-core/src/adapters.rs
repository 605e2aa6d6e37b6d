//! Default port implementations: an in-memory content store plus filesystem- and
//! interpreter-backed collaborators.

use crate::error::EngineError;
use crate::ports::{ConfigDiscovery, ContentStore, SourceSnapshotter, ToolMaterializer, WritePort};
use anyhow::Context;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use fmtchain_types::process::{ConfigFiles, ConfigFilesRequest, ToolHandle, ToolRequest};
use fmtchain_types::{Digest, FileSet, Snapshot, Version};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Content-addressed blobs kept in process memory for the length of a run.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    blobs: Mutex<HashMap<Digest, FileSet>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `files` and returns the snapshot that now names them.
    pub fn store(&self, files: FileSet) -> Snapshot {
        let snapshot = Snapshot::from_files(&files);
        self.blobs().insert(snapshot.digest.clone(), files);
        snapshot
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<Digest, FileSet>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, digest: &Digest) -> Result<FileSet, EngineError> {
        if *digest == Digest::empty() {
            return Ok(FileSet::new());
        }
        self.blobs()
            .get(digest)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDigest(digest.clone()))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn merge(&self, digests: &[Digest]) -> Result<Digest, EngineError> {
        let mut merged = FileSet::new();
        for digest in digests {
            for (path, contents) in self.lookup(digest)? {
                match merged.get(&path) {
                    Some(existing) if *existing != contents => {
                        return Err(EngineError::MergeConflict { path });
                    }
                    Some(_) => {}
                    None => {
                        merged.insert(path, contents);
                    }
                }
            }
        }
        Ok(self.store(merged).digest)
    }

    async fn snapshot(&self, digest: &Digest) -> Result<Snapshot, EngineError> {
        Ok(Snapshot::from_files(&self.lookup(digest)?))
    }

    async fn contents(&self, digest: &Digest) -> Result<FileSet, EngineError> {
        self.lookup(digest)
    }
}

/// Snapshots sources relative to a workspace root.
#[derive(Debug, Clone)]
pub struct FsSourceSnapshotter {
    root: Utf8PathBuf,
    store: Arc<InMemoryContentStore>,
}

impl FsSourceSnapshotter {
    pub fn new(root: impl Into<Utf8PathBuf>, store: Arc<InMemoryContentStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }
}

#[async_trait]
impl SourceSnapshotter for FsSourceSnapshotter {
    async fn snapshot_sources(&self, paths: &[Utf8PathBuf]) -> Result<Snapshot, EngineError> {
        let mut files = FileSet::new();
        for path in paths {
            let full = self.root.join(path);
            match fs_err::tokio::read(&full).await {
                Ok(bytes) => {
                    files.insert(path.clone(), bytes);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(EngineError::SourceNotFound(path.clone()));
                }
                Err(source) => return Err(EngineError::Io { path: full, source }),
            }
        }
        let snapshot = self.store.store(files);
        debug!(files = snapshot.files.len(), digest = %snapshot.digest, "snapshotted sources");
        Ok(snapshot)
    }
}

/// Serves sources from a fixed file set, for embedding and testing.
#[derive(Debug, Clone)]
pub struct InMemorySourceSnapshotter {
    files: FileSet,
    store: Arc<InMemoryContentStore>,
}

impl InMemorySourceSnapshotter {
    pub fn new(files: FileSet, store: Arc<InMemoryContentStore>) -> Self {
        Self { files, store }
    }
}

#[async_trait]
impl SourceSnapshotter for InMemorySourceSnapshotter {
    async fn snapshot_sources(&self, paths: &[Utf8PathBuf]) -> Result<Snapshot, EngineError> {
        let mut files = FileSet::new();
        for path in paths {
            let contents = self
                .files
                .get(path)
                .ok_or_else(|| EngineError::SourceNotFound(path.clone()))?;
            files.insert(path.clone(), contents.clone());
        }
        Ok(self.store.store(files))
    }
}

/// Every path a config request could possibly pick up.
fn candidate_paths(request: &ConfigFilesRequest) -> Vec<Utf8PathBuf> {
    let mut out: Vec<Utf8PathBuf> = request.specified.iter().cloned().collect();
    if request.discovery {
        out.extend(request.check_existence.iter().cloned());
        out.extend(request.check_content.iter().map(|(p, _)| p.clone()));
    }
    out.sort();
    out.dedup();
    out
}

/// Applies a config request to the candidate files that were found.
fn select_config(request: &ConfigFilesRequest, found: &FileSet) -> FileSet {
    let mut selected = FileSet::new();

    if let Some(specified) = &request.specified {
        match found.get(specified) {
            Some(contents) => {
                selected.insert(specified.clone(), contents.clone());
            }
            None => warn!(path = %specified, "specified config file does not exist; ignoring"),
        }
    }

    if request.discovery {
        for path in &request.check_existence {
            if let Some(contents) = found.get(path) {
                selected.insert(path.clone(), contents.clone());
            }
        }
        for (path, needle) in &request.check_content {
            if let Some(contents) = found.get(path)
                && contains_bytes(contents, needle)
            {
                selected.insert(path.clone(), contents.clone());
            }
        }
    }

    selected
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Looks up config files relative to a workspace root.
#[derive(Debug, Clone)]
pub struct FsConfigDiscovery {
    root: Utf8PathBuf,
    store: Arc<InMemoryContentStore>,
}

impl FsConfigDiscovery {
    pub fn new(root: impl Into<Utf8PathBuf>, store: Arc<InMemoryContentStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }
}

#[async_trait]
impl ConfigDiscovery for FsConfigDiscovery {
    async fn discover(&self, request: &ConfigFilesRequest) -> ConfigFiles {
        let mut found = FileSet::new();
        for path in candidate_paths(request) {
            match fs_err::tokio::read(self.root.join(&path)).await {
                Ok(bytes) => {
                    found.insert(path, bytes);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path, error = %e, "unreadable config candidate"),
            }
        }
        let files = select_config(request, &found);
        debug!(found = files.len(), "discovered config files");
        ConfigFiles {
            snapshot: self.store.store(files),
        }
    }
}

/// Config discovery over a fixed file set, for embedding and testing.
#[derive(Debug, Clone)]
pub struct InMemoryConfigDiscovery {
    files: FileSet,
    store: Arc<InMemoryContentStore>,
}

impl InMemoryConfigDiscovery {
    pub fn new(files: FileSet, store: Arc<InMemoryContentStore>) -> Self {
        Self { files, store }
    }
}

#[async_trait]
impl ConfigDiscovery for InMemoryConfigDiscovery {
    async fn discover(&self, request: &ConfigFilesRequest) -> ConfigFiles {
        ConfigFiles {
            snapshot: self.store.store(select_config(request, &self.files)),
        }
    }
}

/// An interpreter available on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub path: Utf8PathBuf,
    pub version: Version,
}

/// Runs tools as `<interpreter> -m <entry point>` using the lowest interpreter that satisfies
/// the request. The tool itself must already be installed for that interpreter.
#[derive(Debug, Clone, Default)]
pub struct InterpreterToolMaterializer {
    interpreters: Vec<Interpreter>,
}

impl InterpreterToolMaterializer {
    pub fn new(mut interpreters: Vec<Interpreter>) -> Self {
        interpreters.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)));
        Self { interpreters }
    }

    pub fn interpreters(&self) -> &[Interpreter] {
        &self.interpreters
    }
}

#[async_trait]
impl ToolMaterializer for InterpreterToolMaterializer {
    async fn materialize(&self, request: &ToolRequest) -> Result<ToolHandle, EngineError> {
        let chosen = self
            .interpreters
            .iter()
            .find(|i| request.interpreter_constraints.contains(i.version))
            .ok_or_else(|| EngineError::NoCompatibleRuntime {
                tool: request.tool.clone(),
                constraints: request.interpreter_constraints.clone(),
            })?;

        info!(
            tool = %request.tool,
            interpreter = %chosen.path,
            version = %chosen.version,
            constraints = %request.interpreter_constraints,
            "materialized tool"
        );

        let mut lock = FileSet::new();
        lock.insert(
            Utf8PathBuf::from(format!("{}.lock", request.tool)),
            request.requirements.join("\n").into_bytes(),
        );

        Ok(ToolHandle {
            tool: request.tool.clone(),
            argv: vec![
                chosen.path.to_string(),
                "-m".to_string(),
                request.entry_point.clone(),
            ],
            interpreter_version: Some(chosen.version),
            digest: Digest::of_files(&lock),
        })
    }
}

/// Interpreter names probed when none are configured.
pub fn default_interpreter_candidates() -> Vec<String> {
    let mut out: Vec<String> = (6..=13).rev().map(|minor| format!("python3.{minor}")).collect();
    out.push("python3".to_string());
    out.push("python".to_string());
    out
}

/// Asks each candidate for its version; candidates that cannot be run are dropped, as are
/// later candidates reporting an already found version.
pub async fn probe_interpreters(candidates: &[String]) -> Vec<Interpreter> {
    let mut found: Vec<Interpreter> = Vec::new();
    for candidate in candidates {
        let output = tokio::process::Command::new(candidate)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await;
        let Ok(output) = output else {
            continue;
        };
        if !output.status.success() {
            continue;
        }
        // Python 2 reports its version on stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        let Some(version) = parse_version_banner(&text) else {
            debug!(candidate = %candidate, banner = %text.trim(), "unrecognised version banner");
            continue;
        };
        if found.iter().any(|i| i.version == version) {
            continue;
        }
        debug!(candidate = %candidate, %version, "found interpreter");
        found.push(Interpreter {
            path: Utf8PathBuf::from(candidate),
            version,
        });
    }
    found
}

fn parse_version_banner(text: &str) -> Option<Version> {
    text.trim().strip_prefix("Python ")?.trim().parse().ok()
}

/// Filesystem write operations rooted at a workspace.
#[derive(Debug, Clone)]
pub struct FsWritePort {
    root: Utf8PathBuf,
}

impl FsWritePort {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs_err::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", full))?;
        }
        fs_err::write(&full, contents).with_context(|| format!("write {}", full))
    }

    fn remove_file(&self, path: &Utf8Path) -> anyhow::Result<()> {
        let full = self.root.join(path);
        match fs_err::remove_file(&full) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other.with_context(|| format!("remove {}", full)),
        }
    }
}
