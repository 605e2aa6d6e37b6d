//! Requests and responses exchanged with the tool, config and process collaborators.

use crate::constraints::{RuntimeConstraints, Version};
use crate::snapshot::{Digest, Snapshot};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Placeholder in an argv that the sandbox replaces with the concurrency it grants.
pub const CONCURRENCY_PLACEHOLDER: &str = "{concurrency}";

/// Ask for an executable tool able to run under `interpreter_constraints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    pub requirements: Vec<String>,
    pub entry_point: String,
    pub interpreter_constraints: RuntimeConstraints,
}

/// A materialized tool: the argv prefix that invokes it plus any files it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolHandle {
    pub tool: String,
    pub argv: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter_version: Option<Version>,
    pub digest: Digest,
}

/// A fully assembled, not yet executed, process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub argv: Vec<String>,
    pub input_digest: Digest,
    pub output_files: Vec<Utf8PathBuf>,
    pub concurrency_available: usize,
    pub description: String,
}

/// What the sandbox hands back. A non-zero exit is data here, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProcessResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub output_digest: Digest,
}

/// Config lookup: an explicitly specified file and/or files discovered near the sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFilesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified: Option<Utf8PathBuf>,
    pub discovery: bool,
    /// Included when they exist.
    #[serde(default)]
    pub check_existence: Vec<Utf8PathBuf>,
    /// Included when they exist and contain the given bytes.
    #[serde(default)]
    pub check_content: Vec<(Utf8PathBuf, Vec<u8>)>,
}

impl ConfigFilesRequest {
    pub fn is_empty(&self) -> bool {
        self.specified.is_none()
            && (!self.discovery
                || (self.check_existence.is_empty() && self.check_content.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFiles {
    pub snapshot: Snapshot,
}
