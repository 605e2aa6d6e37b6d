use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

/// Outcome of one formatter (or one whole chain) over a file set.
///
/// A skipped result has `original == output` and empty streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResult {
    pub original: Snapshot,
    pub output: Snapshot,
    pub stdout: String,
    pub stderr: String,
    pub formatter_name: String,
    pub skipped: bool,
}

impl FormatResult {
    pub fn skip(formatter_name: impl Into<String>) -> Self {
        Self {
            original: Snapshot::empty(),
            output: Snapshot::empty(),
            stdout: String::new(),
            stderr: String::new(),
            formatter_name: formatter_name.into(),
            skipped: true,
        }
    }

    pub fn did_change(&self) -> bool {
        self.original != self.output
    }

    pub fn message(&self) -> String {
        if self.skipped {
            return format!("{} skipped.", self.formatter_name);
        }
        if self.did_change() {
            format!("{} made changes.", self.formatter_name)
        } else {
            format!("{} made no changes.", self.formatter_name)
        }
    }
}
