//! Shared value types for the fmtchain workspace.
//!
//! # Design constraints
//! - Every type here is an immutable value; new values are derived, never mutated in place.
//! - Snapshots and digests compare by content, so they can be shared freely across tasks.
//! - Report types are serialized to disk; prefer adding optional fields over changing semantics.

pub mod constraints;
pub mod formatter;
pub mod process;
pub mod report;
pub mod result;
pub mod snapshot;
pub mod unit;

pub use constraints::{ConstraintParseError, RuntimeConstraints, Version};
pub use formatter::FormatterId;
pub use result::FormatResult;
pub use snapshot::{Digest, FileSet, Snapshot};
pub use unit::{BuildUnit, Capability, Language, SourceField, UnitAddress};

/// Schema identifiers.
pub mod schema {
    pub const FMTCHAIN_REPORT_V1: &str = "fmtchain.report.v1";
}
