use camino::Utf8PathBuf;
use fmtchain_types::{Digest, FormatterId, RuntimeConstraints};
use thiserror::Error;

/// Failures raised by collaborators while preparing or running a stage.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no interpreter satisfying {constraints} is available to run {tool}")]
    NoCompatibleRuntime {
        tool: String,
        constraints: RuntimeConstraints,
    },

    #[error("source file not found: {0}")]
    SourceNotFound(Utf8PathBuf),

    #[error("cannot merge digests: conflicting content for {path}")]
    MergeConflict { path: Utf8PathBuf },

    #[error("digest {0} is not in the content store")]
    UnknownDigest(Digest),

    #[error("io error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sandbox failure: {0:#}")]
    Sandbox(anyhow::Error),
}

impl EngineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::NoCompatibleRuntime { .. }
            | EngineError::SourceNotFound(_)
            | EngineError::MergeConflict { .. } => 2,
            EngineError::UnknownDigest(_) | EngineError::Io { .. } | EngineError::Sandbox(_) => 1,
        }
    }
}

/// Why a single stage of a chain did not produce a result.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{formatter} failed with exit code {exit_code}")]
    ToolFailed {
        formatter: FormatterId,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

impl StageError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StageError::Engine(e) => e.exit_code(),
            StageError::ToolFailed { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_problems_exit_two() {
        let err = EngineError::MergeConflict {
            path: Utf8PathBuf::from("x"),
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "cannot merge digests: conflicting content for x"
        );
    }

    #[test]
    fn tool_failures_exit_one() {
        let err = StageError::ToolFailed {
            formatter: FormatterId::Black,
            exit_code: 123,
            stdout: String::new(),
            stderr: "error: cannot format f.py".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "black failed with exit code 123");
    }

    #[test]
    fn engine_errors_pass_through_stage_errors() {
        let err: StageError = EngineError::SourceNotFound(Utf8PathBuf::from("f.py")).into();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "source file not found: f.py");
    }
}
