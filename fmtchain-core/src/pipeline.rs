//! The fmt pipeline end to end: chains, diff, report, write-back.
//!
//! All I/O goes through the port traits.

use crate::chain::{ChainOutcome, engine_error, run_batches};
use crate::error::{EngineError, StageError};
use crate::ports::{Collaborators, WritePort};
use crate::settings::FmtSettings;
use anyhow::Context;
use camino::Utf8PathBuf;
use chrono::Utc;
use fmtchain_render::render_patch;
use fmtchain_types::report::{
    ChainReport, FmtReport, ReportRunInfo, ReportStatus, ReportToolInfo, ReportVerdict,
    StageReport, StageStatus,
};
use fmtchain_types::{BuildUnit, FileSet, FormatResult};
use tracing::{debug, info};

/// Outcome of `run_fmt`.
#[derive(Debug)]
pub struct FmtOutcome {
    pub chains: Vec<ChainOutcome>,
    pub report: FmtReport,
    /// Unified diff of every changed file.
    pub patch: String,
    /// Final contents of every changed file.
    pub changed_files: FileSet,
    /// Files a formatter removed from its output.
    pub deleted_files: Vec<Utf8PathBuf>,
}

impl FmtOutcome {
    pub fn failed(&self) -> bool {
        self.chains.iter().any(ChainOutcome::failed)
    }

    pub fn changed(&self) -> bool {
        !self.changed_files.is_empty() || !self.deleted_files.is_empty()
    }

    /// 2 when an engine error stopped a chain, 1 for tool failures or changes under `--check`.
    pub fn exit_code(&self, check: bool) -> i32 {
        if let Some(e) = self.chains.iter().find_map(engine_error) {
            return e.exit_code();
        }
        if self.failed() || (check && self.changed()) {
            return 1;
        }
        0
    }
}

pub async fn run_fmt(
    units: &[BuildUnit],
    settings: &FmtSettings,
    collaborators: &Collaborators<'_>,
    tool: ReportToolInfo,
) -> Result<FmtOutcome, EngineError> {
    let started = Utc::now();
    let chains = run_batches(units, settings, collaborators).await;

    let mut patch = String::new();
    let mut changed_files = FileSet::new();
    let mut deleted_files = Vec::new();
    for chain in &chains {
        let Some(result) = chain.result.as_ref().filter(|r| r.did_change()) else {
            continue;
        };
        let before = collaborators.store.contents(&result.original.digest).await?;
        let after = collaborators.store.contents(&result.output.digest).await?;
        patch.push_str(&render_patch(&before, &after));
        deleted_files.extend(before.keys().filter(|p| !after.contains_key(*p)).cloned());
        for (path, contents) in after {
            if before.get(&path) != Some(&contents) {
                changed_files.insert(path, contents);
            }
        }
    }

    let ended = Utc::now();
    let report = build_report(
        &chains,
        settings.check(),
        tool,
        ReportRunInfo {
            started_at: started.to_rfc3339(),
            ended_at: Some(ended.to_rfc3339()),
            duration_ms: u64::try_from((ended - started).num_milliseconds()).ok(),
        },
    );

    info!(
        chains = chains.len(),
        changed_files = changed_files.len(),
        deleted_files = deleted_files.len(),
        status = ?report.verdict.status,
        "fmt finished"
    );

    Ok(FmtOutcome {
        chains,
        report,
        patch,
        changed_files,
        deleted_files,
    })
}

fn stage_report(result: &FormatResult) -> StageReport {
    let status = if result.skipped {
        StageStatus::Skipped
    } else if result.did_change() {
        StageStatus::Changed
    } else {
        StageStatus::Unchanged
    };
    StageReport {
        formatter: result.formatter_name.clone(),
        status,
        stdout: result.stdout.clone(),
        stderr: result.stderr.clone(),
    }
}

fn chain_report(chain: &ChainOutcome) -> ChainReport {
    let mut stages: Vec<StageReport> = chain.stages.iter().map(stage_report).collect();
    let mut error = None;

    if let Some(failure) = &chain.failure {
        let (stdout, stderr) = match &failure.error {
            StageError::ToolFailed { stdout, stderr, .. } => (stdout.clone(), stderr.clone()),
            StageError::Engine(_) => (String::new(), String::new()),
        };
        stages.push(StageReport {
            formatter: failure.formatter.name().to_string(),
            status: StageStatus::Failed,
            stdout,
            stderr,
        });
        error = Some(failure.error.to_string());
    }

    let files = chain
        .result
        .as_ref()
        .map(|r| r.original.files.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default();

    ChainReport {
        batch: chain.batch,
        files,
        changed: chain.changed(),
        stages,
        error,
    }
}

pub fn build_report(
    chains: &[ChainOutcome],
    check_only: bool,
    tool: ReportToolInfo,
    run: ReportRunInfo,
) -> FmtReport {
    let failed = chains.iter().filter(|c| c.failed()).count() as u64;
    let changed = chains.iter().filter(|c| c.changed()).count() as u64;
    let status = if failed > 0 {
        ReportStatus::Fail
    } else if changed > 0 {
        ReportStatus::Changed
    } else {
        ReportStatus::Pass
    };

    FmtReport {
        schema: fmtchain_types::schema::FMTCHAIN_REPORT_V1.to_string(),
        tool,
        run,
        check_only,
        verdict: ReportVerdict {
            status,
            chains: chains.len() as u64,
            changed,
            failed,
        },
        chains: chains.iter().map(chain_report).collect(),
    }
}

/// Applies every change through `writer`. Returns how many files were written or removed.
pub fn write_changes(outcome: &FmtOutcome, writer: &dyn WritePort) -> anyhow::Result<usize> {
    for (path, contents) in &outcome.changed_files {
        debug!(path = %path, "writing formatted file");
        writer
            .write_file(path, contents)
            .with_context(|| format!("write back {}", path))?;
    }
    for path in &outcome.deleted_files {
        debug!(path = %path, "removing file deleted by a formatter");
        writer
            .remove_file(path)
            .with_context(|| format!("remove {}", path))?;
    }
    Ok(outcome.changed_files.len() + outcome.deleted_files.len())
}
