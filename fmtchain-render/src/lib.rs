//! Rendering helpers: unified diffs between snapshots and human-readable summaries.

use diffy::PatchFormatter;
use fmtchain_types::FileSet;
use fmtchain_types::FormatResult;
use fmtchain_types::report::{FmtReport, ReportStatus, StageStatus};

/// Unified diff, in path order, of every file whose content differs.
///
/// Files only present on one side are diffed against empty content.
pub fn render_patch(before: &FileSet, after: &FileSet) -> String {
    let mut out = String::new();
    let formatter = PatchFormatter::new();

    let mut paths: Vec<_> = before.keys().chain(after.keys()).collect();
    paths.sort();
    paths.dedup();

    for path in paths {
        let old = before.get(path).map(|b| String::from_utf8_lossy(b)).unwrap_or_default();
        let new = after.get(path).map(|b| String::from_utf8_lossy(b)).unwrap_or_default();
        if old == new {
            continue;
        }

        out.push_str(&format!("diff --git a/{0} b/{0}\n", path));
        out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", path));

        let patch = diffy::create_patch(&old, &new);
        out.push_str(&formatter.fmt_patch(&patch).to_string());
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}

/// One status line per result, in the style `+ black made changes.`
pub fn render_result_line(result: &FormatResult) -> String {
    let sigil = if result.skipped {
        "-"
    } else if result.did_change() {
        "+"
    } else {
        "✓"
    };
    format!("{} {}", sigil, result.message())
}

pub fn render_failure_line(formatter_name: &str) -> String {
    format!("𐄂 {} failed.", formatter_name)
}

pub fn render_report_md(report: &FmtReport) -> String {
    let mut out = String::new();
    out.push_str("# fmtchain run\n\n");
    out.push_str(&format!(
        "- Status: `{}`\n- Mode: {}\n- Chains: {} (changed {}, failed {})\n\n",
        report_status_label(report.verdict.status),
        if report.check_only { "check" } else { "fix" },
        report.verdict.chains,
        report.verdict.changed,
        report.verdict.failed,
    ));

    out.push_str("## Chains\n\n");
    if report.chains.is_empty() {
        out.push_str("_Nothing to format._\n");
        return out;
    }

    for chain in &report.chains {
        out.push_str(&format!(
            "### Batch {} ({} files)\n\n",
            chain.batch,
            chain.files.len()
        ));
        for stage in &chain.stages {
            out.push_str(&format!(
                "- `{}`: {}\n",
                stage.formatter,
                stage_status_label(stage.status)
            ));
        }
        if let Some(err) = &chain.error {
            out.push_str(&format!("\n**Error**\n\n```\n{}\n```\n", err.trim_end()));
        }
        out.push('\n');
    }

    out
}

fn report_status_label(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Pass => "pass",
        ReportStatus::Changed => "changed",
        ReportStatus::Fail => "fail",
    }
}

fn stage_status_label(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Changed => "made changes",
        StageStatus::Unchanged => "made no changes",
        StageStatus::Skipped => "skipped",
        StageStatus::Failed => "failed",
    }
}
