use crate::formatters::FormatterArgs;
use camino::Utf8PathBuf;
use fmtchain_types::Digest;
use fmtchain_types::process::{ProcessSpec, ToolHandle};

/// Assemble, without running, the invocation of `tool` over `files`.
///
/// The files are rewritten in place, so they are also the declared outputs.
pub fn build_process(
    tool: &ToolHandle,
    input_digest: Digest,
    files: &[Utf8PathBuf],
    args: &FormatterArgs,
    concurrency: usize,
) -> ProcessSpec {
    let argv = tool
        .argv
        .iter()
        .chain(&args.config_flags)
        .chain(&args.fixed_flags)
        .chain(&args.extra_args)
        .cloned()
        .chain(files.iter().map(|f| f.to_string()))
        .collect();
    ProcessSpec {
        argv,
        input_digest,
        output_files: files.to_vec(),
        concurrency_available: concurrency,
        description: format!("Run {} on {}.", tool.tool, pluralize(files.len(), "file")),
    }
}

pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
