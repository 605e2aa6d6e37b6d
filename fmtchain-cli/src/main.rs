mod config;
mod explain;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use config::CliOverrides;
use fmtchain_core::adapters::{
    FsConfigDiscovery, FsSourceSnapshotter, FsWritePort, InMemoryContentStore,
    InterpreterToolMaterializer, default_interpreter_candidates, probe_interpreters,
};
use fmtchain_core::chain::ChainOutcome;
use fmtchain_core::pipeline::{FmtOutcome, run_fmt, write_changes};
use fmtchain_core::ports::Collaborators;
use fmtchain_core::sandbox::LocalProcessRunner;
use fmtchain_core::{FmtSettings, StageError};
use fmtchain_domain::FormatterRegistry;
use fmtchain_render::{render_failure_line, render_report_md, render_result_line};
use fmtchain_types::BuildUnit;
use fmtchain_types::report::ReportToolInfo;
use fs_err as fs;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fmtchain",
    version,
    about = "Runs chains of external code formatters over a workspace."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Format the workspace, each formatter seeing the previous one's output.
    Fmt(FmtArgs),
    /// Explain a formatter: what it runs, under which runtime, with which config.
    Explain(ExplainArgs),
    /// List the available formatters in chain order.
    ListFormatters(ListFormattersArgs),
}

#[derive(Debug, Parser)]
struct FmtArgs {
    /// Repository root (default: current directory).
    #[arg(long, default_value = ".")]
    repo_root: Utf8PathBuf,

    /// Config file (default: <repo_root>/fmtchain.toml when present).
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Only format files under these repo-relative paths.
    paths: Vec<Utf8PathBuf>,

    /// Report what would change and exit non-zero instead of writing files.
    #[arg(long, default_value_t = false)]
    check: bool,

    /// Run only these formatters (repeatable), keeping the configured order.
    #[arg(long)]
    only: Vec<String>,

    /// Skip these formatters (repeatable).
    #[arg(long)]
    skip: Vec<String>,

    /// Extra arguments for a formatter, as NAME=ARGS (repeatable).
    #[arg(long = "args", value_name = "NAME=ARGS")]
    args: Vec<String>,

    /// Print the unified diff of all changes.
    #[arg(long, default_value_t = false)]
    diff: bool,

    /// Write a JSON run report to this path.
    #[arg(long)]
    report: Option<Utf8PathBuf>,

    /// Write a Markdown summary to this path.
    #[arg(long)]
    summary: Option<Utf8PathBuf>,

    /// Maximum number of units per chain.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Kill a formatter process after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Parser)]
struct ExplainArgs {
    /// Formatter name (e.g., "black", "pyupgrade").
    formatter: String,
}

#[derive(Debug, Parser)]
struct ListFormattersArgs {
    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:?}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<u8> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Fmt(args) => cmd_fmt(args),
        Command::Explain(args) => cmd_explain(args).map(|_| 0),
        Command::ListFormatters(args) => cmd_list_formatters(args).map(|_| 0),
    }
}

fn cmd_fmt(args: FmtArgs) -> anyhow::Result<u8> {
    let repo_root = args.repo_root;
    let file_config = config::load_or_default(&repo_root, args.config.as_deref())
        .context("load fmtchain.toml config")?;

    let overrides = CliOverrides {
        only: config::parse_formatter_names(&args.only).context("parse --only")?,
        skip: config::parse_formatter_names(&args.skip).context("parse --skip")?,
        args: config::parse_cli_args(&args.args)?,
        check: args.check,
        batch_size: args.batch_size,
        timeout_secs: args.timeout_secs,
    };
    let fmt_config = file_config.fmt_config(&overrides);
    debug!(
        "merged config: order={:?}, batch_size={}, check={}",
        fmt_config.order, fmt_config.batch_size, fmt_config.check
    );
    let settings = FmtSettings::resolve(FormatterRegistry::new(), &fmt_config)
        .context("resolve formatter options")?;

    let units = filter_units(file_config.build_units(&repo_root)?, &args.paths);
    info!(units = units.len(), "collected build units");

    let interpreters = file_config.interpreters();
    let check = settings.check();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;

    let outcome = runtime.block_on(async {
        let interpreters = if interpreters.is_empty() {
            let candidates = file_config
                .python
                .search
                .clone()
                .unwrap_or_else(default_interpreter_candidates);
            probe_interpreters(&candidates).await
        } else {
            interpreters
        };
        let store = Arc::new(InMemoryContentStore::new());
        let tools = InterpreterToolMaterializer::new(interpreters);
        debug!(interpreters = ?tools.interpreters(), "available interpreters");
        let sources = FsSourceSnapshotter::new(repo_root.clone(), store.clone());
        let discovery = FsConfigDiscovery::new(repo_root.clone(), store.clone());
        let mut runner = LocalProcessRunner::new(store.clone());
        if let Some(timeout) = settings.timeout() {
            runner = runner.with_timeout(timeout);
        }
        let collaborators = Collaborators {
            tools: &tools,
            sources: &sources,
            config: &discovery,
            store: store.as_ref(),
            runner: &runner,
        };
        run_fmt(&units, &settings, &collaborators, tool_info()).await
    })?;

    print_summary(&outcome);
    if args.diff && !outcome.patch.is_empty() {
        print!("{}", outcome.patch);
    }

    if let Some(path) = &args.report {
        write_json(path, &outcome.report)?;
    }
    if let Some(path) = &args.summary {
        fs::write(path, render_report_md(&outcome.report))
            .with_context(|| format!("write {}", path))?;
    }

    if !check {
        let written = write_changes(&outcome, &FsWritePort::new(repo_root.clone()))?;
        info!("wrote {} formatted files under {}", written, repo_root);
    }

    Ok(u8::try_from(outcome.exit_code(check)).unwrap_or(1))
}

/// Keeps units whose source lies under one of `paths`; all of them when `paths` is empty.
fn filter_units(units: Vec<BuildUnit>, paths: &[Utf8PathBuf]) -> Vec<BuildUnit> {
    if paths.is_empty() {
        return units;
    }
    units
        .into_iter()
        .filter(|u| {
            u.source()
                .is_some_and(|s| paths.iter().any(|p| s.path.starts_with(p)))
        })
        .collect()
}

fn print_summary(outcome: &FmtOutcome) {
    for chain in &outcome.chains {
        print_chain(chain);
    }
}

fn print_chain(chain: &ChainOutcome) {
    for stage in &chain.stages {
        println!("{}", render_result_line(stage));
    }
    if let Some(failure) = &chain.failure {
        println!("{}", render_failure_line(failure.formatter.name()));
        match &failure.error {
            StageError::ToolFailed { stdout, stderr, .. } => {
                for stream in [stdout, stderr] {
                    if !stream.trim().is_empty() {
                        println!("{}", stream.trim_end());
                    }
                }
            }
            StageError::Engine(e) => println!("{}", e),
        }
    }
}

fn write_json<T: serde::Serialize>(path: &Utf8Path, v: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize json")?;
    fs::write(path, s).with_context(|| format!("write {}", path))?;
    Ok(())
}

fn tool_info() -> ReportToolInfo {
    ReportToolInfo {
        name: "fmtchain".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn cmd_explain(args: ExplainArgs) -> anyhow::Result<()> {
    use explain::{config_note, exit_code_note, list_names, lookup, runtime_note};

    let registry = FormatterRegistry::new();
    let Some(meta) = lookup(&registry, &args.formatter) else {
        anyhow::bail!(
            "Unknown formatter: '{}'\n\nAvailable formatters: {}",
            args.formatter,
            list_names(&registry).join(", ")
        );
    };

    println!("================================================================================");
    println!("FORMATTER: {}", meta.id);
    println!("================================================================================");
    println!();
    println!("Description:  {}", meta.description);
    println!("Requirement:  {}", meta.default_requirement);
    println!("Entry point:  {}", meta.entry_point);
    println!();

    println!("RUNTIME");
    println!("--------------------------------------------------------------------------------");
    println!("{}", runtime_note(&meta));
    println!();

    println!("CONFIGURATION");
    println!("--------------------------------------------------------------------------------");
    println!("{}", config_note(meta.id));
    println!();

    println!("EXIT CODES");
    println!("--------------------------------------------------------------------------------");
    println!("{}", exit_code_note(&meta));
    println!();

    Ok(())
}

fn cmd_list_formatters(args: ListFormattersArgs) -> anyhow::Result<()> {
    let registry = FormatterRegistry::new();

    match args.format {
        OutputFormat::Text => {
            println!("Available formatters:\n");
            println!("  {:<12} {:<20} DESCRIPTION", "NAME", "REQUIREMENT");
            println!("  {:<12} {:<20} -----------", "----", "-----------");
            for f in registry.iter() {
                let meta = f.meta();
                println!(
                    "  {:<12} {:<20} {}",
                    meta.id.name(),
                    meta.default_requirement,
                    meta.description
                );
            }
            println!();
            println!("Use 'fmtchain explain <name>' for details.");
        }
        OutputFormat::Json => {
            let formatters: Vec<_> = registry
                .iter()
                .map(|f| {
                    let meta = f.meta();
                    serde_json::json!({
                        "name": meta.id.name(),
                        "description": meta.description,
                        "requirement": meta.default_requirement,
                        "interpreter_constraints": meta.default_interpreter_constraints,
                        "runtime_threshold": meta.runtime_threshold.map(|v| v.to_string()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&formatters)?);
        }
    }
    Ok(())
}
