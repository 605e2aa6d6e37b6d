//! Running formatters one after another over the same files.

use crate::acquire::acquire;
use crate::error::{EngineError, StageError};
use crate::ports::Collaborators;
use crate::reporter::{clean_stream, report};
use crate::request::FormatRequest;
use crate::settings::FmtSettings;
use camino::Utf8PathBuf;
use fmtchain_domain::{
    FieldSet, Formatter, FormatterOptions, UnitDefaults, build_process, resolve_runtime, select,
};
use fmtchain_types::{BuildUnit, FormatResult, FormatterId, Snapshot, UnitAddress};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

/// Runs one formatter over one request.
///
/// A skipped formatter returns before touching any collaborator.
pub async fn run_formatter(
    request: &FormatRequest,
    formatter: &dyn Formatter,
    options: &FormatterOptions,
    defaults: &UnitDefaults,
    collaborators: &Collaborators<'_>,
) -> Result<FormatResult, StageError> {
    let meta = formatter.meta();
    if options.skip {
        debug!(formatter = meta.id.name(), "skipped by configuration");
        return Ok(FormatResult::skip(meta.id.name()));
    }

    let runtime = resolve_runtime(
        request.field_sets(),
        &options.interpreter_constraints,
        meta.runtime_threshold,
        defaults,
    );
    let acquired = acquire(request, formatter, options, runtime, collaborators).await?;

    let targets: Vec<Utf8PathBuf> = request
        .target_files()
        .into_iter()
        .filter(|p| acquired.snapshot.contains(p))
        .collect();
    let args = formatter.args(options);
    let mut spec = build_process(
        &acquired.tool,
        acquired.input_digest,
        &targets,
        &args,
        request.field_sets().len(),
    );
    // Files this stage does not target still flow through to the next one.
    spec.output_files = acquired.snapshot.files.clone();

    let raw = collaborators.runner.run(&spec).await?;
    if !meta.exit_codes.accepts(raw.exit_code) {
        return Err(StageError::ToolFailed {
            formatter: meta.id,
            exit_code: raw.exit_code,
            stdout: clean_stream(&raw.stdout),
            stderr: clean_stream(&raw.stderr),
        });
    }

    let result = report(&raw, acquired.snapshot, meta.id.name(), collaborators.store).await?;
    info!(formatter = meta.id.name(), "{}", result.message());
    Ok(result)
}

#[derive(Debug)]
pub struct StageFailure {
    pub formatter: FormatterId,
    pub error: StageError,
}

/// Everything one chain produced.
#[derive(Debug)]
pub struct ChainOutcome {
    pub batch: usize,
    pub units: Vec<UnitAddress>,
    /// Per-stage results in execution order; stages with nothing selected are absent.
    pub stages: Vec<FormatResult>,
    /// From the chain's starting snapshot to the last successful output.
    pub result: Option<FormatResult>,
    pub failure: Option<StageFailure>,
}

impl ChainOutcome {
    pub fn changed(&self) -> bool {
        self.result.as_ref().is_some_and(FormatResult::did_change)
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

fn join_streams<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs every configured formatter in order over `units`, each seeing the previous output.
pub async fn run_chain(
    batch: usize,
    units: &[BuildUnit],
    settings: &FmtSettings,
    collaborators: &Collaborators<'_>,
) -> ChainOutcome {
    let selections: Vec<(&dyn Formatter, &FormatterOptions, Vec<FieldSet>)> = settings
        .stages()
        .map(|(formatter, options)| {
            let field_sets = if options.skip {
                Vec::new()
            } else {
                select(units, formatter)
            };
            (formatter, options, field_sets)
        })
        .collect();

    let mut covered: Vec<Utf8PathBuf> = selections
        .iter()
        .flat_map(|(_, _, fs)| fs.iter().map(|f| f.source().clone()))
        .collect();
    covered.sort();
    covered.dedup();

    let mut stages = Vec::new();
    let mut start: Option<Snapshot> = None;
    let mut prior: Option<Snapshot> = None;
    let mut failure = None;

    for (formatter, options, field_sets) in selections {
        if options.skip {
            stages.push(FormatResult::skip(formatter.name()));
            continue;
        }
        if field_sets.is_empty() {
            debug!(batch, formatter = formatter.name(), "nothing selected");
            continue;
        }

        let request = match &prior {
            Some(snapshot) => FormatRequest::chained(field_sets, snapshot.clone()),
            None => FormatRequest::initial(field_sets).covering(covered.iter().cloned()),
        };

        let outcome = run_formatter(
            &request,
            formatter,
            options,
            settings.unit_defaults(),
            collaborators,
        )
        .await;
        match outcome {
            Ok(result) => {
                if start.is_none() {
                    start = Some(result.original.clone());
                }
                prior = Some(result.output.clone());
                stages.push(result);
            }
            Err(error) => {
                warn!(
                    batch,
                    formatter = formatter.name(),
                    error = %error,
                    "stage failed; stopping chain"
                );
                failure = Some(StageFailure {
                    formatter: formatter.meta().id,
                    error,
                });
                break;
            }
        }
    }

    let ran: Vec<&FormatResult> = stages.iter().filter(|r| !r.skipped).collect();
    let result = start.zip(prior).map(|(original, output)| FormatResult {
        original,
        output,
        stdout: join_streams(ran.iter().map(|r| r.stdout.as_str())),
        stderr: join_streams(ran.iter().map(|r| r.stderr.as_str())),
        formatter_name: ran
            .iter()
            .map(|r| r.formatter_name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        skipped: false,
    });

    ChainOutcome {
        batch,
        units: units.iter().map(|u| u.address().clone()).collect(),
        stages,
        result,
        failure,
    }
}

/// Splits units into batches and runs one chain per batch, concurrently.
pub async fn run_batches(
    units: &[BuildUnit],
    settings: &FmtSettings,
    collaborators: &Collaborators<'_>,
) -> Vec<ChainOutcome> {
    let mut sorted: Vec<&BuildUnit> = units.iter().collect();
    sorted.sort_by(|a, b| a.address().cmp(b.address()));
    sorted.dedup_by(|a, b| a.address() == b.address());
    let sorted: Vec<BuildUnit> = sorted.into_iter().cloned().collect();

    let batches: Vec<&[BuildUnit]> = sorted.chunks(settings.batch_size()).collect();
    info!(
        units = sorted.len(),
        batches = batches.len(),
        "running formatter chains"
    );

    join_all(
        batches
            .into_iter()
            .enumerate()
            .map(|(i, batch)| run_chain(i, batch, settings, collaborators)),
    )
    .await
}

/// The engine error that stopped a chain, when it was not the tool itself.
pub fn engine_error(outcome: &ChainOutcome) -> Option<&EngineError> {
    match outcome.failure.as_ref().map(|f| &f.error) {
        Some(StageError::Engine(e)) => Some(e),
        _ => None,
    }
}
