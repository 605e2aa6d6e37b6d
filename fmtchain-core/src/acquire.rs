//! Gathering everything a stage's process needs as input.

use crate::error::EngineError;
use crate::ports::Collaborators;
use crate::request::FormatRequest;
use fmtchain_domain::{Formatter, FormatterOptions};
use fmtchain_types::process::ToolHandle;
use fmtchain_types::{Digest, RuntimeConstraints, Snapshot};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Acquired {
    pub tool: ToolHandle,
    /// The files the stage formats: fresh from the sources, or the prior stage's output.
    pub snapshot: Snapshot,
    /// `snapshot` merged with the discovered config files.
    pub input_digest: Digest,
}

pub async fn acquire(
    request: &FormatRequest,
    formatter: &dyn Formatter,
    options: &FormatterOptions,
    runtime: RuntimeConstraints,
    collaborators: &Collaborators<'_>,
) -> Result<Acquired, EngineError> {
    let tool_request = formatter.tool_request(options, runtime);

    let (tool, fresh) = tokio::join!(
        collaborators.tools.materialize(&tool_request),
        collaborators.sources.snapshot_sources(request.source_paths()),
    );
    let tool = tool?;

    let snapshot = match request.prior() {
        Some(prior) => {
            if let Err(e) = &fresh {
                debug!(error = %e, "source snapshot failed; using the prior snapshot");
            }
            prior.clone()
        }
        None => fresh?,
    };

    let config_request = formatter.config_request(options, &snapshot.dirs);
    let config = collaborators.config.discover(&config_request).await;

    let input_digest = collaborators
        .store
        .merge(&[snapshot.digest.clone(), config.snapshot.digest.clone()])
        .await?;

    debug!(
        formatter = formatter.name(),
        files = snapshot.files.len(),
        config_files = config.snapshot.files.len(),
        input = %input_digest,
        "acquired stage inputs"
    );

    Ok(Acquired {
        tool,
        snapshot,
        input_digest,
    })
}
