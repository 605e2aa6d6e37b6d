use camino::Utf8PathBuf;
use fmtchain_domain::FieldSet;
use fmtchain_types::Snapshot;

/// Where a stage gets the files it formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageInput {
    /// First stage of a chain: read the sources.
    Filesystem,
    /// Later stage: the previous stage's output, used verbatim.
    Prior(Snapshot),
}

/// One formatter's work order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    field_sets: Vec<FieldSet>,
    input: StageInput,
    sources: Vec<Utf8PathBuf>,
}

impl FormatRequest {
    pub fn initial(field_sets: Vec<FieldSet>) -> Self {
        let sources = sources_of(&field_sets);
        Self {
            field_sets,
            input: StageInput::Filesystem,
            sources,
        }
    }

    pub fn chained(field_sets: Vec<FieldSet>, prior: Snapshot) -> Self {
        let sources = sources_of(&field_sets);
        Self {
            field_sets,
            input: StageInput::Prior(prior),
            sources,
        }
    }

    /// Also read `paths` when snapshotting, so files only later stages format are part of the
    /// chain from the start.
    pub fn covering(mut self, paths: impl IntoIterator<Item = Utf8PathBuf>) -> Self {
        self.sources.extend(paths);
        self.sources.sort();
        self.sources.dedup();
        self
    }

    pub fn field_sets(&self) -> &[FieldSet] {
        &self.field_sets
    }

    pub fn input(&self) -> &StageInput {
        &self.input
    }

    pub fn prior(&self) -> Option<&Snapshot> {
        match &self.input {
            StageInput::Prior(snapshot) => Some(snapshot),
            StageInput::Filesystem => None,
        }
    }

    /// Paths handed to the source snapshotter.
    pub fn source_paths(&self) -> &[Utf8PathBuf] {
        &self.sources
    }

    /// Files this stage's formatter is pointed at.
    pub fn target_files(&self) -> Vec<Utf8PathBuf> {
        sources_of(&self.field_sets)
    }
}

fn sources_of(field_sets: &[FieldSet]) -> Vec<Utf8PathBuf> {
    let mut out: Vec<Utf8PathBuf> = field_sets.iter().map(|fs| fs.source().clone()).collect();
    out.sort();
    out.dedup();
    out
}
