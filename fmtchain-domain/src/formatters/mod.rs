use crate::options::FormatterOptions;
use camino::Utf8PathBuf;
use fmtchain_types::process::{ConfigFilesRequest, ToolRequest};
use fmtchain_types::{BuildUnit, Capability, FormatterId, RuntimeConstraints, Version};

mod black;
mod pyupgrade;

/// Which exit codes mean "the tool ran"; anything else is a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodePolicy {
    pub accepted: &'static [i32],
}

impl ExitCodePolicy {
    pub const STRICT: ExitCodePolicy = ExitCodePolicy { accepted: &[0] };

    pub fn accepts(&self, code: i32) -> bool {
        self.accepted.contains(&code)
    }
}

/// Static registration data for a formatter.
#[derive(Debug, Clone, Copy)]
pub struct FormatterMeta {
    pub id: FormatterId,
    pub description: &'static str,
    pub required: Capability,
    /// Whether field sets carry the unit's interpreter constraints.
    pub uses_interpreter_constraints: bool,
    /// Code requiring at least this version must run the tool under a newer runtime than
    /// the tool's default constraints allow for.
    pub runtime_threshold: Option<Version>,
    pub default_interpreter_constraints: &'static [&'static str],
    pub default_requirement: &'static str,
    pub entry_point: &'static str,
    pub exit_codes: ExitCodePolicy,
}

/// The argv pieces a formatter contributes, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatterArgs {
    pub config_flags: Vec<String>,
    pub fixed_flags: Vec<String>,
    pub extra_args: Vec<String>,
}

pub trait Formatter: Send + Sync {
    fn meta(&self) -> FormatterMeta;

    fn name(&self) -> &'static str {
        self.meta().id.name()
    }

    fn opt_out(&self, unit: &BuildUnit) -> bool {
        unit.opts_out_of(self.meta().id)
    }

    /// Config files relevant to sources living in `dirs`.
    fn config_request(
        &self,
        _options: &FormatterOptions,
        _dirs: &[Utf8PathBuf],
    ) -> ConfigFilesRequest {
        ConfigFilesRequest::default()
    }

    fn args(&self, options: &FormatterOptions) -> FormatterArgs;

    fn tool_request(
        &self,
        options: &FormatterOptions,
        interpreter_constraints: RuntimeConstraints,
    ) -> ToolRequest {
        let meta = self.meta();
        ToolRequest {
            tool: meta.id.name().to_string(),
            requirements: options.requirements.clone(),
            entry_point: meta.entry_point.to_string(),
            interpreter_constraints,
        }
    }
}

pub fn builtin_formatters() -> Vec<Box<dyn Formatter>> {
    vec![
        Box::new(pyupgrade::PyUpgradeFormatter),
        Box::new(black::BlackFormatter),
    ]
}

pub fn builtin_formatter_metas() -> Vec<FormatterMeta> {
    builtin_formatters().iter().map(|f| f.meta()).collect()
}

/// Formatters keyed by their stable id, in registration order.
pub struct FormatterRegistry {
    formatters: Vec<Box<dyn Formatter>>,
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatterRegistry {
    pub fn new() -> Self {
        Self::with_formatters(builtin_formatters())
    }

    /// Later registrations with an already registered id are dropped.
    pub fn with_formatters(formatters: Vec<Box<dyn Formatter>>) -> Self {
        let mut kept: Vec<Box<dyn Formatter>> = Vec::with_capacity(formatters.len());
        for f in formatters {
            if kept.iter().all(|k| k.meta().id != f.meta().id) {
                kept.push(f);
            }
        }
        Self { formatters: kept }
    }

    pub fn get(&self, id: FormatterId) -> Option<&dyn Formatter> {
        self.formatters
            .iter()
            .find(|f| f.meta().id == id)
            .map(|f| f.as_ref())
    }

    pub fn by_name(&self, name: &str) -> Option<&dyn Formatter> {
        name.parse::<FormatterId>().ok().and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Formatter> {
        self.formatters.iter().map(|f| f.as_ref())
    }

    pub fn ids(&self) -> Vec<FormatterId> {
        self.iter().map(|f| f.meta().id).collect()
    }
}
