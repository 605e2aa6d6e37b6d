//! Per-formatter options, resolved once from user input and registration defaults.

use crate::formatters::FormatterMeta;
use camino::Utf8PathBuf;
use fmtchain_types::{ConstraintParseError, RuntimeConstraints};
use serde::Deserialize;

/// User-supplied options for one formatter; every field may be left unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatterOptionsInput {
    pub skip: Option<bool>,
    pub args: Option<Vec<String>>,
    pub config: Option<Utf8PathBuf>,
    pub config_discovery: Option<bool>,
    pub interpreter_constraints: Option<Vec<String>>,
    /// Requirement string for the tool, e.g. `black==23.1.0`.
    pub version: Option<String>,
}

impl FormatterOptionsInput {
    /// `other` wins wherever it sets a value.
    pub fn overlay(&self, other: &FormatterOptionsInput) -> FormatterOptionsInput {
        FormatterOptionsInput {
            skip: other.skip.or(self.skip),
            args: other.args.clone().or_else(|| self.args.clone()),
            config: other.config.clone().or_else(|| self.config.clone()),
            config_discovery: other.config_discovery.or(self.config_discovery),
            interpreter_constraints: other
                .interpreter_constraints
                .clone()
                .or_else(|| self.interpreter_constraints.clone()),
            version: other.version.clone().or_else(|| self.version.clone()),
        }
    }
}

/// Constraints the tool runs under, and whether the user left them at the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConstraints {
    pub constraints: RuntimeConstraints,
    pub is_default: bool,
}

/// Fully resolved options. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterOptions {
    pub skip: bool,
    pub args: Vec<String>,
    pub config: Option<Utf8PathBuf>,
    pub config_discovery: bool,
    pub interpreter_constraints: ToolConstraints,
    pub requirements: Vec<String>,
}

impl FormatterOptions {
    pub fn resolve(
        meta: &FormatterMeta,
        input: &FormatterOptionsInput,
    ) -> Result<Self, ConstraintParseError> {
        let interpreter_constraints = match &input.interpreter_constraints {
            Some(explicit) => ToolConstraints {
                constraints: RuntimeConstraints::parse(explicit)?,
                is_default: false,
            },
            None => ToolConstraints {
                constraints: RuntimeConstraints::parse(meta.default_interpreter_constraints)?,
                is_default: true,
            },
        };
        Ok(Self {
            skip: input.skip.unwrap_or(false),
            args: input.args.clone().unwrap_or_default(),
            config: input.config.clone(),
            config_discovery: input.config_discovery.unwrap_or(true),
            interpreter_constraints,
            requirements: vec![
                input
                    .version
                    .clone()
                    .unwrap_or_else(|| meta.default_requirement.to_string()),
            ],
        })
    }
}
