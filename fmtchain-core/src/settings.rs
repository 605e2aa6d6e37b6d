//! Clap-free settings for the fmt pipeline.

use fmtchain_domain::{
    Formatter, FormatterOptions, FormatterOptionsInput, FormatterRegistry, UnitDefaults,
};
use fmtchain_types::{ConstraintParseError, FormatterId};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Unresolved settings as gathered from config files and flags.
#[derive(Debug, Clone)]
pub struct FmtConfig {
    /// Chain order. Formatters not listed do not run.
    pub order: Vec<FormatterId>,
    pub formatters: BTreeMap<FormatterId, FormatterOptionsInput>,
    pub unit_defaults: UnitDefaults,
    pub batch_size: usize,
    pub check: bool,
    pub timeout: Option<Duration>,
}

impl Default for FmtConfig {
    fn default() -> Self {
        Self {
            order: FormatterId::ALL.to_vec(),
            formatters: BTreeMap::new(),
            unit_defaults: UnitDefaults::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            check: false,
            timeout: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("formatter {0} is not registered")]
    UnknownFormatter(FormatterId),

    #[error("invalid interpreter constraints for {formatter}: {source}")]
    InvalidConstraints {
        formatter: FormatterId,
        #[source]
        source: ConstraintParseError,
    },

    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

struct Stage {
    id: FormatterId,
    options: FormatterOptions,
}

/// Resolved, read-only settings shared by every chain of a run.
pub struct FmtSettings {
    registry: FormatterRegistry,
    stages: Vec<Stage>,
    unit_defaults: UnitDefaults,
    batch_size: usize,
    check: bool,
    timeout: Option<Duration>,
}

impl FmtSettings {
    /// Resolves every stage's options up front.
    pub fn resolve(registry: FormatterRegistry, config: &FmtConfig) -> Result<Self, SettingsError> {
        if config.batch_size == 0 {
            return Err(SettingsError::ZeroBatchSize);
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(config.order.len());
        for &id in &config.order {
            if stages.iter().any(|s| s.id == id) {
                continue;
            }
            let formatter = registry
                .get(id)
                .ok_or(SettingsError::UnknownFormatter(id))?;
            let input = config.formatters.get(&id).cloned().unwrap_or_default();
            let options = FormatterOptions::resolve(&formatter.meta(), &input)
                .map_err(|source| SettingsError::InvalidConstraints {
                    formatter: id,
                    source,
                })?;
            stages.push(Stage { id, options });
        }

        Ok(Self {
            registry,
            stages,
            unit_defaults: config.unit_defaults.clone(),
            batch_size: config.batch_size,
            check: config.check,
            timeout: config.timeout,
        })
    }

    /// Formatters in chain order with their options.
    pub fn stages(&self) -> impl Iterator<Item = (&dyn Formatter, &FormatterOptions)> {
        self.stages
            .iter()
            .filter_map(|s| self.registry.get(s.id).map(|f| (f, &s.options)))
    }

    pub fn options(&self, id: FormatterId) -> Option<&FormatterOptions> {
        self.stages.iter().find(|s| s.id == id).map(|s| &s.options)
    }

    pub fn registry(&self) -> &FormatterRegistry {
        &self.registry
    }

    pub fn unit_defaults(&self) -> &UnitDefaults {
        &self.unit_defaults
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn check(&self) -> bool {
        self.check
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
