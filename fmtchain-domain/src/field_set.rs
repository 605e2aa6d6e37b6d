use crate::formatters::Formatter;
use camino::Utf8PathBuf;
use fmtchain_types::{BuildUnit, Capability, FormatterId, RuntimeConstraints, UnitAddress};
use thiserror::Error;

/// Constructing a field set for a unit that lacks the formatter's required capability.
///
/// The selector never does this; seeing it means a caller bypassed selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{formatter} cannot select {address}: missing {capability:?}")]
pub struct SelectionError {
    pub formatter: FormatterId,
    pub address: UnitAddress,
    pub capability: Capability,
}

/// The attributes of one unit that one formatter consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSet {
    formatter: FormatterId,
    address: UnitAddress,
    source: Utf8PathBuf,
    interpreter_constraints: Option<RuntimeConstraints>,
}

impl FieldSet {
    pub fn create(formatter: &dyn Formatter, unit: &BuildUnit) -> Result<Self, SelectionError> {
        let meta = formatter.meta();
        let missing = || SelectionError {
            formatter: meta.id,
            address: unit.address().clone(),
            capability: meta.required,
        };
        if !unit.has(meta.required) {
            return Err(missing());
        }
        let source = unit.source().ok_or_else(missing)?;
        Ok(Self {
            formatter: meta.id,
            address: unit.address().clone(),
            source: source.path.clone(),
            interpreter_constraints: if meta.uses_interpreter_constraints {
                unit.interpreter_constraints().cloned()
            } else {
                None
            },
        })
    }

    pub fn formatter(&self) -> FormatterId {
        self.formatter
    }

    pub fn address(&self) -> &UnitAddress {
        &self.address
    }

    pub fn source(&self) -> &Utf8PathBuf {
        &self.source
    }

    pub fn interpreter_constraints(&self) -> Option<&RuntimeConstraints> {
        self.interpreter_constraints.as_ref()
    }
}
