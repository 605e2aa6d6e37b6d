//! Build units as supplied by the host build graph.

use crate::constraints::RuntimeConstraints;
use crate::formatter::FormatterId;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitAddress(String);

impl UnitAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    #[serde(untagged)]
    Other(String),
}

impl Language {
    /// Guess from a file extension.
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some("py") | Some("pyi") => Language::Python,
            Some(ext) => Language::Other(ext.to_string()),
            None => Language::Other(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceField {
    pub path: Utf8PathBuf,
    pub language: Language,
}

/// An attribute a formatter needs a unit to carry before it may select it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    PythonSource,
}

impl Capability {
    pub fn satisfied_by(self, unit: &BuildUnit) -> bool {
        match self {
            Capability::PythonSource => unit
                .source()
                .is_some_and(|s| s.language == Language::Python),
        }
    }
}

/// An addressable source item. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUnit {
    address: UnitAddress,
    source: Option<SourceField>,
    interpreter_constraints: Option<RuntimeConstraints>,
    skip: BTreeSet<FormatterId>,
}

impl BuildUnit {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: UnitAddress::new(address),
            source: None,
            interpreter_constraints: None,
            skip: BTreeSet::new(),
        }
    }

    /// A unit owning one file, its language guessed from the extension.
    pub fn for_file(path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        let language = Language::from_path(&path);
        Self::new(path.as_str()).with_source(path, language)
    }

    pub fn with_source(mut self, path: impl Into<Utf8PathBuf>, language: Language) -> Self {
        self.source = Some(SourceField {
            path: path.into(),
            language,
        });
        self
    }

    pub fn with_interpreter_constraints(mut self, constraints: RuntimeConstraints) -> Self {
        self.interpreter_constraints = Some(constraints);
        self
    }

    pub fn skipping(mut self, formatter: FormatterId) -> Self {
        self.skip.insert(formatter);
        self
    }

    pub fn address(&self) -> &UnitAddress {
        &self.address
    }

    pub fn source(&self) -> Option<&SourceField> {
        self.source.as_ref()
    }

    pub fn interpreter_constraints(&self) -> Option<&RuntimeConstraints> {
        self.interpreter_constraints.as_ref()
    }

    pub fn opts_out_of(&self, formatter: FormatterId) -> bool {
        self.skip.contains(&formatter)
    }

    pub fn has(&self, capability: Capability) -> bool {
        capability.satisfied_by(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_file_infers_language() {
        let unit = BuildUnit::for_file("src/app/main.py");
        assert_eq!(unit.address().as_str(), "src/app/main.py");
        assert!(unit.has(Capability::PythonSource));

        let unit = BuildUnit::for_file("README.md");
        assert!(!unit.has(Capability::PythonSource));
    }

    #[test]
    fn unit_without_source_lacks_capability() {
        let unit = BuildUnit::new("src:lib");
        assert!(!unit.has(Capability::PythonSource));
    }

    #[test]
    fn skip_flags_are_per_formatter() {
        let unit = BuildUnit::for_file("a.py").skipping(FormatterId::Black);
        assert!(unit.opts_out_of(FormatterId::Black));
        assert!(!unit.opts_out_of(FormatterId::PyUpgrade));
    }
}
