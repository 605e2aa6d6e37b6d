//! Choosing the interpreter constraints a tool runs under.

use crate::field_set::FieldSet;
use crate::options::ToolConstraints;
use fmtchain_types::{RuntimeConstraints, Version};
use tracing::debug;

/// Repository-wide interpreter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDefaults {
    /// Applies to units that declare nothing.
    pub interpreter_constraints: RuntimeConstraints,
    /// Every interpreter version that could exist; used to decide what a constraint requires.
    pub universe: Vec<Version>,
}

impl Default for UnitDefaults {
    fn default() -> Self {
        Self {
            interpreter_constraints: RuntimeConstraints::any(),
            universe: fmtchain_types::constraints::default_universe(),
        }
    }
}

/// Intersection of every field set's constraints, with defaults for undeclared units.
pub fn unit_constraints(field_sets: &[FieldSet], defaults: &UnitDefaults) -> RuntimeConstraints {
    let declared = field_sets.iter().map(|fs| {
        fs.interpreter_constraints()
            .unwrap_or(&defaults.interpreter_constraints)
    });
    RuntimeConstraints::intersect_all(declared)
        .unwrap_or_else(|| defaults.interpreter_constraints.clone())
}

/// Constraints to run the tool under.
///
/// When the tool's constraints were left at their default and the code itself already needs
/// `threshold` or newer, the code's constraints are used so the tool runs on that newer
/// runtime. An explicit tool setting is returned untouched, even if it cannot work.
pub fn resolve_runtime(
    field_sets: &[FieldSet],
    tool: &ToolConstraints,
    threshold: Option<Version>,
    defaults: &UnitDefaults,
) -> RuntimeConstraints {
    let Some(threshold) = threshold else {
        return tool.constraints.clone();
    };
    if !tool.is_default {
        debug!(
            constraints = %tool.constraints,
            "using explicitly configured tool constraints"
        );
        return tool.constraints.clone();
    }

    let units = unit_constraints(field_sets, defaults);
    if units.requires_at_least(threshold, &defaults.universe) {
        debug!(
            constraints = %units,
            %threshold,
            "code requires a newer runtime than the tool default; running the tool under it"
        );
        units
    } else {
        tool.constraints.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::FormatterRegistry;
    use crate::selector::select;
    use fmtchain_types::{BuildUnit, FormatterId};
    use pretty_assertions::assert_eq;

    fn ic(s: &str) -> RuntimeConstraints {
        RuntimeConstraints::parse([s]).unwrap()
    }

    fn black_field_sets(units: &[BuildUnit]) -> Vec<FieldSet> {
        let registry = FormatterRegistry::new();
        select(units, registry.get(FormatterId::Black).unwrap())
    }

    fn tool(constraints: &str, is_default: bool) -> ToolConstraints {
        ToolConstraints {
            constraints: ic(constraints),
            is_default,
        }
    }

    #[test]
    fn default_tool_constraints_follow_newer_code() {
        let field_sets = black_field_sets(&[
            BuildUnit::for_file("a.py").with_interpreter_constraints(ic(">=3.8")),
            BuildUnit::for_file("b.py").with_interpreter_constraints(ic(">=3.6")),
        ]);
        let resolved = resolve_runtime(
            &field_sets,
            &tool(">=3.6", true),
            Some(Version::new(3, 8)),
            &UnitDefaults::default(),
        );
        assert!(!resolved.contains(Version::new(3, 7)));
        assert!(resolved.contains(Version::new(3, 8)));
        assert_eq!(resolved, ic(">=3.6").intersect(&ic(">=3.8")));
        assert_eq!(resolved.to_string(), "CPython>=3.8");
    }

    #[test]
    fn excluding_one_patch_release_does_not_raise_the_runtime() {
        let field_sets = black_field_sets(&[
            BuildUnit::for_file("a.py").with_interpreter_constraints(ic(">=3.7,!=3.7.0")),
        ]);
        let resolved = resolve_runtime(
            &field_sets,
            &tool(">=3.6,<4", true),
            Some(Version::new(3, 8)),
            &UnitDefaults::default(),
        );
        assert_eq!(resolved, ic(">=3.6,<4"));
        assert!(resolved.contains(Version::new(3, 7).with_patch(0)));
    }

    #[test]
    fn default_tool_constraints_kept_for_older_code() {
        let field_sets = black_field_sets(&[
            BuildUnit::for_file("a.py").with_interpreter_constraints(ic(">=3.6")),
        ]);
        let resolved = resolve_runtime(
            &field_sets,
            &tool(">=3.6,<4", true),
            Some(Version::new(3, 8)),
            &UnitDefaults::default(),
        );
        assert_eq!(resolved, ic(">=3.6,<4"));
    }

    #[test]
    fn explicit_tool_constraints_always_win() {
        let field_sets = black_field_sets(&[
            BuildUnit::for_file("a.py").with_interpreter_constraints(ic(">=3.9")),
        ]);
        let resolved = resolve_runtime(
            &field_sets,
            &tool("==3.7", false),
            Some(Version::new(3, 8)),
            &UnitDefaults::default(),
        );
        // Infeasible for the code, but never silently replaced.
        assert_eq!(resolved, ic("==3.7"));
    }

    #[test]
    fn no_threshold_means_tool_constraints() {
        let field_sets = black_field_sets(&[
            BuildUnit::for_file("a.py").with_interpreter_constraints(ic(">=3.11")),
        ]);
        let resolved =
            resolve_runtime(&field_sets, &tool(">=3.6", true), None, &UnitDefaults::default());
        assert_eq!(resolved, ic(">=3.6"));
    }

    #[test]
    fn undeclared_units_use_the_repository_default() {
        let defaults = UnitDefaults {
            interpreter_constraints: ic(">=3.9"),
            ..UnitDefaults::default()
        };
        let field_sets = black_field_sets(&[BuildUnit::for_file("a.py")]);
        assert_eq!(unit_constraints(&field_sets, &defaults), ic(">=3.9"));
        let resolved = resolve_runtime(
            &field_sets,
            &tool(">=3.6", true),
            Some(Version::new(3, 8)),
            &defaults,
        );
        assert_eq!(resolved, ic(">=3.9"));
    }

    #[test]
    fn no_field_sets_fall_back_to_defaults() {
        let defaults = UnitDefaults::default();
        assert_eq!(unit_constraints(&[], &defaults), RuntimeConstraints::any());
    }
}
