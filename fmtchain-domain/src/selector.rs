use crate::field_set::FieldSet;
use crate::formatters::Formatter;
use fmtchain_types::BuildUnit;
use tracing::debug;

/// Field sets for every unit `formatter` applies to and that has not opted out.
///
/// Ordered by unit address and deduplicated, so downstream digests are stable.
pub fn select(units: &[BuildUnit], formatter: &dyn Formatter) -> Vec<FieldSet> {
    let mut selected: Vec<FieldSet> = units
        .iter()
        .filter(|unit| !formatter.opt_out(unit))
        .filter_map(|unit| FieldSet::create(formatter, unit).ok())
        .collect();
    selected.sort_by(|a, b| a.address().cmp(b.address()));
    selected.dedup_by(|a, b| a.address() == b.address());

    debug!(
        formatter = formatter.name(),
        units = units.len(),
        selected = selected.len(),
        "selected field sets"
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::FormatterRegistry;
    use fmtchain_types::{FormatterId, Language};
    use pretty_assertions::assert_eq;

    fn addresses(field_sets: &[FieldSet]) -> Vec<&str> {
        field_sets.iter().map(|fs| fs.address().as_str()).collect()
    }

    #[test]
    fn excludes_opted_out_and_incapable_units() {
        let registry = FormatterRegistry::new();
        let black = registry.get(FormatterId::Black).unwrap();
        let units = vec![
            BuildUnit::for_file("b.py"),
            BuildUnit::for_file("a.py").skipping(FormatterId::Black),
            BuildUnit::for_file("notes.txt"),
            BuildUnit::new("src:lib"),
            BuildUnit::for_file("c.py").skipping(FormatterId::PyUpgrade),
        ];
        assert_eq!(addresses(&select(&units, black)), vec!["b.py", "c.py"]);
    }

    #[test]
    fn order_is_by_address_and_duplicates_collapse() {
        let registry = FormatterRegistry::new();
        let pyupgrade = registry.get(FormatterId::PyUpgrade).unwrap();
        let units = vec![
            BuildUnit::for_file("z.py"),
            BuildUnit::for_file("a.py"),
            BuildUnit::for_file("z.py"),
            BuildUnit::new("m").with_source("m.py", Language::Python),
        ];
        assert_eq!(addresses(&select(&units, pyupgrade)), vec!["a.py", "m", "z.py"]);
    }

    #[test]
    fn empty_universe_selects_nothing() {
        let registry = FormatterRegistry::new();
        let black = registry.get(FormatterId::Black).unwrap();
        assert!(select(&[], black).is_empty());
    }
}
