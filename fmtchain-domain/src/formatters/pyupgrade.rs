use super::{ExitCodePolicy, Formatter, FormatterArgs, FormatterMeta};
use crate::options::FormatterOptions;
use fmtchain_types::{Capability, FormatterId};

/// Upgrades syntax for newer versions of the language.
pub struct PyUpgradeFormatter;

impl Formatter for PyUpgradeFormatter {
    fn meta(&self) -> FormatterMeta {
        FormatterMeta {
            id: FormatterId::PyUpgrade,
            description: "Upgrade syntax for newer versions of Python.",
            required: Capability::PythonSource,
            uses_interpreter_constraints: false,
            runtime_threshold: None,
            default_interpreter_constraints: &["CPython>=3.6"],
            default_requirement: "pyupgrade==2.31.0",
            entry_point: "pyupgrade",
            // pyupgrade exits 1 whenever it rewrote a file.
            exit_codes: ExitCodePolicy { accepted: &[0, 1] },
        }
    }

    fn args(&self, options: &FormatterOptions) -> FormatterArgs {
        FormatterArgs {
            extra_args: options.args.clone(),
            ..FormatterArgs::default()
        }
    }
}
