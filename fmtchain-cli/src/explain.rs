//! Formatter explanations for the `fmtchain explain` and `list-formatters` commands.

use fmtchain_domain::{FormatterMeta, FormatterRegistry};
use fmtchain_types::FormatterId;

pub fn lookup(registry: &FormatterRegistry, name: &str) -> Option<FormatterMeta> {
    registry.by_name(name).map(|f| f.meta())
}

pub fn list_names(registry: &FormatterRegistry) -> Vec<&'static str> {
    registry.ids().into_iter().map(FormatterId::name).collect()
}

/// How the runtime the formatter runs under is chosen.
pub fn runtime_note(meta: &FormatterMeta) -> String {
    match meta.runtime_threshold {
        Some(threshold) => format!(
            "Runs under {} by default. When the code being formatted requires Python {} or \
             newer and the tool's interpreter constraints were not set explicitly, the tool \
             runs under the code's own constraints instead.",
            meta.default_interpreter_constraints.join(" OR "),
            threshold
        ),
        None => format!(
            "Runs under {} unless interpreter_constraints is set.",
            meta.default_interpreter_constraints.join(" OR ")
        ),
    }
}

pub fn exit_code_note(meta: &FormatterMeta) -> String {
    let codes: Vec<String> = meta.exit_codes.accepted.iter().map(|c| c.to_string()).collect();
    format!(
        "Exit codes {} mean the tool ran; any other code fails the chain.",
        codes.join(", ")
    )
}

pub fn config_note(id: FormatterId) -> &'static str {
    match id {
        FormatterId::Black => {
            "`config` is passed as `--config`. With config_discovery on, every pyproject.toml \
             containing [tool.black] in the root or in a directory of a formatted file is \
             made available to the tool."
        }
        FormatterId::PyUpgrade => "Takes no configuration files; use `args` instead.",
    }
}
