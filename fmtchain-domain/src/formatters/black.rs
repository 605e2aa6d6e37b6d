use super::{ExitCodePolicy, Formatter, FormatterArgs, FormatterMeta};
use crate::options::FormatterOptions;
use camino::Utf8PathBuf;
use fmtchain_types::process::{CONCURRENCY_PLACEHOLDER, ConfigFilesRequest};
use fmtchain_types::{Capability, FormatterId, Version};

/// Black, the uncompromising Python code formatter.
pub struct BlackFormatter;

impl BlackFormatter {
    const CONFIG_FILE: &'static str = "pyproject.toml";
    const CONFIG_SECTION: &'static [u8] = b"[tool.black]";
}

impl Formatter for BlackFormatter {
    fn meta(&self) -> FormatterMeta {
        FormatterMeta {
            id: FormatterId::Black,
            description: "The uncompromising Python code formatter.",
            required: Capability::PythonSource,
            uses_interpreter_constraints: true,
            // Black parses older syntax through typed-ast, which does not understand 3.8+.
            runtime_threshold: Some(Version::new(3, 8)),
            default_interpreter_constraints: &["CPython>=3.6,<4"],
            default_requirement: "black==22.1.0",
            entry_point: "black",
            exit_codes: ExitCodePolicy::STRICT,
        }
    }

    fn config_request(
        &self,
        options: &FormatterOptions,
        dirs: &[Utf8PathBuf],
    ) -> ConfigFilesRequest {
        let check_content = std::iter::once(Utf8PathBuf::new())
            .chain(dirs.iter().cloned())
            .map(|dir| (dir.join(Self::CONFIG_FILE), Self::CONFIG_SECTION.to_vec()))
            .collect();
        ConfigFilesRequest {
            specified: options.config.clone(),
            discovery: options.config_discovery,
            check_existence: Vec::new(),
            check_content,
        }
    }

    fn args(&self, options: &FormatterOptions) -> FormatterArgs {
        FormatterArgs {
            config_flags: options
                .config
                .iter()
                .flat_map(|c| ["--config".to_string(), c.to_string()])
                .collect(),
            fixed_flags: vec!["-W".to_string(), CONCURRENCY_PLACEHOLDER.to_string()],
            extra_args: options.args.clone(),
        }
    }
}
