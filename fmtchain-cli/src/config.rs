//! Configuration file loading for fmtchain.
//!
//! Discovers and loads `fmtchain.toml` from the repository root, expands unit declarations
//! into build units and merges CLI overrides on top (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fmtchain_core::FmtConfig;
use fmtchain_core::adapters::Interpreter;
use fmtchain_core::settings::DEFAULT_BATCH_SIZE;
use fmtchain_domain::{FormatterOptionsInput, UnitDefaults};
use fmtchain_types::constraints::default_universe;
use fmtchain_types::{BuildUnit, FormatterId, Language, RuntimeConstraints, Version};
use fs_err as fs;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "fmtchain.toml";

/// Sources picked up when no `[[units]]` are declared.
const DEFAULT_SOURCE_GLOBS: &[&str] = &["**/*.py", "**/*.pyi"];

/// Top-level configuration from fmtchain.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FmtchainConfig {
    pub python: PythonConfig,
    pub fmt: FmtSection,
    pub formatters: BTreeMap<FormatterId, FormatterOptionsInput>,
    pub units: Vec<UnitConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PythonConfig {
    /// Constraints for units that declare none.
    pub interpreter_constraints: Option<RuntimeConstraints>,

    /// Every interpreter version worth considering.
    pub universe: Option<Vec<Version>>,

    /// Interpreters to run tools with. When empty, `search` is probed instead.
    pub interpreters: Vec<InterpreterConfig>,

    /// Executable names probed for `--version` when no interpreters are listed.
    pub search: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpreterConfig {
    pub path: Utf8PathBuf,
    pub version: Version,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FmtSection {
    /// Chain order.
    pub order: Option<Vec<FormatterId>>,
    pub batch_size: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// A group of sources sharing interpreter constraints and opt-outs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitConfig {
    /// Address prefix; each matched file becomes `<address>:<file>`.
    pub address: Option<String>,
    /// Glob patterns relative to the repository root.
    pub sources: Vec<String>,
    #[serde(default)]
    pub interpreter_constraints: Option<RuntimeConstraints>,
    /// Formatters these units opt out of.
    #[serde(default)]
    pub skip: Vec<FormatterId>,
}

/// Discover the fmtchain.toml config file.
pub fn discover_config(repo_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = repo_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<FmtchainConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<FmtchainConfig> {
    let config: FmtchainConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load the given config, or the repo root's, or defaults when there is none.
pub fn load_or_default(
    repo_root: &Utf8Path,
    explicit: Option<&Utf8Path>,
) -> anyhow::Result<FmtchainConfig> {
    match explicit {
        Some(path) => load_config(path),
        None => match discover_config(repo_root) {
            Some(path) => load_config(&path),
            None => Ok(FmtchainConfig::default()),
        },
    }
}

/// CLI flags that override the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub only: Vec<FormatterId>,
    pub skip: Vec<FormatterId>,
    pub args: Vec<(FormatterId, Vec<String>)>,
    pub check: bool,
    pub batch_size: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl FmtchainConfig {
    pub fn unit_defaults(&self) -> UnitDefaults {
        let base = UnitDefaults::default();
        UnitDefaults {
            interpreter_constraints: self
                .python
                .interpreter_constraints
                .clone()
                .unwrap_or(base.interpreter_constraints),
            universe: self.python.universe.clone().unwrap_or_else(default_universe),
        }
    }

    /// Pipeline settings with CLI overrides applied.
    pub fn fmt_config(&self, cli: &CliOverrides) -> FmtConfig {
        let mut order = self
            .fmt
            .order
            .clone()
            .unwrap_or_else(|| FormatterId::ALL.to_vec());
        if !cli.only.is_empty() {
            order.retain(|id| cli.only.contains(id));
        }

        let mut formatters = self.formatters.clone();
        for id in &cli.skip {
            let entry = formatters.entry(*id).or_default();
            *entry = entry.overlay(&FormatterOptionsInput {
                skip: Some(true),
                ..Default::default()
            });
        }
        for (id, args) in &cli.args {
            let entry = formatters.entry(*id).or_default();
            *entry = entry.overlay(&FormatterOptionsInput {
                args: Some(args.clone()),
                ..Default::default()
            });
        }

        FmtConfig {
            order,
            formatters,
            unit_defaults: self.unit_defaults(),
            batch_size: cli
                .batch_size
                .or(self.fmt.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            check: cli.check,
            timeout: cli
                .timeout_secs
                .or(self.fmt.timeout_secs)
                .map(Duration::from_secs),
        }
    }

    pub fn interpreters(&self) -> Vec<Interpreter> {
        self.python
            .interpreters
            .iter()
            .map(|i| Interpreter {
                path: i.path.clone(),
                version: i.version,
            })
            .collect()
    }

    /// Expands unit declarations against the files under `repo_root`.
    ///
    /// A file matched by several declarations belongs to the first one.
    pub fn build_units(&self, repo_root: &Utf8Path) -> anyhow::Result<Vec<BuildUnit>> {
        let mut seen: BTreeSet<Utf8PathBuf> = BTreeSet::new();
        let mut units = Vec::new();

        if self.units.is_empty() {
            let patterns: Vec<String> =
                DEFAULT_SOURCE_GLOBS.iter().map(|s| s.to_string()).collect();
            for file in expand_globs(repo_root, &patterns)? {
                if seen.insert(file.clone()) {
                    units.push(BuildUnit::for_file(file));
                }
            }
            return Ok(units);
        }

        for decl in &self.units {
            for file in expand_globs(repo_root, &decl.sources)? {
                if !seen.insert(file.clone()) {
                    debug!(file = %file, "already claimed by an earlier unit declaration");
                    continue;
                }
                let address = match &decl.address {
                    Some(prefix) => format!("{}:{}", prefix, file),
                    None => file.to_string(),
                };
                let language = Language::from_path(&file);
                let mut unit = BuildUnit::new(address).with_source(file, language);
                if let Some(ic) = &decl.interpreter_constraints {
                    unit = unit.with_interpreter_constraints(ic.clone());
                }
                for id in &decl.skip {
                    unit = unit.skipping(*id);
                }
                units.push(unit);
            }
        }
        Ok(units)
    }
}

/// Matches `patterns` under `repo_root`, returning sorted repo-relative paths. Files inside
/// hidden directories are ignored.
fn expand_globs(repo_root: &Utf8Path, patterns: &[String]) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let mut out = BTreeSet::new();
    for pattern in patterns {
        let full = repo_root.join(pattern);
        let entries =
            glob::glob(full.as_str()).with_context(|| format!("invalid glob pattern {}", pattern))?;
        for entry in entries {
            let path = entry.with_context(|| format!("expand {}", pattern))?;
            if !path.is_file() {
                continue;
            }
            let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                continue;
            };
            let Ok(relative) = path.strip_prefix(repo_root) else {
                continue;
            };
            if relative.components().any(|c| c.as_str().starts_with('.')) {
                continue;
            }
            out.insert(relative.to_path_buf());
        }
    }
    Ok(out.into_iter().collect())
}

/// Parses `NAME=ARGS` pass-through flags; ARGS is split on whitespace.
pub fn parse_cli_args(items: &[String]) -> anyhow::Result<Vec<(FormatterId, Vec<String>)>> {
    let mut out = Vec::new();
    for item in items {
        let Some((name, args)) = item.split_once('=') else {
            anyhow::bail!("invalid --args '{}': expected NAME=ARGS", item);
        };
        let id: FormatterId = name
            .trim()
            .parse()
            .with_context(|| format!("invalid --args '{}'", item))?;
        out.push((id, args.split_whitespace().map(str::to_string).collect()));
    }
    Ok(out)
}

pub fn parse_formatter_names(names: &[String]) -> anyhow::Result<Vec<FormatterId>> {
    names
        .iter()
        .map(|n| n.parse::<FormatterId>().map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const EXAMPLE: &str = r#"
[python]
interpreter_constraints = ["CPython>=3.7"]
universe = ["3.7", "3.8", "3.9", "3.10"]
interpreters = [
  { path = "/usr/bin/python3.9", version = "3.9" },
]

[fmt]
order = ["black"]
batch_size = 16
timeout_secs = 300

[formatters.black]
args = ["--line-length", "100"]
version = "black==23.1.0"

[formatters.pyupgrade]
skip = true

[[units]]
address = "app"
sources = ["src/**/*.py"]
interpreter_constraints = ["CPython>=3.8"]
skip = ["pyupgrade"]
"#;

    #[test]
    fn test_parse_example_config() {
        let config = parse_config(EXAMPLE).expect("parse");
        assert_eq!(config.fmt.order, Some(vec![FormatterId::Black]));
        assert_eq!(config.fmt.batch_size, Some(16));
        assert_eq!(config.python.interpreters[0].version, Version::new(3, 9));
        assert_eq!(
            config.formatters[&FormatterId::Black].version.as_deref(),
            Some("black==23.1.0")
        );
        assert_eq!(config.units[0].skip, vec![FormatterId::PyUpgrade]);

        let defaults = config.unit_defaults();
        assert_eq!(defaults.universe.len(), 4);
        assert_eq!(defaults.interpreter_constraints.to_string(), "CPython>=3.7");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").expect("parse");
        let fmt = config.fmt_config(&CliOverrides::default());
        assert_eq!(fmt.order, FormatterId::ALL.to_vec());
        assert_eq!(fmt.batch_size, DEFAULT_BATCH_SIZE);
        assert!(fmt.timeout.is_none());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(parse_config("[fmt]\nbatchsize = 3\n").is_err());
        assert!(parse_config("[formatters.rustfmt]\nskip = true\n").is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = parse_config(EXAMPLE).expect("parse");
        let cli = CliOverrides {
            only: vec![],
            skip: vec![FormatterId::Black],
            args: vec![(FormatterId::Black, vec!["--fast".into()])],
            check: true,
            batch_size: Some(2),
            timeout_secs: None,
        };
        let fmt = config.fmt_config(&cli);
        let black = &fmt.formatters[&FormatterId::Black];
        assert_eq!(black.skip, Some(true));
        assert_eq!(black.args, Some(vec!["--fast".to_string()]));
        assert_eq!(black.version.as_deref(), Some("black==23.1.0"));
        assert_eq!(fmt.batch_size, 2);
        assert_eq!(fmt.timeout, Some(Duration::from_secs(300)));
        assert!(fmt.check);
    }

    #[test]
    fn test_only_keeps_configured_order() {
        let config = FmtchainConfig::default();
        let cli = CliOverrides {
            only: vec![FormatterId::Black, FormatterId::PyUpgrade],
            ..Default::default()
        };
        assert_eq!(config.fmt_config(&cli).order, FormatterId::ALL.to_vec());

        let cli = CliOverrides {
            only: vec![FormatterId::Black],
            ..Default::default()
        };
        assert_eq!(config.fmt_config(&cli).order, vec![FormatterId::Black]);
    }

    #[test]
    fn test_parse_cli_args() {
        let parsed = parse_cli_args(&["black=--line-length 79 --fast".to_string()]).expect("parse");
        assert_eq!(
            parsed,
            vec![(
                FormatterId::Black,
                vec!["--line-length".to_string(), "79".to_string(), "--fast".to_string()]
            )]
        );
        assert!(parse_cli_args(&["black".to_string()]).is_err());
        assert!(parse_cli_args(&["yapf=-i".to_string()]).is_err());
    }

    fn write(root: &Utf8Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn test_default_units_cover_python_files() {
        let td = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf8");
        write(&root, "a.py", "");
        write(&root, "pkg/b.pyi", "");
        write(&root, "README.md", "");
        write(&root, ".venv/lib/c.py", "");

        let units = FmtchainConfig::default().build_units(&root).expect("units");
        let addresses: Vec<&str> = units.iter().map(|u| u.address().as_str()).collect();
        assert_eq!(addresses, vec!["a.py", "pkg/b.pyi"]);
    }

    #[test]
    fn test_declared_units_carry_constraints_and_opt_outs() {
        let td = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf8");
        write(&root, "src/app/main.py", "");
        write(&root, "scripts/tool.py", "");

        let config = parse_config(
            r#"
[[units]]
address = "app"
sources = ["src/**/*.py"]
interpreter_constraints = ["CPython>=3.8"]
skip = ["pyupgrade"]

[[units]]
sources = ["**/*.py"]
"#,
        )
        .expect("parse");
        let units = config.build_units(&root).expect("units");
        assert_eq!(units.len(), 2);

        let app = &units[0];
        assert_eq!(app.address().as_str(), "app:src/app/main.py");
        assert!(app.opts_out_of(FormatterId::PyUpgrade));
        assert_eq!(
            app.interpreter_constraints().map(|c| c.to_string()),
            Some("CPython>=3.8".to_string())
        );

        let script = &units[1];
        assert_eq!(script.address().as_str(), "scripts/tool.py");
        assert!(script.interpreter_constraints().is_none());
    }
}
