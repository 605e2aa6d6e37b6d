use crate::error::EngineError;
use crate::ports::ContentStore;
use crate::sandbox::SANDBOX_PREFIX;
use fmtchain_types::process::RawProcessResult;
use fmtchain_types::{FormatResult, Snapshot};
use regex::Regex;
use std::sync::LazyLock;

static SANDBOX_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"[^\s'"=:]*{SANDBOX_PREFIX}[A-Za-z0-9_]+/"#)).expect("valid regex")
});

/// Removes sandbox directory prefixes so paths read as workspace-relative.
pub fn strip_sandbox_paths(text: &str) -> String {
    SANDBOX_PATH.replace_all(text, "").into_owned()
}

/// Lossy UTF-8 with sandbox paths scrubbed.
pub fn clean_stream(bytes: &[u8]) -> String {
    strip_sandbox_paths(&String::from_utf8_lossy(bytes))
}

/// Packages a finished process as a stage result.
pub async fn report(
    raw: &RawProcessResult,
    original: Snapshot,
    formatter_name: &str,
    store: &dyn ContentStore,
) -> Result<FormatResult, EngineError> {
    let output = store.snapshot(&raw.output_digest).await?;
    Ok(FormatResult {
        original,
        output,
        stdout: clean_stream(&raw.stdout),
        stderr: clean_stream(&raw.stderr),
        formatter_name: formatter_name.to_string(),
        skipped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryContentStore;
    use camino::Utf8PathBuf;
    use fmtchain_types::FileSet;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_absolute_sandbox_prefixes() {
        let text = "reformatted /tmp/fmtchain-sandbox-a1B2c3/pkg/f.py\nAll done!";
        assert_eq!(strip_sandbox_paths(text), "reformatted pkg/f.py\nAll done!");
    }

    #[test]
    fn strips_every_occurrence_and_leaves_the_rest() {
        let text = "error: cannot format /private/var/folders/xy/fmtchain-sandbox-Q9/a.py: bad\n\
                    would reformat /tmp/fmtchain-sandbox-Z/b.py";
        assert_eq!(
            strip_sandbox_paths(text),
            "error: cannot format a.py: bad\nwould reformat b.py"
        );
        assert_eq!(strip_sandbox_paths("/tmp/other/f.py"), "/tmp/other/f.py");
    }

    #[tokio::test]
    async fn report_decodes_lossily_and_resolves_output() {
        let store = InMemoryContentStore::new();
        let mut files = FileSet::new();
        files.insert(Utf8PathBuf::from("f.py"), b"x = 1\n".to_vec());
        let output = store.store(files);

        let raw = RawProcessResult {
            exit_code: 0,
            stdout: b"reformatted /tmp/fmtchain-sandbox-abc/f.py \xff".to_vec(),
            stderr: Vec::new(),
            output_digest: output.digest.clone(),
        };
        let result = report(&raw, Snapshot::empty(), "black", &store)
            .await
            .expect("report");

        assert_eq!(result.stdout, "reformatted f.py \u{fffd}");
        assert_eq!(result.output, output);
        assert_eq!(result.formatter_name, "black");
        assert!(!result.skipped);
        assert!(result.did_change());
    }
}
