use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Load a label table: one class name per line, index = line number.
///
/// Lines are trimmed. Blank lines inside the table are kept (they hold a class
/// slot), trailing blank lines are not. An empty table is an error; the
/// pipeline cannot run without labels.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read label table {}", path.display()))?;
    let labels = parse_labels(&raw);
    if labels.is_empty() {
        return Err(anyhow!("label table {} is empty", path.display()));
    }
    log::info!("loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

pub fn parse_labels(raw: &str) -> Vec<String> {
    let mut labels: Vec<String> = raw.lines().map(|line| line.trim().to_string()).collect();
    while labels.last().is_some_and(|label| label.is_empty()) {
        labels.pop();
    }
    labels
}
