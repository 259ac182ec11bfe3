use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use docfetch_core::Record;
use engine_logging::engine_warn;
use serde_json::Value;

/// Read the worklist. The file must hold a JSON array; entries that are not
/// objects are kept (under a `value` key) so they surface as failed items.
pub fn load(path: &Path) -> anyhow::Result<Vec<Record>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading worklist {}", path.display()))?;
    parse(&raw).with_context(|| format!("parsing worklist {}", path.display()))
}

pub fn parse(raw: &str) -> anyhow::Result<Vec<Record>> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(entries) = value else {
        bail!("worklist must be a JSON array");
    };
    let records = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(record) => record,
            other => {
                engine_warn!("worklist entry #{} is not an object", index);
                let mut record = Record::new();
                record.insert("value".to_string(), other);
                record
            }
        })
        .collect();
    Ok(records)
}
