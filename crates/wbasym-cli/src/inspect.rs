//! `wbasym inspect`: describe a written tree.

use anyhow::{Context, Result};
use std::path::Path;

use wbasym_analysis::run::META_KEY_HISTOGRAMS;
use wbasym_event::{EventTreeReader, Histo1D, META_KEY_SCHEMA_VERSION, ReadMode};

pub fn cmd_inspect(input: &Path) -> Result<()> {
    let reader = EventTreeReader::open(input, ReadMode::Lenient)
        .with_context(|| format!("failed to open {}", input.display()))?;

    let histograms: Vec<serde_json::Value> = match reader.metadata().get(META_KEY_HISTOGRAMS) {
        Some(json) => {
            let hists: Vec<Histo1D> = serde_json::from_str(json)
                .with_context(|| format!("malformed {META_KEY_HISTOGRAMS} metadata"))?;
            hists
                .iter()
                .map(|h| {
                    serde_json::json!({
                        "name": h.name,
                        "n_bins": h.n_bins(),
                        "entries": h.entries,
                        "integral": h.integral(),
                    })
                })
                .collect()
        }
        None => Vec::new(),
    };

    let metadata: serde_json::Map<String, serde_json::Value> = reader
        .metadata()
        .iter()
        .filter(|(k, _)| k.as_str() != META_KEY_HISTOGRAMS)
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();

    let out = serde_json::json!({
        "path": input.display().to_string(),
        "tree_name": reader.tree_name(),
        "schema_version": reader.metadata().get(META_KEY_SCHEMA_VERSION),
        "entries": reader.entries(),
        "columns": reader.column_names(),
        "metadata": metadata,
        "histograms": histograms,
    });
    crate::write_json(None, &out)
}
