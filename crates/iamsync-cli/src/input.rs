//! Reading JSON or YAML input files

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Parse `path` as YAML when its extension says so, JSON otherwise
pub fn read_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    if yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("cannot parse {}", path.display()))
    } else {
        serde_json::from_str(&raw).with_context(|| format!("cannot parse {}", path.display()))
    }
}
