//! Reading input documents (JSON or YAML, chosen by file extension).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Decode `path` as YAML when it ends in `.yaml`/`.yml`, JSON otherwise.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_document(&content, is_yaml(path))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn parse_document<T: DeserializeOwned>(content: &str, yaml: bool) -> Result<T> {
    if yaml {
        Ok(serde_yaml::from_str(content)?)
    } else {
        Ok(serde_json::from_str(content)?)
    }
}
