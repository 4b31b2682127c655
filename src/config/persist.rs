//! Configuration persistence using toml_edit to preserve formatting and comments.

use anyhow::{Context, Result};
use mediagate_remote::RemoteSourceConfig;
use std::path::Path;
use toml_edit::DocumentMut;

/// Update just the remote_sources array of the config file
///
/// A missing file is created with only that array.
pub fn update_remote_sources(path: &Path, sources: &[RemoteSourceConfig]) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file: {:?}", path));
        }
    };

    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    let sources_toml = toml::to_string(&RemoteSourcesWrapper {
        remote_sources: sources.to_vec(),
    })
    .with_context(|| "Failed to serialize remote sources")?;
    let sources_doc: DocumentMut = sources_toml
        .parse()
        .with_context(|| "Failed to parse serialized remote sources")?;

    // Replace the remote_sources array
    match sources_doc.get("remote_sources") {
        Some(item) if !sources.is_empty() => doc["remote_sources"] = item.clone(),
        _ => {
            doc.remove("remote_sources");
        }
    }

    std::fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

#[derive(serde::Serialize)]
struct RemoteSourcesWrapper {
    remote_sources: Vec<RemoteSourceConfig>,
}
