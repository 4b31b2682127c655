//! On-disk cache of extracted caption tracks.
//!
//! Extraction runs the engine over the whole source, so results are kept
//! as converted WebVTT files keyed by (file, track). The map only records
//! where a file was written; a hit whose file has vanished is dropped and
//! extracted again.

use std::io;
use std::path::PathBuf;

use dashmap::DashMap;
use mediagate_common::Result;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

type Key = (String, u32);

pub struct SubtitleCache {
    dir: PathBuf,
    entries: DashMap<Key, PathBuf>,
}

impl SubtitleCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: DashMap::new(),
        }
    }

    /// Cached captions for `(file, track)`, if the backing file still exists.
    pub async fn get(&self, file: &str, track: u32) -> Option<String> {
        let key = (file.to_string(), track);
        let path = self.entries.get(&key)?.clone();

        match tokio::fs::read_to_string(&path).await {
            Ok(captions) => {
                debug!(file = %file, track, "Subtitle cache hit");
                Some(captions)
            }
            Err(e) => {
                debug!(file = %file, track, path = %path.display(), error = %e, "Cached subtitle is gone, re-extracting");
                self.entries.remove(&key);
                None
            }
        }
    }

    /// Store converted captions and record them under `(file, track)`.
    pub async fn insert(&self, file: &str, track: u32, captions: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name_for(file, track));
        tokio::fs::write(&path, captions).await?;
        self.entries.insert((file.to_string(), track), path.clone());
        Ok(path)
    }

    /// Delete every cached file and forget all entries. Returns how many
    /// entries were dropped.
    pub async fn cleanup(&self) -> usize {
        let paths: Vec<PathBuf> = self.entries.iter().map(|e| e.value().clone()).collect();
        self.entries.clear();

        for path in &paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cached subtitle"),
            }
        }
        // Only succeeds when nothing else lives there.
        let _ = tokio::fs::remove_dir(&self.dir).await;

        if !paths.is_empty() {
            info!(count = paths.len(), "Purged subtitle cache");
        }
        paths.len()
    }
}

fn file_name_for(file: &str, track: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hasher.update([0u8]);
    hasher.update(track.to_le_bytes());
    format!("{}.vtt", hex::encode(&hasher.finalize()[..16]))
}
