//! Caption payload decoding.
//!
//! Subtitle services hand out zip archives, gzip blobs or plain files,
//! usually without a trustworthy content type. Each decoder is tried in
//! turn and any failure falls through to the next.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use mediagate_common::paths::is_subtitle_name;
use tracing::debug;

/// Turn a downloaded payload into caption text: zip, then gzip, then raw.
pub fn decode_payload(bytes: &[u8]) -> String {
    if let Some(text) = from_zip(bytes) {
        return text;
    }
    if let Some(text) = from_gzip(bytes) {
        return text;
    }
    decode_text(bytes)
}

fn from_zip(bytes: &[u8]) -> Option<String> {
    let mut archive = match zip::ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            debug!(error = %e, "Payload is not a zip archive");
            return None;
        }
    };

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let chosen = names
        .iter()
        .find(|n| is_subtitle_name(n))
        .or_else(|| names.iter().find(|n| !n.ends_with('/')))?
        .clone();

    let mut entry = archive.by_name(&chosen).ok()?;
    let mut data = Vec::new();
    if let Err(e) = entry.read_to_end(&mut data) {
        debug!(entry = %chosen, error = %e, "Failed to read zip entry");
        return None;
    }
    debug!(entry = %chosen, bytes = data.len(), "Extracted caption from zip");
    Some(decode_text(&data))
}

fn from_gzip(bytes: &[u8]) -> Option<String> {
    let mut data = Vec::new();
    match GzDecoder::new(bytes).read_to_end(&mut data) {
        Ok(_) if !data.is_empty() => Some(decode_text(&data)),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Payload is not gzip");
            None
        }
    }
}

/// UTF-8 when valid, otherwise Latin-1, which is what most legacy SubRip
/// files are.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
