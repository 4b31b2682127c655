//! Embedded caption extraction.

use std::path::PathBuf;
use std::time::Duration;

use mediagate_common::Result;

use crate::command::ToolCommand;
use crate::input::InputLocator;

/// Remote sources are read end to end, so allow far longer than a probe.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

/// Extract subtitle stream `track` (index among subtitle streams) as SubRip.
///
/// Bitmap tracks fail here with a tool error since ffmpeg cannot render
/// them to text.
pub async fn extract_subtitle(ffmpeg: PathBuf, input: InputLocator, track: u32) -> Result<String> {
    tracing::debug!(input = %input, track, "Extracting subtitle track");

    let (input_arg, pipe) = input.take_pipe();
    let mut cmd = ToolCommand::new(ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error"]);
    if pipe.is_none() {
        cmd.arg("-nostdin");
    }
    cmd.arg("-i")
        .arg(input_arg)
        .args(["-map".to_string(), format!("0:s:{track}")])
        .args(["-f", "srt", "pipe:1"])
        .timeout(EXTRACT_TIMEOUT);

    let output = match pipe {
        Some(stream) => cmd.execute_piped(stream).await?,
        None => cmd.execute().await?,
    };
    Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn passes_track_mapping_and_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("ffmpeg");
        std::fs::write(&engine, "#!/bin/sh\necho \"$@\"\n").unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let out = extract_subtitle(engine, InputLocator::Local("/m/a.mkv".into()), 2)
            .await
            .unwrap();
        assert!(out.contains("-nostdin -i /m/a.mkv -map 0:s:2 -f srt pipe:1"), "{out}");
    }

    #[tokio::test]
    async fn failing_engine_is_tool_error() {
        let err = extract_subtitle(
            PathBuf::from("/nonexistent/ffmpeg"),
            InputLocator::Local("/m/a.mkv".into()),
            0,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, mediagate_common::Error::Tool { .. }));
    }
}
