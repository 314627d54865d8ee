//! Boundary around the external ffmpeg tool: duration probing and
//! single-frame extraction. Nothing else in the crate talks to ffmpeg.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// The `Duration: HH:MM:SS.xx` line from ffmpeg's stream info block.
static RE_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2})\.\d+").unwrap());

/// Scrape the total duration of `path`, in whole seconds, from ffmpeg's
/// diagnostic output.
pub async fn video_duration(path: &Path) -> Result<u64> {
    // Without an output file ffmpeg exits non-zero, but it still prints
    // the stream info we need to stderr.
    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    let diagnostics = String::from_utf8_lossy(&output.stderr);
    parse_duration(&diagnostics)
}

fn parse_duration(diagnostics: &str) -> Result<u64> {
    let captures = RE_DURATION
        .captures(diagnostics)
        .ok_or(Error::DurationUnavailable)?;

    let mut seconds: u64 = 0;
    for (group, unit) in [(1, 3600), (2, 60), (3, 1)] {
        let text = &captures[group];
        let value: u64 = text
            .parse()
            .map_err(|_| Error::InvalidDuration(text.to_string()))?;
        seconds += value * unit;
    }
    Ok(seconds)
}

/// Extract one frame of `input` at `timestamp` seconds, resized to
/// `width`x`height`, into `out`.
pub async fn extract_frame(
    input: &Path,
    timestamp: f64,
    width: u32,
    height: u32,
    out: &Path,
) -> Result<()> {
    debug!(input = %input.display(), timestamp, out = %out.display(), "extracting frame");

    let seek = timestamp.to_string();
    let size = format!("{width}x{height}");
    let output = Command::new("ffmpeg")
        .arg("-accurate_seek")
        .args(["-ss", seek.as_str()])
        .arg("-i")
        .arg(input)
        .args(["-s", size.as_str()])
        .args(["-frames:v", "1", "-an", "-f", "image2", "-y"])
        .arg(out)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(Error::FfmpegFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}
