//! Frame sampling: turn one video into a fixed count of evenly
//! time-spaced frame images.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::{frame_path, media};

/// Evenly spaced timestamps over `duration` seconds: `count` samples at
/// `i * duration / count`. A 98s video sampled 49 times yields
/// 0.0, 2.0, ..., 96.0.
pub fn sample_timestamps(duration: u64, count: u32) -> Vec<f64> {
    let interval = duration as f64 / f64::from(count);
    (0..count).map(|index| f64::from(index) * interval).collect()
}

/// Produce exactly `count` frame files `frame-0.png` .. `frame-<count-1>.png`
/// under `dir`. Each extraction is independent; they run sequentially
/// within one job.
pub async fn extract_frames(
    input: &Path,
    dir: &Path,
    count: u32,
    width: u32,
    height: u32,
) -> Result<()> {
    let duration = media::video_duration(input).await?;
    let timestamps = sample_timestamps(duration, count);
    debug!(
        input = %input.display(),
        duration,
        interval = duration as f64 / f64::from(count),
        "sampling frames"
    );

    for (index, timestamp) in timestamps.into_iter().enumerate() {
        let out = frame_path(dir, index as u32);
        media::extract_frame(input, timestamp, width, height, &out).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_evenly_spaced() {
        let timestamps = sample_timestamps(98, 49);
        assert_eq!(timestamps.len(), 49);
        assert_eq!(timestamps[0], 0.0);
        assert_eq!(timestamps[1], 2.0);
        assert_eq!(timestamps[48], 96.0);
    }

    #[test]
    fn short_video_still_yields_full_count() {
        let timestamps = sample_timestamps(10, 49);
        assert_eq!(timestamps.len(), 49);
        assert!(timestamps.iter().all(|ts| *ts < 10.0));
    }
}
