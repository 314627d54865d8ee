use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the flip-book pipeline. Everything here is fatal to
/// the job that triggered it; the worker loop logs and drops the job.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unusable page template: {0}")]
    Template(String),

    #[error("too many frames for this page: {count} > {max}")]
    PageOverflow { count: usize, max: usize },

    #[error("missing frame [{0}]")]
    MissingFrame(PathBuf),

    #[error("cannot open frame [{path}]: {source}")]
    FrameOpen {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("cannot save page [{path}]: {source}")]
    PageSave {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("cannot determine video duration")]
    DurationUnavailable,

    #[error("invalid video duration [{0}]")]
    InvalidDuration(String),

    #[error("ffmpeg exited with {status}: {stderr}")]
    FfmpegFailed { status: ExitStatus, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
