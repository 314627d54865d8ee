use std::path::{Path, PathBuf};

pub mod db;
pub mod error;
pub mod job;
pub mod layout;
pub mod media;
pub mod sampler;
pub mod server;
pub mod telemetry;
pub mod worker;

pub const FRAME_FILE_PREFIX: &str = "frame-";
pub const PAGE_FILE_PREFIX: &str = "page-";

/// A row claimed from the job table, before it becomes a running
/// [`job::Job`]. The action is kept as raw text: unknown values must
/// survive until the state machine decides what to do with them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub job_id: String,
    pub video_filename: Option<String>,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum State {
    New,
    Processing,
    Done,
}

/// What a job does: extract frames from a video, or assemble pages from
/// previously extracted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Frame,
    Page,
}

impl Action {
    /// Parse the stored action text. Unknown values are a tolerated
    /// anomaly, so this returns `None` rather than an error.
    pub fn parse(text: &str) -> Option<Action> {
        match text {
            "FRAME" => Some(Action::Frame),
            "PAGE" => Some(Action::Page),
            _ => None,
        }
    }
}

pub fn frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{FRAME_FILE_PREFIX}{index}.png"))
}

pub fn page_path(dir: &Path, number: u32) -> PathBuf {
    dir.join(format!("{PAGE_FILE_PREFIX}{number}.png"))
}

/// Runtime settings shared by every job. The defaults (49 frames per
/// video, 680x472 frames on an A4 page) come from the CLI in `main.rs`;
/// tests substitute smaller geometry.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub frames_per_video: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub template: layout::PageTemplate,
}
