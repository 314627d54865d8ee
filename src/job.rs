//! The job state machine: one claimed row, one working directory, one
//! action run to completion.

use std::path::PathBuf;

use anyhow::{Context, Error};
use tokio::fs;
use tracing::{debug, error, warn};

use crate::db::DbHandle;
use crate::{layout, sampler, Action, JobRow, Settings, State, FRAME_FILE_PREFIX};

/// One unit of work. Constructed already `Processing`: the store claims
/// the row before a job object exists, and the store stays the source of
/// truth for every later transition.
#[derive(Debug)]
pub struct Job {
    pub job_id: String,
    input_file: Option<PathBuf>,
    action: String,
    workdir: PathBuf,
    state: State,
}

impl Job {
    pub fn new(row: JobRow, settings: &Settings) -> Self {
        let workdir = settings.base_dir.join(&row.job_id);
        Job {
            job_id: row.job_id,
            input_file: row.video_filename.map(PathBuf::from),
            action: row.action,
            workdir,
            state: State::Processing,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Run the job's action to completion. An unknown action is logged
    /// and dropped without a state change; every other failure aborts
    /// the job, leaving the persisted state at its last committed value.
    pub async fn start(&mut self, db: &DbHandle, settings: &Settings) -> Result<(), Error> {
        match Action::parse(&self.action) {
            Some(Action::Frame) => self.generate_frames(db, settings).await,
            Some(Action::Page) => self.generate_pages(db, settings).await,
            None => {
                error!(job_id = %self.job_id, action = %self.action, "unknown action?");
                Ok(())
            }
        }
    }

    async fn generate_frames(&mut self, db: &DbHandle, settings: &Settings) -> Result<(), Error> {
        self.create_work_dir().await?;

        let input = self
            .input_file
            .as_deref()
            .with_context(|| format!("no input file for job {}", self.job_id))?;

        debug!(job_id = %self.job_id, input = %input.display(), "processing video");
        sampler::extract_frames(
            input,
            &self.workdir,
            settings.frames_per_video,
            settings.frame_width,
            settings.frame_height,
        )
        .await
        .with_context(|| format!("extracting frames for job {}", self.job_id))?;

        self.set_state(db, State::Done).await?;
        debug!(job_id = %self.job_id, "frame generation finished");
        Ok(())
    }

    async fn generate_pages(&mut self, db: &DbHandle, settings: &Settings) -> Result<(), Error> {
        debug!(job_id = %self.job_id, "generating pages for printing");

        let workdir = self.workdir.clone();
        let frame_count = settings.frames_per_video;
        let template = settings.template.clone();
        // Compositing is CPU and file bound; keep it off the async
        // executor threads.
        let pages = tokio::task::spawn_blocking(move || {
            layout::generate_pages(&workdir, frame_count, &template)
        })
        .await?
        .with_context(|| format!("assembling pages for job {}", self.job_id))?;

        self.clean_work_dir().await?;
        self.set_state(db, State::Done).await?;
        debug!(job_id = %self.job_id, pages, "page generation finished");
        Ok(())
    }

    /// Create a fresh working directory, destroying whatever was at that
    /// path before.
    async fn create_work_dir(&self) -> Result<(), Error> {
        debug!(job_id = %self.job_id, path = %self.workdir.display(), "creating working directory");

        if fs::try_exists(&self.workdir).await? {
            warn!(
                job_id = %self.job_id,
                path = %self.workdir.display(),
                "path already exists and will be erased"
            );
            fs::remove_dir_all(&self.workdir)
                .await
                .with_context(|| format!("cannot delete directory {}", self.workdir.display()))?;
        }

        fs::create_dir_all(&self.workdir)
            .await
            .with_context(|| format!("cannot create directory {}", self.workdir.display()))?;
        Ok(())
    }

    /// Delete the frame files after page assembly; pages stay. Removal
    /// failures are logged per file and do not fail the job.
    async fn clean_work_dir(&self) -> Result<(), Error> {
        let mut entries = fs::read_dir(&self.workdir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(FRAME_FILE_PREFIX) {
                if let Err(err) = fs::remove_file(entry.path()).await {
                    error!(
                        job_id = %self.job_id,
                        file = %entry.path().display(),
                        error = %err,
                        "error removing frame file"
                    );
                }
            }
        }
        Ok(())
    }

    /// Persist the transition first, then mirror it in memory. A failed
    /// update leaves both sides on the previous state.
    async fn set_state(&mut self, db: &DbHandle, state: State) -> Result<(), Error> {
        db.set_state(&self.job_id, &self.workdir, state).await?;
        self.state = state;
        Ok(())
    }
}
