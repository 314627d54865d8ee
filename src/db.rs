use std::path::Path;
use std::sync::Arc;

use anyhow::Error;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Executor;
use tracing::debug;

use crate::{JobRow, State};

/// Handle to the persistent job table. The table is the source of truth
/// for job state; in-memory job objects only mirror it.
#[derive(Clone)]
pub struct DbHandle {
    pool: Arc<SqlitePool>,
}

impl DbHandle {
    pub async fn new(url: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        (&pool).execute(include_str!("setup.sql")).await?;

        Ok(DbHandle {
            pool: Arc::new(pool),
        })
    }

    /// Select every `NEW` job and flip it to `PROCESSING` in the same
    /// transaction, so a polling cycle can never hand out the same row
    /// twice. Returns the rows as they were before the claim.
    pub async fn fetch_and_claim_new(&self) -> Result<Vec<JobRow>, Error> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT job_id, video_filename, action FROM flipbook_jobs WHERE state = ?",
        )
        .bind(State::New)
        .fetch_all(&mut *tx)
        .await?;

        for row in &rows {
            sqlx::query("UPDATE flipbook_jobs SET state = ? WHERE job_id = ?")
                .bind(State::Processing)
                .bind(&row.job_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if !rows.is_empty() {
            debug!(claimed = rows.len(), "claimed new jobs");
        }
        Ok(rows)
    }

    /// Unconditional update of a job's working directory and state; the
    /// state machine calls this at every transition, before updating its
    /// own copy.
    pub async fn set_state(&self, job_id: &str, path: &Path, state: State) -> Result<(), Error> {
        sqlx::query("UPDATE flipbook_jobs SET path = ?, state = ? WHERE job_id = ?")
            .bind(path.to_string_lossy().into_owned())
            .bind(state)
            .bind(job_id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    /// Read back a job's state; used by operators and tests.
    pub async fn job_state(&self, job_id: &str) -> Result<State, Error> {
        let state: State =
            sqlx::query_scalar("SELECT state FROM flipbook_jobs WHERE job_id = ?")
                .bind(job_id)
                .fetch_one(&*self.pool)
                .await?;
        Ok(state)
    }

    /// Insert a job row in `NEW`; the production producer is external,
    /// this exists for tests and ad-hoc seeding.
    pub async fn insert_job(
        &self,
        job_id: &str,
        video_filename: Option<&str>,
        action: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO flipbook_jobs (job_id, video_filename, action, state) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(job_id)
        .bind(video_filename)
        .bind(action)
        .bind(State::New)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
impl DbHandle {
    /// In-memory store for tests. A pooled `:memory:` database would
    /// open one database per connection, so this pins the pool to a
    /// single connection.
    pub(crate) async fn memory() -> DbHandle {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        (&pool).execute(include_str!("setup.sql")).await.unwrap();
        DbHandle {
            pool: Arc::new(pool),
        }
    }
}
