use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_channel::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::db::DbHandle;
use crate::job::Job;
use crate::Settings;

/// One long-lived executor: pull a job off the queue, run it, report
/// failures, repeat. A failing job never takes the worker down with it.
pub async fn start(
    cancel_token: CancellationToken,
    recv_from_queue: Receiver<Job>,
    db: DbHandle,
    settings: Settings,
    busy: Arc<AtomicUsize>,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Worker cancelled");
                break;
            },
            job = recv_from_queue.recv() => {
                match job {
                    Err(err) => {
                        error!(message = "Error receiving job by worker, exiting", error = ?err);
                        break;
                    },
                    Ok(mut job) => {
                        busy.fetch_add(1, Ordering::SeqCst);
                        if let Err(err) = job.start(&db, &settings).await {
                            error!(job_id = %job.job_id, error = ?err, "Fatal error in job");
                        }
                        busy.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            }
        }
    }
    info!("Worker stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use crate::layout::PageTemplate;
    use crate::State;
    use image::Rgb;
    use std::time::Duration;

    #[tokio::test]
    async fn failed_job_does_not_kill_the_worker() {
        let base = tempfile::tempdir().unwrap();
        let settings = Settings {
            base_dir: base.path().to_path_buf(),
            frames_per_video: 2,
            frame_width: 8,
            frame_height: 6,
            template: PageTemplate::new(22, 18, Rgb([255, 255, 255]), 2, 8, 6).unwrap(),
        };
        let db = DbHandle::memory().await;
        db.insert_job("bad", None, "PAGE").await.unwrap();
        db.insert_job("odd", None, "SPIN").await.unwrap();
        let rows = db.fetch_and_claim_new().await.unwrap();

        let (send, recv) = async_channel::unbounded();
        let busy = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start(
            cancel.clone(),
            recv,
            db.clone(),
            settings.clone(),
            busy.clone(),
        ));

        // First job fails (empty workdir), second is an unknown action;
        // the worker must survive both.
        for row in rows {
            send.send(Job::new(row, &settings)).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(busy.load(Ordering::SeqCst), 0);
        assert!(!handle.is_finished());
        assert_eq!(db.job_state("bad").await.unwrap(), State::Processing);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn worker_exits_on_cancel() {
        let db = DbHandle::memory().await;
        let settings = Settings {
            base_dir: std::env::temp_dir(),
            frames_per_video: 1,
            frame_width: 8,
            frame_height: 6,
            template: PageTemplate::new(22, 18, Rgb([255, 255, 255]), 2, 8, 6).unwrap(),
        };
        let (_send, recv) = async_channel::unbounded::<Job>();
        let busy = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start(cancel.clone(), recv, db, settings, busy));

        cancel.cancel();
        handle.await.unwrap();
    }
}
