use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::db::DbHandle;
use crate::job::Job;
use crate::{worker, Settings};

/// Dispatcher configuration, filled from the CLI in `main.rs`.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub connect_url: String,
    pub workers_count: u16,
    pub poll_interval: Duration,
    pub settings: Settings,
}

/// Run the dispatch loop: poll the job table, claim whatever is new,
/// feed it to the worker pool, report load, sleep, repeat until
/// cancelled. The queue between dispatcher and workers is the only
/// shared mutable state.
pub async fn serve(cancel_token: CancellationToken, config: ServeConfig) -> Result<(), Error> {
    trace!("Connecting to db: {}", config.connect_url);
    let handle = DbHandle::new(&config.connect_url).await?;

    let (send_to_queue, recv_from_queue) = async_channel::unbounded::<Job>();
    let busy = Arc::new(AtomicUsize::new(0));

    debug!("Starting {} worker tasks...", config.workers_count);
    let mut workers = vec![];
    for _ in 0..config.workers_count {
        let cancel_token = cancel_token.clone();
        let recv_from_queue = recv_from_queue.clone();
        let db = handle.clone();
        let settings = config.settings.clone();
        let busy = busy.clone();
        let join_handle = tokio::spawn(
            async move {
                worker::start(cancel_token, recv_from_queue, db, settings, busy).await;
            }
            .instrument(info_span!("worker")),
        );
        workers.push(join_handle);
    }

    loop {
        for row in handle.fetch_and_claim_new().await? {
            debug!(job_id = %row.job_id, "Including job on processing queue");
            send_to_queue.send(Job::new(row, &config.settings)).await?;
        }

        let active = busy.load(Ordering::SeqCst);
        let queued = send_to_queue.len();
        debug!(
            "{} active jobs, {} on queue, {} total",
            active,
            queued,
            active + queued
        );

        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Dispatcher cancelled");
                break;
            },
            _ = sleep(config.poll_interval) => {}
        }
    }

    // Wait for all workers to complete
    futures::future::join_all(workers)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    info!("Server stopped.");

    Ok(())
}
