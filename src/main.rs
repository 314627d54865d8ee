use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Error;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, instrument, Instrument};

use flipbook::layout::PageTemplate;
use flipbook::server::{self, ServeConfig};
use flipbook::{telemetry, Settings};

#[derive(Parser, Clone, Debug, PartialEq)]
#[command(author, version)]
pub struct ConfigContext {
    #[arg(
        short = 'c',
        long = "connect_url",
        help = "SQLite connection URL",
        default_value = "sqlite://db.sqlite3?mode=rwc"
    )]
    connect_url: String,

    #[arg(
        short = 'n',
        long = "workers",
        help = "Number of active jobs in parallel",
        default_value = "2"
    )]
    workers: u16,

    #[arg(
        short = 'i',
        long = "poll_interval",
        help = "Seconds between job table polls",
        default_value = "1"
    )]
    poll_interval: u64,

    #[arg(
        short = 'w',
        long = "workdir",
        help = "Base directory for per-job working directories",
        default_value = "/tmp/flipbook"
    )]
    workdir: PathBuf,

    #[arg(
        long = "frames",
        help = "Frames sampled per video",
        default_value = "49"
    )]
    frames: u32,

    #[arg(long = "frame_width", default_value = "680")]
    frame_width: u32,

    #[arg(long = "frame_height", default_value = "472")]
    frame_height: u32,
}

#[instrument(skip(cancel_token))]
async fn setup(cancel_token: CancellationToken) -> Result<(), Error> {
    let config = ConfigContext::parse();

    let settings = Settings {
        base_dir: config.workdir.clone(),
        frames_per_video: config.frames,
        frame_width: config.frame_width,
        frame_height: config.frame_height,
        template: PageTemplate::a4(config.frame_width, config.frame_height)?,
    };

    tokio::fs::create_dir_all(&settings.base_dir).await?;

    server::serve(
        cancel_token,
        ServeConfig {
            connect_url: config.connect_url,
            workers_count: config.workers,
            poll_interval: Duration::from_secs(config.poll_interval),
            settings,
        },
    )
    .instrument(info_span!("server"))
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "flipbook=DEBUG");
    }

    if let Err(err) = telemetry::init() {
        eprintln!("Error initializing logging: {err}");
        return ExitCode::FAILURE;
    }
    info!("Starting FlipBook Converter...");

    let token = CancellationToken::new();

    let cloned_token = token.clone();
    let app = tokio::spawn(setup(cloned_token));

    let signal_token = token.clone();
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();
        tokio::select! {
            _ = sigterm.recv() => { info!("Received SIGTERM"); signal_token.cancel() },
            _ = sigint.recv() => { info!("Received SIGINT"); signal_token.cancel() },
        }
    });

    match app.await {
        Err(err) => {
            error!("Dispatcher task panicked: {err}");
            ExitCode::FAILURE
        }
        Ok(Err(err)) => {
            error!("Fatal error: {err:?}");
            ExitCode::FAILURE
        }
        Ok(Ok(())) => {
            // The loop only returns cleanly after an interrupt; exit
            // non-zero so supervisors notice the stop.
            info!("Exit.");
            if token.is_cancelled() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
