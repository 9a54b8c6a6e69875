use anyhow::Context;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::supervisor::{FeedSettings, WorkerFactory};

#[macro_use]
extern crate tracing;

mod cli;
mod config;
mod supervisor;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // setup colorful backtraces
    color_backtrace::install();

    let mut targets = Targets::new().with_default(LevelFilter::INFO);

    if let Ok(directives) = std::env::var("RUST_LOG") {
        for directive in directives.split(',') {
            if let Some((target, level)) = directive.split_once('=') {
                targets = targets.with_target(
                    target,
                    level.parse::<LevelFilter>().context("invalid log level")?,
                );
            } else {
                targets = targets.with_default(
                    directive
                        .parse::<LevelFilter>()
                        .context("invalid log level")?,
                );
            }
        }
    }

    let (writer, _guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::hourly("logs", "aero-feed"));

    let reg = tracing_subscriber::registry();

    #[cfg(tokio_unstable)]
    let reg = reg.with(console_subscriber::spawn());

    reg
        // writer that outputs to console
        .with(tracing_subscriber::fmt::layer().with_filter(targets))
        // writer that outputs to files
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(Targets::new().with_targets(vec![
                    ("aero_feed", LevelFilter::DEBUG),
                    ("af_discovery", LevelFilter::DEBUG),
                    ("af_pipeline", LevelFilter::DEBUG),
                ])),
        )
        .init();

    let main_args = cli::args::MainArgs::parse();

    let config = match &main_args.config {
        Some(path) => {
            debug!("reading config from {:?}", path);
            crate::config::AeroFeedConfig::read_from_path(path)
        }
        None => crate::config::AeroFeedConfig::read(),
    }
    .context("failed to read config file")?;

    info!("streaming to ground control at {}", main_args.ip);

    run_tasks(main_args, config).await
}

async fn run_tasks(
    args: cli::args::MainArgs,
    config: crate::config::AeroFeedConfig,
) -> anyhow::Result<()> {
    let cancellation_token = CancellationToken::new();

    ctrlc::set_handler({
        let cancellation_token = cancellation_token.clone();
        move || {
            info!("received interrupt, shutting down");
            cancellation_token.cancel();
        }
    })
    .context("could not set ctrl+c handler")?;

    let device = match args.device {
        Some(device) => device,
        None => config.pipeline.device_kind()?,
    };

    let worker_kind = match args.worker {
        Some(kind) => kind,
        None => config.pipeline.worker_kind()?,
    };

    config
        .pipeline
        .recording
        .validate()
        .context("invalid recording config")?;

    let settings = FeedSettings {
        profile: config.pipeline.profile(device),
        mode: args.storage_mode(),
        stream: af_pipeline::StreamTarget {
            host: args.ip,
            port: args.port.unwrap_or(config.pipeline.port),
        },
        recording: config.pipeline.recording.clone(),
        restart_delay: config.supervisor.restart_delay(),
    };

    // fail early rather than the first time the camera shows up
    af_pipeline::worker::create_worker(worker_kind, &config.pipeline.launcher)
        .context("failed to initialize pipeline worker")?;

    let launcher = config.pipeline.launcher.clone();
    let make_worker: WorkerFactory =
        Box::new(move || af_pipeline::worker::create_worker(worker_kind, &launcher));

    let mut tasks = Vec::<Box<dyn af_client::Task>>::new();

    debug!("initializing discovery task");
    let discovery_task =
        af_discovery::create_task(config.discovery).context("failed to initialize discovery task")?;
    let evt_rx = discovery_task.events();
    tasks.push(Box::new(discovery_task));

    debug!("initializing supervisor task");
    tasks.push(Box::new(supervisor::create_task(
        settings,
        evt_rx,
        make_worker,
    )));

    let mut join_set = JoinSet::new();

    for task in tasks {
        debug!("starting {} task", task.name());
        join_set.spawn(task.run(cancellation_token.clone()));
    }

    while let Some(res) = join_set.join_next().await {
        // if task panicked, then will be Some(Err)
        // if task terminated w/ error, then will be Some(Ok(Err))
        // need to propagate errors in both cases

        match res {
            Err(err) => {
                cancellation_token.cancel();
                return Err(err).context("task failed");
            }
            Ok(Err(err)) => {
                cancellation_token.cancel();
                return Err(err).context("task terminated with error");
            }
            _ => {
                info!("exited task");
                // the supervisor is the reason the process runs
                cancellation_token.cancel();
            }
        }
    }

    Ok(())
}
