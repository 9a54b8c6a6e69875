use std::time::Duration;

use af_client::Task;
use af_discovery::{DeviceEvent, DeviceSnapshot};
use af_pipeline::{
    select_topology,
    worker::{FeedWorker, WorkerExit},
    CameraProfile, RecordingConfig, StorageMode, StreamTarget,
};
use anyhow::Context;
use async_trait::async_trait;
use tokio::select;
use tokio_util::sync::CancellationToken;

pub type WorkerFactory = Box<dyn Fn() -> anyhow::Result<Box<dyn FeedWorker>> + Send + Sync>;

/// What to run once the camera shows up.
#[derive(Clone, Debug)]
pub struct FeedSettings {
    pub profile: CameraProfile,
    pub mode: StorageMode,
    pub stream: StreamTarget,
    pub recording: RecordingConfig,
    pub restart_delay: Duration,
}

/// Waits for the profile's video device, runs a feed while it is present and
/// stops the feed when it goes away.
pub struct SupervisorTask {
    settings: FeedSettings,
    evt_rx: flume::Receiver<DeviceEvent>,
    make_worker: WorkerFactory,
}

pub fn create_task(
    settings: FeedSettings,
    evt_rx: flume::Receiver<DeviceEvent>,
    make_worker: WorkerFactory,
) -> SupervisorTask {
    SupervisorTask {
        settings,
        evt_rx,
        make_worker,
    }
}

enum FeedOutcome {
    Cancelled,
    DeviceLost,
    WorkerExited(anyhow::Result<WorkerExit>),
}

#[async_trait]
impl Task for SupervisorTask {
    fn name(&self) -> &'static str {
        "supervisor"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self {
            settings,
            evt_rx,
            make_worker,
        } = *self;

        let device = settings.profile.device.clone();
        let mut devices = DeviceSnapshot::default();

        // only complain once per absence
        let mut absence_reported = false;

        loop {
            if !devices.has_video(&device) {
                if !absence_reported {
                    if devices.video.is_empty() {
                        info!("no video device found, please plug in a supported video device");
                    } else {
                        info!(
                            "video device(s) {:?} found, waiting for {}",
                            devices.video,
                            device.display()
                        );
                    }
                    absence_reported = true;
                }

                select! {
                    _ = cancel.cancelled() => break,
                    evt = evt_rx.recv_async() => match evt {
                        Ok(evt) => devices.apply(evt),
                        Err(_) => {
                            debug!("device event channel closed");
                            break;
                        }
                    }
                }

                continue;
            }

            // the snapshot can lag a poll behind the filesystem
            if !af_discovery::is_present(&device) {
                debug!("{} vanished before the feed started", device.display());
                devices.video.retain(|node| node != &device);
                continue;
            }

            absence_reported = false;
            info!("video device(s) found: {:?}", devices.video);

            let topology = match select_topology(
                &settings.profile,
                settings.mode,
                &devices.storage,
                &settings.recording,
                &settings.stream,
                chrono::Local::now(),
            ) {
                Ok(topology) => topology,
                Err(err) => {
                    error!("failed to select pipeline: {err:?}");
                    if !delay(&cancel, settings.restart_delay).await {
                        break;
                    }
                    continue;
                }
            };

            let mut worker = make_worker().context("failed to create pipeline worker")?;

            info!(
                "starting {} feed for {} ({}) to {}:{} using {} worker",
                settings.profile.kind,
                device.display(),
                settings.mode,
                settings.stream.host,
                settings.stream.port,
                worker.name()
            );

            if let Err(err) = worker.start(&topology).await {
                error!("failed to start feed: {err:?}");
                if let Err(err) = worker.stop().await {
                    warn!("failed to clean up feed: {err:?}");
                }
                if !delay(&cancel, settings.restart_delay).await {
                    break;
                }
                continue;
            }

            let outcome = loop {
                select! {
                    _ = cancel.cancelled() => break FeedOutcome::Cancelled,
                    evt = evt_rx.recv_async() => match evt {
                        Ok(evt) => {
                            devices.apply(evt);
                            if !devices.has_video(&device) {
                                break FeedOutcome::DeviceLost;
                            }
                        }
                        Err(_) => {
                            debug!("device event channel closed");
                            break FeedOutcome::Cancelled;
                        }
                    },
                    res = worker.wait() => break FeedOutcome::WorkerExited(res),
                }
            };

            if let Err(err) = worker.stop().await {
                error!("failed to stop feed: {err:?}");
            }

            match outcome {
                FeedOutcome::Cancelled => break,
                FeedOutcome::DeviceLost => {
                    info!("video feed has ended, {} is gone", device.display());
                }
                FeedOutcome::WorkerExited(res) => {
                    match res {
                        Ok(exit) => warn!("video feed stopped by itself: {exit:?}"),
                        Err(err) => error!("video feed failed: {err:?}"),
                    }

                    if !delay(&cancel, settings.restart_delay).await {
                        break;
                    }
                }
            }
        }

        debug!("supervisor exiting");

        Ok(())
    }
}

/// Sleeps unless cancelled first. Returns false if cancelled.
async fn delay(cancel: &CancellationToken, duration: Duration) -> bool {
    select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
