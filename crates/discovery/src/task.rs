use std::path::PathBuf;

use af_client::Task;
use async_trait::async_trait;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{query::poll_devices, DeviceEvent, DiscoveryConfig};

pub fn create_task(config: DiscoveryConfig) -> anyhow::Result<DiscoveryTask> {
    if config.poll_interval_ms == 0 {
        anyhow::bail!("discovery poll interval must be greater than zero");
    }

    let (evt_tx, evt_rx) = flume::bounded(256);

    Ok(DiscoveryTask {
        config,
        evt_tx,
        evt_rx,
    })
}

/// Polls for devices and publishes a [`DeviceEvent`] whenever the set of
/// video or storage devices changes. The first poll always publishes.
pub struct DiscoveryTask {
    config: DiscoveryConfig,
    evt_tx: flume::Sender<DeviceEvent>,
    evt_rx: flume::Receiver<DeviceEvent>,
}

impl DiscoveryTask {
    pub fn events(&self) -> flume::Receiver<DeviceEvent> {
        self.evt_rx.clone()
    }
}

#[async_trait]
impl Task for DiscoveryTask {
    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let Self { config, evt_tx, .. } = *self;

        let loop_fut = async move {
            let mut interval = tokio::time::interval(config.poll_interval());
            let mut last_video: Option<Vec<PathBuf>> = None;
            let mut last_storage: Option<Vec<PathBuf>> = None;

            loop {
                interval.tick().await;

                let (video, storage) = poll_devices(&config);
                trace!("polled devices: video={video:?} storage={storage:?}");

                // storage goes first so that consumers reacting to a video
                // device already know where they can record
                if last_storage.as_ref() != Some(&storage) {
                    debug!("storage devices changed: {storage:?}");
                    last_storage = Some(storage.clone());

                    if evt_tx
                        .send_async(DeviceEvent::StorageChanged(storage))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }

                if last_video.as_ref() != Some(&video) {
                    debug!("video devices changed: {video:?}");
                    last_video = Some(video.clone());

                    let event = if video.is_empty() {
                        DeviceEvent::VideoDetached
                    } else {
                        DeviceEvent::VideoAttached(video)
                    };

                    if evt_tx.send_async(event).await.is_err() {
                        break;
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        };

        select! {
            _ = cancel.cancelled() => {}
            res = loop_fut => { res? }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use tokio::time::timeout;

    use super::*;

    async fn next_event(rx: &flume::Receiver<DeviceEvent>) -> DeviceEvent {
        timeout(Duration::from_secs(5), rx.recv_async())
            .await
            .expect("timed out waiting for device event")
            .expect("discovery channel closed")
    }

    #[test]
    fn rejects_zero_interval() {
        let config = DiscoveryConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };

        assert!(create_task(config).is_err());
    }

    #[tokio::test]
    async fn publishes_changes_only() {
        let dev = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();

        let config = DiscoveryConfig {
            dev_dir: dev.path().to_owned(),
            media_dir: media.path().to_owned(),
            poll_interval_ms: 10,
            ..Default::default()
        };

        let task = create_task(config).unwrap();
        let rx = task.events();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Box::new(task).run(cancel.clone()));

        // initial state is always published
        assert_eq!(next_event(&rx).await, DeviceEvent::StorageChanged(vec![]));
        assert_eq!(next_event(&rx).await, DeviceEvent::VideoDetached);

        fs::write(dev.path().join("video1"), b"").unwrap();
        assert_eq!(
            next_event(&rx).await,
            DeviceEvent::VideoAttached(vec![dev.path().join("video1")])
        );

        fs::create_dir(media.path().join("aero-sd")).unwrap();
        assert_eq!(
            next_event(&rx).await,
            DeviceEvent::StorageChanged(vec![media.path().join("aero-sd")])
        );

        // several polls with nothing changing must stay quiet
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.is_empty());

        fs::remove_file(dev.path().join("video1")).unwrap();
        assert_eq!(next_event(&rx).await, DeviceEvent::VideoDetached);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
