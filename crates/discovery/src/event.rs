use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The set of video devices changed and at least one is present.
    VideoAttached(Vec<PathBuf>),

    /// The last video device went away.
    VideoDetached,

    /// The set of storage devices changed. May be empty.
    StorageChanged(Vec<PathBuf>),
}

/// The most recent view of the devices, rebuilt from [`DeviceEvent`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub video: Vec<PathBuf>,
    pub storage: Vec<PathBuf>,
}

impl DeviceSnapshot {
    pub fn apply(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::VideoAttached(video) => self.video = video,
            DeviceEvent::VideoDetached => self.video.clear(),
            DeviceEvent::StorageChanged(storage) => self.storage = storage,
        }
    }

    pub fn has_video(&self, device: &std::path::Path) -> bool {
        self.video.iter().any(|d| d == device)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn snapshot_follows_events() {
        let mut snapshot = DeviceSnapshot::default();

        snapshot.apply(DeviceEvent::VideoAttached(vec![
            PathBuf::from("/dev/video0"),
            PathBuf::from("/dev/video1"),
        ]));
        snapshot.apply(DeviceEvent::StorageChanged(vec![PathBuf::from(
            "/media/aero-sd",
        )]));

        assert!(snapshot.has_video(Path::new("/dev/video1")));
        assert!(!snapshot.has_video(Path::new("/dev/video2")));
        assert_eq!(snapshot.storage, vec![PathBuf::from("/media/aero-sd")]);

        snapshot.apply(DeviceEvent::VideoDetached);
        assert!(!snapshot.has_video(Path::new("/dev/video1")));
        assert_eq!(snapshot.storage.len(), 1);
    }
}
