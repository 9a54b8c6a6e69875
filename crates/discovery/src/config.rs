use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory that holds video device nodes.
    pub dev_dir: PathBuf,

    /// Directory where removable storage is mounted.
    pub media_dir: PathBuf,

    /// Substring that marks an entry of `dev_dir` as a video device.
    pub video_marker: String,

    /// Substring that marks a mount point as a storage device formatted for
    /// the aircraft.
    pub storage_marker: String,

    pub poll_interval_ms: u64,
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
            media_dir: PathBuf::from("/media"),
            video_marker: "video".to_owned(),
            storage_marker: "aero".to_owned(),
            poll_interval_ms: 500,
        }
    }
}
