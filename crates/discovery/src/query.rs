use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::DiscoveryConfig;

/// Lists the entries of `dir` whose file name contains `needle`, sorted by
/// path. A directory that does not exist has no entries.
pub fn query_entries(dir: &Path, needle: &str) -> io::Result<Vec<PathBuf>> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut entries = Vec::new();

    for entry in read_dir {
        let entry = entry?;

        if entry.file_name().to_string_lossy().contains(needle) {
            entries.push(entry.path());
        }
    }

    entries.sort();

    Ok(entries)
}

/// Video device nodes, e.g. `/dev/video1`.
pub fn query_video_devices(config: &DiscoveryConfig) -> io::Result<Vec<PathBuf>> {
    query_entries(&config.dev_dir, &config.video_marker)
}

/// Storage devices that were formatted for the aircraft, e.g. `/media/aero-sd`.
pub fn query_storage_devices(config: &DiscoveryConfig) -> io::Result<Vec<PathBuf>> {
    query_entries(&config.media_dir, &config.storage_marker)
}

pub fn is_present(device: &Path) -> bool {
    device.exists()
}

/// Runs both queries. I/O errors are logged and treated as "nothing found".
pub(crate) fn poll_devices(config: &DiscoveryConfig) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let video = query_video_devices(config).unwrap_or_else(|err| {
        warn!("could not list {}: {err}", config.dev_dir.display());
        Vec::new()
    });

    let storage = query_storage_devices(config).unwrap_or_else(|err| {
        warn!("could not list {}: {err}", config.media_dir.display());
        Vec::new()
    });

    (video, storage)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn config_for(dev: &Path, media: &Path) -> DiscoveryConfig {
        DiscoveryConfig {
            dev_dir: dev.to_owned(),
            media_dir: media.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn lists_only_matching_entries_in_order() {
        let dev = tempfile::tempdir().unwrap();
        for name in ["video2", "tty0", "video0", "null", "video1"] {
            fs::write(dev.path().join(name), b"").unwrap();
        }

        let media = tempfile::tempdir().unwrap();
        fs::create_dir(media.path().join("aero-sd")).unwrap();
        fs::create_dir(media.path().join("usbstick")).unwrap();

        let config = config_for(dev.path(), media.path());

        assert_eq!(
            query_video_devices(&config).unwrap(),
            vec![
                dev.path().join("video0"),
                dev.path().join("video1"),
                dev.path().join("video2"),
            ]
        );
        assert_eq!(
            query_storage_devices(&config).unwrap(),
            vec![media.path().join("aero-sd")]
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let dev = tempfile::tempdir().unwrap();
        let config = config_for(dev.path(), &dev.path().join("not-mounted"));

        assert!(query_storage_devices(&config).unwrap().is_empty());
        assert!(query_video_devices(&config).unwrap().is_empty());
    }

    #[test]
    fn presence_tracks_the_node() {
        let dev = tempfile::tempdir().unwrap();
        let node = dev.path().join("video1");

        assert!(!is_present(&node));
        fs::write(&node, b"").unwrap();
        assert!(is_present(&node));
    }
}
