use std::{collections::HashMap, path::PathBuf};

use anyhow::{bail, Context};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::{worker::WorkerKind, CameraProfile, SupportedDevice};

/// UDP port QGroundControl listens on for video.
pub const DEFAULT_STREAM_PORT: u16 = 5600;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Camera profile to use: `color1`, `color2` or `thermal1`.
    pub device: String,

    /// Overrides for the device node of a profile, keyed by profile name.
    ///
    /// ```toml
    /// [pipeline.devices]
    /// color1 = "/dev/video3"
    /// ```
    pub devices: HashMap<String, PathBuf>,

    pub port: u16,

    /// `in-process` runs the pipeline inside this process, `subprocess` hands
    /// the description to `launcher`.
    pub worker: String,

    pub launcher: String,

    pub recording: RecordingConfig,
}

impl PipelineConfig {
    pub fn profile(&self, kind: SupportedDevice) -> CameraProfile {
        let profile = CameraProfile::builtin(kind);

        match self.devices.get(kind.as_str()) {
            Some(device) => profile.with_device(device),
            None => profile,
        }
    }

    pub fn device_kind(&self) -> anyhow::Result<SupportedDevice> {
        self.device
            .parse()
            .with_context(|| format!("invalid device '{}' in config", self.device))
    }

    pub fn worker_kind(&self) -> anyhow::Result<WorkerKind> {
        self.worker
            .parse()
            .with_context(|| format!("invalid worker '{}' in config", self.worker))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: SupportedDevice::Color1.to_string(),
            devices: HashMap::new(),
            port: DEFAULT_STREAM_PORT,
            worker: WorkerKind::default().to_string(),
            launcher: "gst-launch-1.0".to_owned(),
            recording: RecordingConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Where `--wrs` recordings go.
    pub stream_rate_dir: PathBuf,

    /// Where `--test` recordings go.
    pub test_dir: PathBuf,

    pub test_file_name: String,

    /// File name of a recording. `{timestamp}` and `{device}` are replaced
    /// when the feed starts.
    pub file_template: String,

    /// chrono format string for `{timestamp}`.
    pub timestamp_format: String,
}

impl RecordingConfig {
    /// Checks the timestamp format and file template, which are otherwise
    /// only used once a camera shows up.
    pub fn validate(&self) -> anyhow::Result<()> {
        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            bail!(
                "invalid recording timestamp format '{}'",
                self.timestamp_format
            );
        }

        let fmt_vars: HashMap<String, String> = ["timestamp", "device"]
            .into_iter()
            .map(|key| (key.to_owned(), String::new()))
            .collect();

        strfmt::strfmt(&self.file_template, &fmt_vars).with_context(|| {
            format!("invalid recording file template '{}'", self.file_template)
        })?;

        Ok(())
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            stream_rate_dir: PathBuf::from("/home/main"),
            test_dir: PathBuf::from("/home/main"),
            test_file_name: "test_video.h264".to_owned(),
            file_template: "aero_{timestamp}".to_owned(),
            timestamp_format: "%y%m%d%H%M".to_owned(),
        }
    }
}
