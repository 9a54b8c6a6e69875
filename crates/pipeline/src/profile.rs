use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::bail;

/// Cameras that have a pipeline profile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SupportedDevice {
    Color1,
    Color2,
    Thermal1,
}

impl SupportedDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedDevice::Color1 => "color1",
            SupportedDevice::Color2 => "color2",
            SupportedDevice::Thermal1 => "thermal1",
        }
    }
}

impl fmt::Display for SupportedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupportedDevice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "color1" => SupportedDevice::Color1,
            "color2" => SupportedDevice::Color2,
            "thermal1" => SupportedDevice::Thermal1,
            other => bail!("unsupported video device {other}"),
        })
    }
}

/// What the camera hands to `v4l2src`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    /// The camera encodes H.264 itself.
    H264,
    /// Uncompressed frames in the given pixel format; we have to encode.
    Raw { format: String },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Raw frames fed to the encoder on the network branch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamSettings {
    pub framerate: u32,
    pub resolution: Resolution,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    /// kbit/s
    pub bitrate: u32,
    pub speed_preset: String,
    pub tune: String,
}

/// Everything the topology builder needs to know about a camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraProfile {
    pub kind: SupportedDevice,
    pub device: PathBuf,
    pub source: SourceFormat,
    pub capture: Resolution,
    /// Resolution requested from the camera when the feed is also recorded
    /// and the network branch re-encodes.
    pub record: Resolution,
    pub stream: StreamSettings,
    pub encoder: EncoderSettings,
}

impl CameraProfile {
    pub fn builtin(kind: SupportedDevice) -> Self {
        let encoder = EncoderSettings {
            bitrate: 500,
            speed_preset: "superfast".to_owned(),
            tune: "zerolatency".to_owned(),
        };

        match kind {
            SupportedDevice::Color1 | SupportedDevice::Color2 => CameraProfile {
                kind,
                device: PathBuf::from(if kind == SupportedDevice::Color1 {
                    "/dev/video1"
                } else {
                    "/dev/video2"
                }),
                source: SourceFormat::H264,
                capture: Resolution {
                    width: 640,
                    height: 360,
                },
                record: Resolution {
                    width: 640,
                    height: 480,
                },
                stream: StreamSettings {
                    framerate: 15,
                    resolution: Resolution {
                        width: 640,
                        height: 360,
                    },
                },
                encoder,
            },
            SupportedDevice::Thermal1 => CameraProfile {
                kind,
                device: PathBuf::from("/dev/video0"),
                source: SourceFormat::Raw {
                    format: "NV12".to_owned(),
                },
                capture: Resolution {
                    width: 640,
                    height: 512,
                },
                record: Resolution {
                    width: 640,
                    height: 512,
                },
                stream: StreamSettings {
                    framerate: 15,
                    resolution: Resolution {
                        width: 640,
                        height: 512,
                    },
                },
                encoder,
            },
        }
    }

    /// Same profile on a different device node.
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }
}
