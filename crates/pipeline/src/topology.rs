use std::{
    collections::HashMap,
    fmt::{self, Write},
    net::IpAddr,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::warn;

use crate::{
    description::{Branch, BranchKind, Chain, Element, Topology},
    CameraProfile, RecordingConfig, Resolution, SourceFormat,
};

/// How the feed should be recorded besides being streamed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StorageMode {
    /// Stream only.
    None,
    /// Record to the first detected storage device and re-encode the network
    /// branch at the stream rate.
    Device,
    /// Record exactly what is streamed, to a fixed directory.
    StreamRate,
    /// Like `Device`, but to a fixed test file.
    Test,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageMode::None => "stream only",
            StorageMode::Device => "record to storage device",
            StorageMode::StreamRate => "record at stream rate",
            StorageMode::Test => "record test file",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamTarget {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recording {
    pub path: PathBuf,
    /// Whether the network branch decodes the camera output and encodes it
    /// again at the stream settings.
    pub reencode_stream: bool,
}

/// Works out where (and whether) to record. `Device` mode without any storage
/// device degrades to streaming only.
pub fn plan_recording(
    profile: &CameraProfile,
    mode: StorageMode,
    storage_devices: &[PathBuf],
    config: &RecordingConfig,
    now: DateTime<Local>,
) -> anyhow::Result<Option<Recording>> {
    let recording = match mode {
        StorageMode::None => None,
        StorageMode::Device => match storage_devices.first() {
            Some(storage) => Some(Recording {
                path: storage.join(recording_file_name(config, profile, now)?),
                reencode_stream: true,
            }),
            None => {
                warn!("no storage device found, streaming without recording");
                None
            }
        },
        StorageMode::StreamRate => Some(Recording {
            path: config
                .stream_rate_dir
                .join(recording_file_name(config, profile, now)?),
            reencode_stream: false,
        }),
        StorageMode::Test => Some(Recording {
            path: config.test_dir.join(&config.test_file_name),
            reencode_stream: true,
        }),
    };

    Ok(recording)
}

pub fn recording_file_name(
    config: &RecordingConfig,
    profile: &CameraProfile,
    now: DateTime<Local>,
) -> anyhow::Result<String> {
    // `to_string` would panic on a bad specifier
    let mut timestamp = String::new();
    write!(timestamp, "{}", now.format(&config.timestamp_format)).map_err(|_| {
        anyhow::anyhow!(
            "invalid recording timestamp format '{}'",
            config.timestamp_format
        )
    })?;

    let mut fmt_vars = HashMap::new();
    fmt_vars.insert("timestamp".to_owned(), timestamp);
    fmt_vars.insert("device".to_owned(), profile.kind.to_string());

    strfmt::strfmt(&config.file_template, &fmt_vars).context("invalid recording file template")
}

/// Picks the pipeline topology for a profile and storage mode.
pub fn select_topology(
    profile: &CameraProfile,
    mode: StorageMode,
    storage_devices: &[PathBuf],
    config: &RecordingConfig,
    stream: &StreamTarget,
    now: DateTime<Local>,
) -> anyhow::Result<Topology> {
    let recording = plan_recording(profile, mode, storage_devices, config, now)?;

    Ok(build_topology(profile, recording.as_ref(), stream))
}

pub fn build_topology(
    profile: &CameraProfile,
    recording: Option<&Recording>,
    stream: &StreamTarget,
) -> Topology {
    match (&profile.source, recording) {
        (SourceFormat::H264, None) => Topology::linear(
            source(profile, Some(profile.capture))
                .element(Element::new("h264parse").named("vid-parse"))
                .element(Element::new("queue").named("network-queue"))
                .extend(network_tail(stream)),
        ),

        (SourceFormat::H264, Some(recording)) if recording.reencode_stream => Topology {
            // caps are set on the record branch so that the camera negotiates
            // the recording resolution
            source: source(profile, None),
            branches: vec![
                Branch {
                    kind: BranchKind::Record,
                    chain: Chain::new()
                        .element(Element::new("queue").named("file-queue"))
                        .caps(h264_caps(profile.record))
                        .element(Element::new("h264parse").named("file-parse"))
                        .element(file_sink(&recording.path)),
                },
                Branch {
                    kind: BranchKind::Network,
                    chain: Chain::new()
                        .element(Element::new("queue").named("network-queue"))
                        .element(Element::new("decodebin").named("decode-bin"))
                        .element(Element::new("videoconvert").named("vid-conv"))
                        .element(Element::new("videoscale").named("vid-scale"))
                        .element(Element::new("videorate").named("vid-rate"))
                        .caps(format!(
                            "video/x-raw,framerate={}/1,width={},height={}",
                            profile.stream.framerate,
                            profile.stream.resolution.width,
                            profile.stream.resolution.height
                        ))
                        .element(encoder(profile))
                        .element(Element::new("h264parse").named("vid-parse"))
                        .extend(network_tail(stream)),
                },
            ],
        },

        (SourceFormat::H264, Some(recording)) => Topology {
            source: source(profile, Some(profile.capture)),
            branches: vec![
                Branch {
                    kind: BranchKind::Record,
                    chain: Chain::new()
                        .element(Element::new("queue").named("file-queue"))
                        .element(file_sink(&recording.path)),
                },
                Branch {
                    kind: BranchKind::Network,
                    chain: Chain::new()
                        .element(Element::new("queue").named("network-queue"))
                        .extend(network_tail(stream)),
                },
            ],
        },

        (SourceFormat::Raw { .. }, recording) => {
            let encoded = source(profile, Some(profile.capture))
                .element(Element::new("videoconvert").named("vid-conv"))
                .element(encoder(profile))
                .element(Element::new("h264parse").named("vid-parse"));

            match recording {
                None => Topology::linear(
                    encoded
                        .element(Element::new("queue").named("network-queue"))
                        .extend(network_tail(stream)),
                ),
                Some(recording) => Topology {
                    source: encoded,
                    branches: vec![
                        Branch {
                            kind: BranchKind::Record,
                            chain: Chain::new()
                                .element(Element::new("queue").named("file-queue"))
                                .element(file_sink(&recording.path)),
                        },
                        Branch {
                            kind: BranchKind::Network,
                            chain: Chain::new()
                                .element(Element::new("queue").named("network-queue"))
                                .extend(network_tail(stream)),
                        },
                    ],
                },
            }
        }
    }
}

fn h264_caps(resolution: Resolution) -> String {
    format!(
        "video/x-h264,width={},height={}",
        resolution.width, resolution.height
    )
}

fn source(profile: &CameraProfile, caps: Option<Resolution>) -> Chain {
    let chain = Chain::new().element(
        Element::new("v4l2src")
            .named("vid-src")
            .property("device", profile.device.display()),
    );

    match (caps, &profile.source) {
        (None, _) => chain,
        (Some(resolution), SourceFormat::H264) => chain.caps(h264_caps(resolution)),
        (Some(resolution), SourceFormat::Raw { format }) => chain.caps(format!(
            "video/x-raw,format={},width={},height={}",
            format, resolution.width, resolution.height
        )),
    }
}

fn encoder(profile: &CameraProfile) -> Element {
    Element::new("x264enc")
        .named("h264-enc")
        .property("bitrate", profile.encoder.bitrate)
        .property("speed-preset", &profile.encoder.speed_preset)
        .property("tune", &profile.encoder.tune)
}

fn file_sink(path: &Path) -> Element {
    Element::new("filesink")
        .named("file-sink")
        .property("location", path.display())
}

fn network_tail(stream: &StreamTarget) -> Chain {
    Chain::new()
        .element(
            Element::new("rtph264pay")
                .named("rtp-enc")
                .property("config-interval", 1)
                .property("pt", 96),
        )
        .element(
            Element::new("udpsink")
                .named("udp-sink")
                .property("host", stream.host)
                .property("port", stream.port),
        )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::SupportedDevice;

    fn stream() -> StreamTarget {
        StreamTarget {
            host: "10.120.117.134".parse().unwrap(),
            port: 5600,
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2019, 7, 4, 13, 5, 0).unwrap()
    }

    fn color() -> CameraProfile {
        CameraProfile::builtin(SupportedDevice::Color1)
    }

    #[test]
    fn stream_only_passes_camera_h264_through() {
        let topology = select_topology(
            &color(),
            StorageMode::None,
            &[],
            &RecordingConfig::default(),
            &stream(),
            now(),
        )
        .unwrap();

        assert!(topology.branches.is_empty());
        assert_eq!(
            topology.source.factories(),
            vec!["v4l2src", "h264parse", "queue", "rtph264pay", "udpsink"]
        );
        assert_eq!(
            topology.to_launch_string(),
            "v4l2src name=vid-src device=/dev/video1 ! video/x-h264,width=640,height=360 \
             ! h264parse name=vid-parse ! queue name=network-queue \
             ! rtph264pay name=rtp-enc config-interval=1 pt=96 \
             ! udpsink name=udp-sink host=10.120.117.134 port=5600"
        );
    }

    #[test]
    fn device_mode_records_to_first_storage_device() {
        let storage = vec![
            PathBuf::from("/media/aero-a"),
            PathBuf::from("/media/aero-b"),
        ];

        let topology = select_topology(
            &color(),
            StorageMode::Device,
            &storage,
            &RecordingConfig::default(),
            &stream(),
            now(),
        )
        .unwrap();

        let record = topology.branch(BranchKind::Record).unwrap();
        assert_eq!(record.factories(), vec!["queue", "h264parse", "filesink"]);
        assert_eq!(
            topology.find("filesink").unwrap().get("location"),
            Some("/media/aero-a/aero_1907041305")
        );

        let network = topology.branch(BranchKind::Network).unwrap();
        assert_eq!(
            network.factories(),
            vec![
                "queue",
                "decodebin",
                "videoconvert",
                "videoscale",
                "videorate",
                "x264enc",
                "h264parse",
                "rtph264pay",
                "udpsink"
            ]
        );

        let launch = topology.to_launch_string();
        assert!(launch.contains(" ! tee name=t t. ! queue name=file-queue"));
        assert!(launch.contains("video/x-raw,framerate=15/1,width=640,height=360"));
        assert!(launch.contains("x264enc name=h264-enc bitrate=500 speed-preset=superfast tune=zerolatency"));
    }

    #[test]
    fn device_mode_without_storage_streams_only() {
        let topology = select_topology(
            &color(),
            StorageMode::Device,
            &[],
            &RecordingConfig::default(),
            &stream(),
            now(),
        )
        .unwrap();

        assert!(topology.branches.is_empty());
        assert!(topology.find("filesink").is_none());
    }

    #[test]
    fn stream_rate_mode_does_not_reencode() {
        let topology = select_topology(
            &color(),
            StorageMode::StreamRate,
            &[],
            &RecordingConfig::default(),
            &stream(),
            now(),
        )
        .unwrap();

        assert!(topology.find("x264enc").is_none());
        assert_eq!(
            topology.branch(BranchKind::Network).unwrap().factories(),
            vec!["queue", "rtph264pay", "udpsink"]
        );
        assert_eq!(
            topology.find("filesink").unwrap().get("location"),
            Some("/home/main/aero_1907041305")
        );
    }

    #[test]
    fn test_mode_uses_fixed_file() {
        let config = RecordingConfig {
            test_dir: PathBuf::from("/tmp/feeds"),
            ..Default::default()
        };

        let recording = plan_recording(&color(), StorageMode::Test, &[], &config, now())
            .unwrap()
            .unwrap();

        assert_eq!(recording.path, PathBuf::from("/tmp/feeds/test_video.h264"));
        assert!(recording.reencode_stream);
    }

    #[test]
    fn thermal_camera_encodes_once_before_tee() {
        let thermal = CameraProfile::builtin(SupportedDevice::Thermal1);

        let topology = select_topology(
            &thermal,
            StorageMode::StreamRate,
            &[],
            &RecordingConfig::default(),
            &stream(),
            now(),
        )
        .unwrap();

        assert_eq!(
            topology.source.factories(),
            vec!["v4l2src", "videoconvert", "x264enc", "h264parse"]
        );
        assert!(topology
            .to_launch_string()
            .starts_with("v4l2src name=vid-src device=/dev/video0 ! video/x-raw,format=NV12,width=640,height=512"));
        assert_eq!(topology.elements().filter(|e| e.factory == "x264enc").count(), 1);
    }

    #[test]
    fn file_template_substitutes_device() {
        let config = RecordingConfig {
            file_template: "{device}-{timestamp}.h264".to_owned(),
            timestamp_format: "%Y%m%d".to_owned(),
            ..Default::default()
        };

        assert_eq!(
            recording_file_name(&config, &color(), now()).unwrap(),
            "color1-20190704.h264"
        );

        let bad = RecordingConfig {
            file_template: "{altitude}".to_owned(),
            ..Default::default()
        };
        assert!(recording_file_name(&bad, &color(), now()).is_err());
    }

    #[test]
    fn bad_timestamp_format_is_an_error() {
        let config = RecordingConfig {
            timestamp_format: "%Q".to_owned(),
            ..Default::default()
        };

        assert!(recording_file_name(&config, &color(), now()).is_err());
        assert!(select_topology(
            &color(),
            StorageMode::StreamRate,
            &[],
            &config,
            &stream(),
            now()
        )
        .is_err());
    }
}
