use std::{net::IpAddr, path::PathBuf};

use af_pipeline::{worker::WorkerKind, StorageMode, SupportedDevice};
use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "aero-feed")]
#[clap(about = "Streams camera video to a ground control station over RTP/UDP")]
pub struct MainArgs {
    /// IP address of the ground control station
    #[clap(long, short = 'i', value_parser)]
    pub ip: IpAddr,

    /// Write to the detected storage device
    #[clap(long, conflicts_with_all = &["wrs", "test"])]
    pub wr: bool,

    /// Write at the same rate as the stream
    #[clap(long, conflicts_with_all = &["wr", "test"])]
    pub wrs: bool,

    /// Write a test file
    #[clap(long, conflicts_with_all = &["wr", "wrs"])]
    pub test: bool,

    /// The camera profile to run
    #[clap(long, short, value_parser)]
    pub device: Option<SupportedDevice>,

    /// UDP port of the ground control station
    #[clap(long, short, value_parser)]
    pub port: Option<u16>,

    /// How the pipeline is run
    #[clap(long, value_parser)]
    pub worker: Option<WorkerKind>,

    /// The path to the config file
    #[clap(long, short, value_parser)]
    pub config: Option<PathBuf>,
}

impl MainArgs {
    pub fn storage_mode(&self) -> StorageMode {
        if self.wr {
            StorageMode::Device
        } else if self.wrs {
            StorageMode::StreamRate
        } else if self.test {
            StorageMode::Test
        } else {
            StorageMode::None
        }
    }
}
