//! Builds the GStreamer pipelines that carry camera video to the ground
//! station and runs them.

mod config;
pub mod description;
#[cfg(feature = "gstreamer")]
pub mod feed;
mod profile;
pub mod topology;
pub mod worker;

pub use config::*;
pub use profile::*;
pub use topology::{select_topology, StorageMode, StreamTarget};
