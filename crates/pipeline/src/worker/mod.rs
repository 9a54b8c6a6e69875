//! Workers own a running pipeline on behalf of the supervisor.

#[cfg(feature = "gstreamer")]
mod in_process;
mod subprocess;

use std::{fmt, str::FromStr};

use anyhow::bail;
use async_trait::async_trait;

#[cfg(feature = "gstreamer")]
pub use in_process::*;
pub use subprocess::*;

use crate::description::Topology;

/// Why a worker stopped on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The pipeline reached end of stream.
    EndOfStream,
    /// The launcher process exited with the given code.
    Exited(Option<i32>),
}

#[async_trait]
pub trait FeedWorker: Send {
    fn name(&self) -> &'static str;

    /// Builds the pipeline for `topology` and sets it playing.
    async fn start(&mut self, topology: &Topology) -> anyhow::Result<()>;

    /// Resolves when the pipeline stops by itself. Never resolves before
    /// `start` succeeded. Cancel-safe.
    async fn wait(&mut self) -> anyhow::Result<WorkerExit>;

    /// Tears the pipeline down. Safe to call more than once.
    async fn stop(&mut self) -> anyhow::Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum WorkerKind {
    InProcess,
    Subprocess,
}

impl Default for WorkerKind {
    fn default() -> Self {
        if cfg!(feature = "gstreamer") {
            WorkerKind::InProcess
        } else {
            WorkerKind::Subprocess
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerKind::InProcess => "in-process",
            WorkerKind::Subprocess => "subprocess",
        })
    }
}

impl FromStr for WorkerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "in-process" => WorkerKind::InProcess,
            "subprocess" => WorkerKind::Subprocess,
            other => bail!("invalid worker kind {other}"),
        })
    }
}

pub fn create_worker(kind: WorkerKind, launcher: &str) -> anyhow::Result<Box<dyn FeedWorker>> {
    match kind {
        #[cfg(feature = "gstreamer")]
        WorkerKind::InProcess => Ok(Box::new(InProcessWorker::new())),
        #[cfg(not(feature = "gstreamer"))]
        WorkerKind::InProcess => {
            bail!("in-process worker is unavailable, this build has no gstreamer support")
        }
        WorkerKind::Subprocess => Ok(Box::new(SubprocessWorker::new(launcher))),
    }
}
