use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{FeedWorker, WorkerExit};
use crate::description::Topology;

/// How long the launcher gets to push end-of-stream through the pipeline
/// after being interrupted.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands the pipeline description to an external launcher (normally
/// `gst-launch-1.0 -e`). Stopping interrupts the launcher so that it can
/// finalize recordings, and kills it if it does not exit in time.
pub struct SubprocessWorker {
    launcher: String,
    child: Option<Child>,
    stop_timeout: Duration,
}

impl SubprocessWorker {
    pub fn new(launcher: impl Into<String>) -> Self {
        Self {
            launcher: launcher.into(),
            child: None,
            stop_timeout: STOP_TIMEOUT,
        }
    }
}

#[async_trait]
impl FeedWorker for SubprocessWorker {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn start(&mut self, topology: &Topology) -> anyhow::Result<()> {
        self.stop().await?;

        let args = topology.to_launch_args();
        info!("running {} -e {}", self.launcher, args.join(" "));

        let child = Command::new(&self.launcher)
            .arg("-e")
            .args(&args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.launcher))?;

        debug!("launcher started with pid {:?}", child.id());
        self.child = Some(child);

        Ok(())
    }

    async fn wait(&mut self) -> anyhow::Result<WorkerExit> {
        let child = match &mut self.child {
            Some(child) => child,
            None => futures::future::pending().await,
        };

        let status = child
            .wait()
            .await
            .context("failed to wait for launcher")?;

        self.child = None;

        if !status.success() {
            warn!("launcher exited with {status}");
        }

        Ok(WorkerExit::Exited(status.code()))
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => return Ok(()),
        };

        if interrupt(&child) {
            match tokio::time::timeout(self.stop_timeout, child.wait()).await {
                Ok(status) => {
                    let status = status.context("failed to reap launcher")?;
                    debug!("launcher exited with {status} after interrupt");
                    return Ok(());
                }
                Err(_) => warn!(
                    "launcher did not exit within {:?} of interrupt",
                    self.stop_timeout
                ),
            }
        }

        debug!("killing launcher");

        if let Err(err) = child.start_kill() {
            // already exited
            debug!("could not kill launcher: {err}");
        }

        child.wait().await.context("failed to reap launcher")?;

        Ok(())
    }
}

/// Sends SIGINT, which `gst-launch-1.0 -e` turns into end-of-stream. Returns
/// false if the signal could not be sent.
#[cfg(unix)]
fn interrupt(child: &Child) -> bool {
    use nix::{
        sys::signal::{kill, Signal},
        unistd::Pid,
    };

    // no pid once the child has been reaped
    let pid = match child.id() {
        Some(pid) => pid,
        None => return false,
    };

    debug!("interrupting launcher");

    match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        Ok(()) => true,
        Err(err) => {
            debug!("could not interrupt launcher: {err}");
            false
        }
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) -> bool {
    false
}
