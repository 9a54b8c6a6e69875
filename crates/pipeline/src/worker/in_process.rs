use anyhow::{anyhow, Context};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error, info, trace};

use super::{FeedWorker, WorkerExit};
use crate::{description::Topology, feed::Feed};

/// Runs the pipeline inside this process and watches its bus.
pub struct InProcessWorker {
    feed: Feed,
    bus_stream: Option<gst::bus::BusStream>,
}

impl InProcessWorker {
    pub fn new() -> Self {
        Self {
            feed: Feed::new(),
            bus_stream: None,
        }
    }
}

impl Default for InProcessWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedWorker for InProcessWorker {
    fn name(&self) -> &'static str {
        "in-process"
    }

    async fn start(&mut self, topology: &Topology) -> anyhow::Result<()> {
        let feed = &mut self.feed;

        tokio::task::block_in_place(|| {
            feed.build(topology)?;
            feed.start_feed().context("failed to start the pipeline")
        })?;

        let bus = self.feed.bus().context("pipeline has no bus")?;
        self.bus_stream = Some(bus.stream());

        Ok(())
    }

    async fn wait(&mut self) -> anyhow::Result<WorkerExit> {
        let bus_stream = match &mut self.bus_stream {
            Some(bus_stream) => bus_stream,
            None => futures::future::pending().await,
        };

        loop {
            use gst::MessageView;

            let msg = match bus_stream.next().await {
                Some(msg) => msg,
                None => {
                    debug!("message stream ended");
                    self.bus_stream = None;
                    return Ok(WorkerExit::EndOfStream);
                }
            };

            match msg.view() {
                MessageView::Eos(..) => {
                    info!("end of stream");
                    self.bus_stream = None;
                    return Ok(WorkerExit::EndOfStream);
                }
                MessageView::Error(err) => {
                    error!("error in stream: {:?} ({:?})", err.error(), err.debug());
                    self.bus_stream = None;
                    return Err(anyhow!(err.error()));
                }
                msg => trace!("stream: {msg:?}"),
            }
        }
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.bus_stream = None;

        let feed = &mut self.feed;
        tokio::task::block_in_place(|| feed.stop_feed()).context("error while stopping pipeline")
    }
}
