use std::time::Duration;

use anyhow::Context;
use gst::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::description::Topology;

/// How long `stop_feed` waits for end-of-stream to drain through the
/// recording branch before tearing the pipeline down.
const EOS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("pipeline non-existent, or elements not yet linked")]
    NotLinked,

    #[error("failed to set the pipeline to the `{state:?}` state")]
    StateChange {
        state: gst::State,
        #[source]
        source: gst::StateChangeError,
    },
}

/// Owns a GStreamer pipeline and walks it through its states.
#[derive(Default)]
pub struct Feed {
    pipeline: Option<gst::Element>,
    linked: bool,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and links the elements of `topology`. Replaces any pipeline
    /// that was built before.
    pub fn build(&mut self, topology: &Topology) -> anyhow::Result<()> {
        gst::init().context("failed to init gstreamer")?;

        self.stop_feed()?;

        let description = topology.to_launch_string();
        debug!("initializing pipeline with description {description}");

        let pipeline =
            gst::parse_launch(&description).context("failed to initialize the pipeline")?;

        self.pipeline = Some(pipeline);
        self.linked = true;

        Ok(())
    }

    pub fn is_linked(&self) -> bool {
        self.pipeline.is_some() && self.linked
    }

    pub fn start_feed(&self) -> Result<(), FeedError> {
        let pipeline = self.linked_pipeline()?;

        info!("starting video feed");
        set_state(pipeline, gst::State::Paused)?;
        set_state(pipeline, gst::State::Playing)?;

        Ok(())
    }

    /// Holds the pipeline in PAUSED. The supervisor never pauses a feed, but
    /// callers embedding a `Feed` can.
    pub fn pause_feed(&self) -> Result<(), FeedError> {
        let pipeline = self.linked_pipeline()?;

        info!("pausing video feed");
        set_state(pipeline, gst::State::Paused)
    }

    /// Sends end-of-stream so that the recording is finalized, then shuts the
    /// pipeline down. Does nothing when there is no pipeline.
    pub fn stop_feed(&mut self) -> Result<(), FeedError> {
        self.linked = false;

        let pipeline = match self.pipeline.take() {
            Some(pipeline) => pipeline,
            None => return Ok(()),
        };

        info!("stopping video feed");

        let (_, current, _) = pipeline.state(gst::ClockTime::ZERO);

        if current == gst::State::Playing {
            debug!("sending eos to pipeline");

            if pipeline.send_event(gst::event::Eos::new()) {
                if let Some(bus) = pipeline.bus() {
                    let msg = bus.timed_pop_filtered(
                        gst::ClockTime::from_mseconds(EOS_TIMEOUT.as_millis() as u64),
                        &[gst::MessageType::Eos, gst::MessageType::Error],
                    );

                    if msg.is_none() {
                        warn!("pipeline did not reach end of stream in {EOS_TIMEOUT:?}");
                    }
                }
            } else {
                warn!("pipeline did not accept eos");
            }
        }

        debug!("setting pipeline to null state");
        set_state(&pipeline, gst::State::Null)
    }

    pub fn bus(&self) -> Option<gst::Bus> {
        self.pipeline.as_ref().and_then(|p| p.bus())
    }

    fn linked_pipeline(&self) -> Result<&gst::Element, FeedError> {
        match &self.pipeline {
            Some(pipeline) if self.linked => Ok(pipeline),
            _ => Err(FeedError::NotLinked),
        }
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        if let Err(err) = self.stop_feed() {
            warn!("failed to stop feed safely: {err:?}");
        }
    }
}

fn set_state(pipeline: &gst::Element, state: gst::State) -> Result<(), FeedError> {
    pipeline
        .set_state(state)
        .map(|_| ())
        .map_err(|source| FeedError::StateChange { state, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlinked_feed_cannot_start() {
        let mut feed = Feed::new();

        assert!(!feed.is_linked());
        assert!(matches!(feed.start_feed(), Err(FeedError::NotLinked)));
        assert!(matches!(feed.pause_feed(), Err(FeedError::NotLinked)));

        // stopping a feed that never ran is fine, and so is doing it twice
        feed.stop_feed().unwrap();
        feed.stop_feed().unwrap();
    }
}
