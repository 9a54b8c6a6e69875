//! Polls the filesystem for the video devices and storage volumes that the
//! ground station knows how to use.

mod config;
mod event;
mod query;
mod task;

pub use config::*;
pub use event::*;
pub use query::*;
pub use task::*;
