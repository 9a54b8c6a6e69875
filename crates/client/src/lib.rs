use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A long-running unit of work owned by the main task set. Tasks are started
/// once and run until they finish or `cancel` fires.
#[async_trait]
pub trait Task: Send {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()>;
}
