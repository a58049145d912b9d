//! Dispatch seam between job creation and the render entry point.

use async_trait::async_trait;

use reels_models::RenderTask;

use crate::error::QueueResult;
use crate::queue::RenderQueue;

/// Delivers render tasks at least once.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, task: &RenderTask) -> QueueResult<()>;
}

#[async_trait]
impl TaskDispatcher for RenderQueue {
    async fn dispatch(&self, task: &RenderTask) -> QueueResult<()> {
        self.enqueue(task).await.map(|_| ())
    }
}
