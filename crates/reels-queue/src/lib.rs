//! Redis Streams task queue.
//!
//! Render tasks (`{jobId}` messages) are delivered at least once through a
//! consumer group. Failed deliveries are retried and eventually parked in a
//! dead letter stream.

pub mod dispatcher;
pub mod error;
pub mod queue;

pub use dispatcher::TaskDispatcher;
pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, RenderQueue};
