//! Render task queue using Redis Streams.

use std::collections::HashMap;
use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use reels_models::RenderTask;

use crate::error::{QueueError, QueueResult};

/// Stream field holding the serialized task.
const TASK_FIELD: &str = "task";

/// How long a dispatched task blocks duplicate dispatches.
const DEDUP_TTL_SECS: u64 = 3600;

/// How long a delivery's retry counter is kept.
const RETRY_TTL_SECS: i64 = 86400;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for render tasks
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Max retries before DLQ
    pub max_retries: u32,
    /// Idle time after which another worker may claim a delivery
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "reels:render".to_string(),
            consumer_group: "reels:renderers".to_string(),
            dlq_stream_name: "reels:render:dlq".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(900),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            visibility_timeout: std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
        }
    }
}

/// Render task queue client.
pub struct RenderQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RenderQueue {
    /// Create a new queue client. Does not connect until first use.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Create the consumer group (and stream) if missing.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a render task.
    ///
    /// Returns the stream message id, or `None` when the same job was
    /// dispatched recently and is still pending.
    pub async fn enqueue(&self, task: &RenderTask) -> QueueResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(task)?;
        let dedup_key = dedup_key(task);

        // SET NX claims the dedup slot atomically
        let claimed: bool = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(DEDUP_TTL_SECS)
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();
        if !claimed {
            warn!(job_id = %task.job_id, "Duplicate dispatch ignored");
            return Ok(None);
        }

        let message_id: String = match redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg(TASK_FIELD)
            .arg(&payload)
            .query_async(&mut conn)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let _: Result<(), _> = conn.del(&dedup_key).await;
                return Err(QueueError::enqueue_failed(e.to_string()));
            }
        };

        info!(job_id = %task.job_id, message_id = %message_id, "Enqueued render task");
        Ok(Some(message_id))
    }

    /// Consume new deliveries for this consumer.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let entries = reply.keys.into_iter().flat_map(|k| k.ids).collect();
        Ok(self.decode_entries(entries, "consumed").await)
    }

    /// Claim deliveries idle longer than `min_idle_ms` (crashed workers).
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderTask)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let reply: redis::streams::StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        Ok(self.decode_entries(reply.claimed, "claimed").await)
    }

    /// Acknowledge and remove a delivery.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        let _: Result<(), _> = conn.del(retry_key(message_id)).await;

        debug!("Acknowledged delivery: {}", message_id);
        Ok(())
    }

    /// Park a delivery in the dead letter stream and release its job for re-dispatch.
    pub async fn dlq(&self, message_id: &str, task: &RenderTask, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(task)?;
        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg(TASK_FIELD)
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;
        self.clear_dedup(task).await?;

        warn!(job_id = %task.job_id, "Moved render task to DLQ: {}", error);
        Ok(())
    }

    /// Allow the job to be dispatched again.
    pub async fn clear_dedup(&self, task: &RenderTask) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(dedup_key(task)).await?;
        Ok(())
    }

    /// Increment and return the retry count of a delivery.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = retry_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, RETRY_TTL_SECS).await?;
        Ok(count)
    }

    /// Pending stream length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }

    /// Dead letter stream length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.xlen(&self.config.dlq_stream_name).await?)
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Decode stream entries; malformed ones are acked so they never return.
    async fn decode_entries(
        &self,
        entries: Vec<redis::streams::StreamId>,
        action: &str,
    ) -> Vec<(String, RenderTask)> {
        let mut tasks = Vec::with_capacity(entries.len());
        for entry in entries {
            match decode_task(&entry.map) {
                Ok(task) => {
                    debug!(job_id = %task.job_id, message_id = %entry.id, "Render task {}", action);
                    tasks.push((entry.id, task));
                }
                Err(e) => {
                    warn!(message_id = %entry.id, "Dropping delivery: {}", e);
                    if let Err(ack_err) = self.ack(&entry.id).await {
                        warn!(message_id = %entry.id, "Failed to ack malformed delivery: {}", ack_err);
                    }
                }
            }
        }
        tasks
    }
}

fn dedup_key(task: &RenderTask) -> String {
    format!("reels:dedup:{}", task.idempotency_key())
}

fn retry_key(message_id: &str) -> String {
    format!("reels:retry:{}", message_id)
}

/// Decode the task field of one stream entry.
fn decode_task(fields: &HashMap<String, redis::Value>) -> QueueResult<RenderTask> {
    let bytes = match fields.get(TASK_FIELD) {
        Some(redis::Value::BulkString(bytes)) => bytes.as_slice(),
        Some(redis::Value::SimpleString(s)) => s.as_bytes(),
        Some(other) => return Err(QueueError::malformed_task(format!("unexpected value {:?}", other))),
        None => return Err(QueueError::malformed_task("missing task field")),
    };
    let task: RenderTask = serde_json::from_slice(bytes)?;
    if task.job_id.as_str().is_empty() {
        return Err(QueueError::malformed_task("empty jobId"));
    }
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reels_models::JobId;
    use serial_test::serial;

    fn fields(value: redis::Value) -> HashMap<String, redis::Value> {
        HashMap::from([(TASK_FIELD.to_string(), value)])
    }

    #[test]
    fn test_decode_task() {
        let entry = fields(redis::Value::BulkString(br#"{"jobId":"job-9"}"#.to_vec()));
        let task = decode_task(&entry).unwrap();
        assert_eq!(task.job_id, JobId::from_string("job-9"));
    }

    #[test]
    fn test_decode_rejects_missing_or_empty_job() {
        assert!(matches!(decode_task(&HashMap::new()), Err(QueueError::MalformedTask(_))));

        let empty = fields(redis::Value::BulkString(br#"{"jobId":""}"#.to_vec()));
        assert!(matches!(decode_task(&empty), Err(QueueError::MalformedTask(_))));

        let garbage = fields(redis::Value::BulkString(b"not json".to_vec()));
        assert!(matches!(decode_task(&garbage), Err(QueueError::Json(_))));
    }

    #[test]
    fn test_keys() {
        let task = RenderTask::new(JobId::from_string("abc"));
        assert_eq!(dedup_key(&task), "reels:dedup:render:abc");
        assert_eq!(retry_key("1700000000000-0"), "reels:retry:1700000000000-0");
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("QUEUE_MAX_RETRIES", "5");
        std::env::set_var("QUEUE_STREAM", "reels:test");
        std::env::remove_var("QUEUE_VISIBILITY_TIMEOUT");

        let config = QueueConfig::from_env();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.stream_name, "reels:test");
        assert_eq!(config.visibility_timeout, Duration::from_secs(900));

        std::env::remove_var("QUEUE_MAX_RETRIES");
        std::env::remove_var("QUEUE_STREAM");
    }

    #[test]
    #[serial]
    fn test_config_ignores_bad_numbers() {
        std::env::set_var("QUEUE_MAX_RETRIES", "many");
        assert_eq!(QueueConfig::from_env().max_retries, 3);
        std::env::remove_var("QUEUE_MAX_RETRIES");
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_enqueue_dedups_and_consumes() {
        let config = QueueConfig {
            stream_name: format!("reels:test:{}", JobId::new()),
            ..QueueConfig::default()
        };
        let queue = RenderQueue::new(config).unwrap();
        queue.init().await.unwrap();

        let task = RenderTask::new(JobId::new());
        assert!(queue.enqueue(&task).await.unwrap().is_some());
        assert!(queue.enqueue(&task).await.unwrap().is_none());

        let delivered = queue.consume("test-consumer", 100, 10).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, task);

        queue.ack(&delivered[0].0).await.unwrap();
        queue.clear_dedup(&task).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}
