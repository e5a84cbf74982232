//! Send capability towards the external executor

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::{
    error::DispatchError,
    execution::{CorrelationToken, ExecutionRequest},
};

/// Fire-and-forget channel to the executor. Implementations must not wait
/// for the outcome; it arrives later through the result consumer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionRequestSender: Send + Sync {
    async fn request_execution(
        &self,
        request: ExecutionRequest,
        token: CorrelationToken,
    ) -> Result<(), DispatchError>;
}

/// Appends execution requests to a Redis Stream
pub struct RedisExecutionSender {
    redis: ConnectionManager,
    stream: String,
}

impl RedisExecutionSender {
    pub fn new(redis: ConnectionManager, stream: impl Into<String>) -> Self {
        Self {
            redis,
            stream: stream.into(),
        }
    }
}

#[async_trait]
impl ExecutionRequestSender for RedisExecutionSender {
    async fn request_execution(
        &self,
        request: ExecutionRequest,
        token: CorrelationToken,
    ) -> Result<(), DispatchError> {
        let payload = serde_json::to_string(&request)?;
        let mut conn = self.redis.clone();

        let stream_id: String = redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg(CorrelationToken::SOLUTION_FIELD)
            .arg(token.solution_id().to_string())
            .arg(CorrelationToken::TEST_CASE_FIELD)
            .arg(token.test_case_id().to_string())
            .arg("payload")
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(
            token = %token,
            stream_id = %stream_id,
            "Execution request queued"
        );

        Ok(())
    }
}
