//! Redis Stream consumer for execution outcomes

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use redis::aio::ConnectionManager;

use crate::{
    config::ExecutionConfig,
    error::AppError,
    execution::{CorrelationToken, ExecutionOutcome},
    services::GradingService,
};

const OUTCOME_FIELD: &str = "outcome";
const RETRY_FIELD: &str = "retry_count";

/// XREADGROUP id for entries never delivered to the group
const NEW_ENTRIES: &str = ">";
/// XREADGROUP id for this consumer's own delivered but unacked entries
const OWN_PENDING: &str = "0";
/// Pending entries inspected per recovery pass
const PENDING_BATCH: usize = 100;

/// One outcome message as read from the result stream
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeMessage {
    pub token: CorrelationToken,
    pub outcome: ExecutionOutcome,
    pub retry_count: u32,
}

/// Decode the fields of a result stream entry
pub fn parse_outcome_message(fields: &HashMap<String, String>) -> Result<OutcomeMessage> {
    let token = CorrelationToken::from_fields(fields).map_err(|e| anyhow!(e))?;

    let raw = fields
        .get(OUTCOME_FIELD)
        .ok_or_else(|| anyhow!("Missing {}", OUTCOME_FIELD))?;
    let outcome: ExecutionOutcome = serde_json::from_str(raw)?;

    let retry_count = fields
        .get(RETRY_FIELD)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    Ok(OutcomeMessage {
        token,
        outcome,
        retry_count,
    })
}

/// What happens to an outcome whose grading failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Can never be graded, ack and forget
    Drop,
    /// Re-queue with the retry count incremented
    Retry,
    /// Retries exhausted, park on the dead letter stream
    DeadLetter,
}

pub fn disposition(error: &AppError, retry_count: u32, max_retries: u32) -> Disposition {
    if !error.is_transient() {
        Disposition::Drop
    } else if retry_count < max_retries {
        Disposition::Retry
    } else {
        Disposition::DeadLetter
    }
}

/// One entry of an extended XPENDING reply
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingEntry {
    message_id: String,
    consumer: String,
    idle_ms: u64,
}

/// Decode `[[message_id, consumer, idle_ms, delivery_count], ...]`
fn parse_pending_reply(reply: &[redis::Value]) -> Result<Vec<PendingEntry>> {
    reply
        .iter()
        .map(|entry| match entry {
            redis::Value::Array(parts) => match parts.as_slice() {
                [
                    redis::Value::BulkString(id),
                    redis::Value::BulkString(consumer),
                    redis::Value::Int(idle),
                    ..,
                ] => Ok(PendingEntry {
                    message_id: String::from_utf8_lossy(id).to_string(),
                    consumer: String::from_utf8_lossy(consumer).to_string(),
                    idle_ms: u64::try_from(*idle).unwrap_or(0),
                }),
                _ => Err(anyhow!("Invalid pending entry")),
            },
            _ => Err(anyhow!("Invalid pending response format")),
        })
        .collect()
}

/// Split an XREADGROUP reply into message id and field map.
/// Returns `None` when the read timed out without a message.
fn parse_stream_reply(result: &[redis::Value]) -> Result<Option<(String, HashMap<String, String>)>> {
    // [[stream_name, [[message_id, [field, value, ...]]]]]
    let stream_data = match result.first() {
        Some(redis::Value::Array(data)) => data,
        None => return Ok(None),
        _ => return Err(anyhow!("Invalid stream response format")),
    };

    let message = match stream_data.get(1) {
        Some(redis::Value::Array(msgs)) => match msgs.first() {
            Some(redis::Value::Array(msg)) => msg,
            None => return Ok(None),
            _ => return Err(anyhow!("No message data")),
        },
        _ => return Err(anyhow!("No messages in response")),
    };

    let message_id = match message.first() {
        Some(redis::Value::BulkString(id)) => String::from_utf8_lossy(id).to_string(),
        _ => return Err(anyhow!("Invalid message ID")),
    };

    // Pending entries trimmed from the stream come back without fields
    let fields: &[redis::Value] = match message.get(1) {
        Some(redis::Value::Array(f)) => f,
        Some(redis::Value::Nil) => &[],
        _ => return Err(anyhow!("No message fields")),
    };

    let mut field_map = HashMap::new();
    for chunk in fields.chunks(2) {
        if let [redis::Value::BulkString(key), redis::Value::BulkString(value)] = chunk {
            field_map.insert(
                String::from_utf8_lossy(key).to_string(),
                String::from_utf8_lossy(value).to_string(),
            );
        }
    }

    Ok(Some((message_id, field_map)))
}

/// Feeds outcomes from the result stream into the grading service
pub struct ResultConsumer {
    config: ExecutionConfig,
    redis: ConnectionManager,
    grading: Arc<GradingService>,
    shutdown: Arc<AtomicBool>,
}

impl ResultConsumer {
    pub fn new(
        config: ExecutionConfig,
        redis: ConnectionManager,
        grading: Arc<GradingService>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            redis,
            grading,
            shutdown,
        }
    }

    /// Initialize consumer group
    pub async fn initialize(&self) -> Result<()> {
        let mut conn = self.redis.clone();

        // Create consumer group (ignore error if already exists)
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.result_stream)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    "Created consumer group '{}' on stream '{}'",
                    self.config.consumer_group,
                    self.config.result_stream
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                tracing::debug!("Consumer group already exists");
            }
            Err(e) => {
                return Err(anyhow!("Failed to create consumer group: {}", e));
            }
        }

        Ok(())
    }

    /// Run the consumer loop until shutdown is requested.
    ///
    /// Pending entries are recovered first, and again after every failed
    /// step, so an outcome read but never acked is not lost.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            "Starting result consumer '{}' in group '{}'",
            self.config.consumer_name,
            self.config.consumer_group
        );

        let mut recovering = true;
        while !self.shutdown.load(Ordering::SeqCst) {
            let step = if recovering {
                self.recover_pending().await
            } else {
                self.process_next(NEW_ENTRIES).await.map(|_| ())
            };

            match step {
                Ok(()) => recovering = false,
                Err(e) => {
                    let err_msg = e.to_string();
                    tracing::error!("Error ingesting execution outcome: {}", err_msg);

                    // If Redis lost the consumer group, re-create it
                    if err_msg.contains("NOGROUP") {
                        tracing::warn!("Consumer group missing, re-initializing...");
                        if let Err(init_err) = self.initialize().await {
                            tracing::error!("Failed to re-initialize consumer group: {}", init_err);
                        }
                    }

                    recovering = true;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        tracing::info!("Result consumer shutting down");
        Ok(())
    }

    /// Take over abandoned entries, then drain this consumer's pending list
    async fn recover_pending(&self) -> Result<()> {
        self.claim_pending_messages().await?;

        let mut recovered = 0usize;
        while !self.shutdown.load(Ordering::SeqCst) && self.process_next(OWN_PENDING).await? {
            recovered += 1;
        }

        if recovered > 0 {
            tracing::info!(recovered, "Recovered pending execution outcomes");
        }
        Ok(())
    }

    /// Claim entries left pending by other consumers for too long
    async fn claim_pending_messages(&self) -> Result<()> {
        let mut conn = self.redis.clone();

        let reply: Vec<redis::Value> = redis::cmd("XPENDING")
            .arg(&self.config.result_stream)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(PENDING_BATCH)
            .query_async(&mut conn)
            .await?;

        for entry in parse_pending_reply(&reply)? {
            if entry.consumer == self.config.consumer_name
                || entry.idle_ms < self.config.claim_min_idle_ms
            {
                continue;
            }

            tracing::info!(
                message_id = %entry.message_id,
                from = %entry.consumer,
                "Claiming abandoned outcome"
            );

            redis::cmd("XCLAIM")
                .arg(&self.config.result_stream)
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_name)
                .arg(self.config.claim_min_idle_ms)
                .arg(&entry.message_id)
                .arg("JUSTID")
                .query_async::<redis::Value>(&mut conn)
                .await?;
        }

        Ok(())
    }

    /// Read and handle at most one message starting at `from_id`.
    /// Returns whether one was read.
    async fn process_next(&self, from_id: &str) -> Result<bool> {
        let mut conn = self.redis.clone();

        let result: Vec<redis::Value> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(self.config.block_timeout_ms)
            .arg("STREAMS")
            .arg(&self.config.result_stream)
            .arg(from_id)
            .query_async(&mut conn)
            .await?;

        let Some((message_id, fields)) = parse_stream_reply(&result)? else {
            return Ok(false);
        };

        let message = match parse_outcome_message(&fields) {
            Ok(message) => message,
            Err(e) => {
                // Malformed entries can never succeed
                tracing::error!(message_id = %message_id, error = %e, "Unreadable outcome message");
                self.send_to_dead_letter(&fields, &e.to_string()).await?;
                self.ack_message(&message_id).await?;
                return Ok(true);
            }
        };

        if let Err(e) = self
            .grading
            .process_execution(message.token, message.outcome.clone())
            .await
        {
            match disposition(&e, message.retry_count, self.config.max_retries) {
                Disposition::Drop => {
                    tracing::warn!(
                        token = %message.token,
                        code = e.error_code(),
                        error = %e,
                        "Dropping outcome that cannot be graded"
                    );
                }
                Disposition::Retry => self.retry_message(&message, &e.to_string()).await?,
                Disposition::DeadLetter => {
                    self.send_to_dead_letter(&fields, &e.to_string()).await?
                }
            }
        }

        self.ack_message(&message_id).await?;
        Ok(true)
    }

    /// Acknowledge a message
    async fn ack_message(&self, message_id: &str) -> Result<()> {
        let mut conn = self.redis.clone();

        redis::cmd("XACK")
            .arg(&self.config.result_stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<i64>(&mut conn)
            .await?;

        Ok(())
    }

    /// Put an outcome back on the stream with an incremented retry count
    async fn retry_message(&self, message: &OutcomeMessage, error: &str) -> Result<()> {
        let mut conn = self.redis.clone();

        tracing::warn!(
            "Retrying outcome {} (attempt {}/{}): {}",
            message.token,
            message.retry_count + 1,
            self.config.max_retries,
            error
        );

        redis::cmd("XADD")
            .arg(&self.config.result_stream)
            .arg("*")
            .arg(CorrelationToken::SOLUTION_FIELD)
            .arg(message.token.solution_id().to_string())
            .arg(CorrelationToken::TEST_CASE_FIELD)
            .arg(message.token.test_case_id().to_string())
            .arg(OUTCOME_FIELD)
            .arg(serde_json::to_string(&message.outcome)?)
            .arg(RETRY_FIELD)
            .arg((message.retry_count + 1).to_string())
            .query_async::<String>(&mut conn)
            .await?;

        Ok(())
    }

    /// Park an entry on the dead letter stream with its fields untouched
    async fn send_to_dead_letter(&self, fields: &HashMap<String, String>, error: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let dead_letter = self.config.dead_letter_stream();

        tracing::error!("Sending outcome to {}: {}", dead_letter, error);

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&dead_letter).arg("*");
        for (key, value) in fields {
            cmd.arg(key).arg(value);
        }
        cmd.arg("error")
            .arg(error)
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339());

        cmd.query_async::<String>(&mut conn).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn fields(token: &CorrelationToken, outcome: &str) -> HashMap<String, String> {
        HashMap::from([
            ("solution_id".to_string(), token.solution_id().to_string()),
            ("test_case_id".to_string(), token.test_case_id().to_string()),
            ("outcome".to_string(), outcome.to_string()),
        ])
    }

    #[test]
    fn test_parse_outcome_message() {
        let token = CorrelationToken::new(Uuid::new_v4(), Uuid::new_v4());
        let mut entry = fields(&token, r#"{"kind":"TIMED_OUT"}"#);
        entry.insert("retry_count".to_string(), "2".to_string());

        let message = parse_outcome_message(&entry).unwrap();
        assert_eq!(message.token, token);
        assert_eq!(message.outcome, ExecutionOutcome::TimedOut);
        assert_eq!(message.retry_count, 2);
    }

    #[test]
    fn test_parse_outcome_message_rejects_bad_entries() {
        let token = CorrelationToken::new(Uuid::new_v4(), Uuid::new_v4());

        let mut missing = fields(&token, "{}");
        missing.remove("outcome");
        assert!(parse_outcome_message(&missing).is_err());

        assert!(parse_outcome_message(&fields(&token, "not json")).is_err());

        let mut no_token = fields(&token, r#"{"kind":"TIMED_OUT"}"#);
        no_token.remove("test_case_id");
        assert!(parse_outcome_message(&no_token).is_err());
    }

    #[test]
    fn test_parse_stream_reply() {
        let bulk = |s: &str| redis::Value::BulkString(s.as_bytes().to_vec());
        let reply = vec![redis::Value::Array(vec![
            bulk("execution_results"),
            redis::Value::Array(vec![redis::Value::Array(vec![
                bulk("1700000000000-0"),
                redis::Value::Array(vec![bulk("outcome"), bulk(r#"{"kind":"TIMED_OUT"}"#)]),
            ])]),
        ])];

        let (id, fields) = parse_stream_reply(&reply).unwrap().unwrap();
        assert_eq!(id, "1700000000000-0");
        assert_eq!(fields["outcome"], r#"{"kind":"TIMED_OUT"}"#);

        assert!(parse_stream_reply(&[]).unwrap().is_none());
    }

    #[test]
    fn test_parse_stream_reply_empty_pending_list() {
        let reply = vec![redis::Value::Array(vec![
            redis::Value::BulkString(b"execution_results".to_vec()),
            redis::Value::Array(vec![]),
        ])];
        assert!(parse_stream_reply(&reply).unwrap().is_none());
    }

    #[test]
    fn test_parse_stream_reply_trimmed_pending_entry() {
        let reply = vec![redis::Value::Array(vec![
            redis::Value::BulkString(b"execution_results".to_vec()),
            redis::Value::Array(vec![redis::Value::Array(vec![
                redis::Value::BulkString(b"1700000000000-3".to_vec()),
                redis::Value::Nil,
            ])]),
        ])];

        let (id, fields) = parse_stream_reply(&reply).unwrap().unwrap();
        assert_eq!(id, "1700000000000-3");
        assert!(fields.is_empty());
        // Ends up dead-lettered rather than stuck in the pending list
        assert!(parse_outcome_message(&fields).is_err());
    }

    #[test]
    fn test_parse_pending_reply() {
        let bulk = |s: &str| redis::Value::BulkString(s.as_bytes().to_vec());
        let reply = vec![
            redis::Value::Array(vec![
                bulk("1700000000000-0"),
                bulk("evaluations-a"),
                redis::Value::Int(75_000),
                redis::Value::Int(1),
            ]),
            redis::Value::Array(vec![
                bulk("1700000000000-1"),
                bulk("evaluations-b"),
                redis::Value::Int(12),
                redis::Value::Int(3),
            ]),
        ];

        let pending = parse_pending_reply(&reply).unwrap();
        assert_eq!(
            pending,
            vec![
                PendingEntry {
                    message_id: "1700000000000-0".to_string(),
                    consumer: "evaluations-a".to_string(),
                    idle_ms: 75_000,
                },
                PendingEntry {
                    message_id: "1700000000000-1".to_string(),
                    consumer: "evaluations-b".to_string(),
                    idle_ms: 12,
                },
            ]
        );

        assert!(parse_pending_reply(&[]).unwrap().is_empty());
        assert!(parse_pending_reply(&[bulk("garbage")]).is_err());
    }

    #[test]
    fn test_ungradeable_outcomes_are_dropped() {
        for error in [
            AppError::solution_not_found(Uuid::new_v4()),
            AppError::Validation("test case belongs to another exercise".into()),
            AppError::IllegalState("finished".into()),
        ] {
            assert_eq!(disposition(&error, 0, 3), Disposition::Drop);
            assert_eq!(disposition(&error, 3, 3), Disposition::Drop);
        }
    }

    #[test]
    fn test_storage_failures_retry_until_exhausted() {
        let error = AppError::Storage("connection reset".into());

        assert_eq!(disposition(&error, 0, 3), Disposition::Retry);
        assert_eq!(disposition(&error, 2, 3), Disposition::Retry);
        assert_eq!(disposition(&error, 3, 3), Disposition::DeadLetter);
        assert_eq!(disposition(&error, 7, 3), Disposition::DeadLetter);

        // No retries configured
        assert_eq!(disposition(&error, 0, 0), Disposition::DeadLetter);
    }
}
