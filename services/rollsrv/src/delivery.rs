//! Message delivery

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::roll::OutgoingMessage;

/// Destination for composed roll messages
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<()>;
}

/// Writes each message to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        info!(
            channel = message.channel_id,
            user = message.user_id,
            "{}",
            message.content
        );
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Send a batch in order; a failed message is logged and the rest still go out
///
/// Returns the number of messages delivered.
pub async fn deliver_all(sink: &dyn MessageSink, messages: &[OutgoingMessage]) -> usize {
    let mut delivered = 0;
    for message in messages {
        match sink.send(message).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Failed to deliver roll for user {}: {}", message.user_id, e),
        }
    }
    delivered
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::RollSrvError;
    use tracing_test::traced_test;

    struct FlakySink {
        fail_user: u64,
        inner: MemorySink,
    }

    #[async_trait]
    impl MessageSink for FlakySink {
        async fn send(&self, message: &OutgoingMessage) -> Result<()> {
            if message.user_id == self.fail_user {
                return Err(RollSrvError::delivery("channel unavailable"));
            }
            self.inner.send(message).await
        }
    }

    fn message(user_id: u64) -> OutgoingMessage {
        OutgoingMessage {
            channel_id: 1,
            user_id,
            number: 5,
            content: format!("<@{}> 5", user_id),
        }
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        let delivered = deliver_all(&sink, &[message(1), message(2)]).await;

        assert_eq!(delivered, 2);
        let users: Vec<_> = sink.messages().iter().map(|m| m.user_id).collect();
        assert_eq!(users, vec![1, 2]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_delivery_does_not_stop_batch() {
        let sink = FlakySink {
            fail_user: 2,
            inner: MemorySink::new(),
        };
        let delivered = deliver_all(&sink, &[message(1), message(2), message(3)]).await;

        assert_eq!(delivered, 2);
        assert_eq!(sink.inner.len(), 2);
        assert!(logs_contain("Failed to deliver roll for user 2"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_log_sink_writes_content() {
        LogSink.send(&message(9)).await.unwrap();
        assert!(logs_contain("<@9> 5"));
    }
}
