use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

use torii_broker::{Dispatch, GatewayResult};

/// A typed consumer of stream events for a declared set of channels.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Human-friendly identifier used in logs.
    fn name(&self) -> &str;

    /// Channels this handler wants to receive. Built per instance in the
    /// constructor, never shared between instances.
    fn channels(&self) -> &[String];

    /// Process one event payload received on `channel`.
    async fn handle(&self, payload: &Value, channel: &str) -> GatewayResult<()>;
}

/// Stateless router from channel names to registered handlers.
///
/// All handlers matching a channel run concurrently and the dispatch resolves
/// only once every one of them has returned. A handler error aborts the
/// cycle and propagates to the caller; handlers for other channels are never
/// involved in the first place.
pub struct HandlerDispatcher {
    handlers: Vec<Arc<dyn MessageHandler>>,
}

impl HandlerDispatcher {
    pub fn new(handlers: Vec<Arc<dyn MessageHandler>>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl Dispatch for HandlerDispatcher {
    async fn dispatch(&self, payload: &Value, channel: &str) -> GatewayResult<()> {
        let matching = self
            .handlers
            .iter()
            .filter(|handler| handler.channels().iter().any(|c| c == channel));
        try_join_all(matching.map(|handler| handler.handle(payload, channel))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use torii_broker::GatewayError;

    struct RecordingHandler {
        channels: Vec<String>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(channels: &[&str], fail: bool) -> Self {
            Self {
                channels: channels.iter().map(|c| c.to_string()).collect(),
                calls: AtomicUsize::new(0),
                fail,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        fn name(&self) -> &str {
            "recording"
        }

        fn channels(&self) -> &[String] {
            &self.channels
        }

        async fn handle(&self, _payload: &Value, _channel: &str) -> GatewayResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GatewayError::Transaction("scripted failure".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_every_matching_handler_only() {
        let board = Arc::new(RecordingHandler::new(&["board"], false));
        let orders = Arc::new(RecordingHandler::new(&["orders"], false));
        let both = Arc::new(RecordingHandler::new(&["board", "orders"], false));
        let dispatcher = HandlerDispatcher::new(vec![
            board.clone(),
            orders.clone(),
            both.clone(),
        ]);

        dispatcher
            .dispatch(&json!({}), "board")
            .await
            .expect("dispatch succeeds");
        assert_eq!(board.calls(), 1);
        assert_eq!(orders.calls(), 0);
        assert_eq!(both.calls(), 1);

        dispatcher
            .dispatch(&json!({}), "unknown")
            .await
            .expect("no handler is fine");
        assert_eq!(board.calls(), 1);
        assert_eq!(both.calls(), 1);
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let failing = Arc::new(RecordingHandler::new(&["board"], true));
        let dispatcher = HandlerDispatcher::new(vec![failing.clone()]);
        let err = dispatcher
            .dispatch(&json!({}), "board")
            .await
            .expect_err("dispatch fails");
        assert!(matches!(err, GatewayError::Transaction(_)));
        assert_eq!(failing.calls(), 1);
    }
}
