// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Dispatcher
//!
//! This module turns a raw delivery into exactly one handler invocation, or
//! a logged no-op. Dispatch resolves the transport-level type tag against
//! the registry, decodes the payload into the handler's declared shape, and
//! invokes the handler under the retry policy.
//!
//! Unroutable and undecodable deliveries are normal, non-fatal outcomes:
//! they are logged and reported, never allowed to crash a consumer loop.
//! The dispatcher itself never acknowledges or rejects a delivery; the
//! consumer loop owns that decision.

use crate::{
    registry::HandlerRegistry,
    retry::{RetryOutcome, RetryPolicy},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Terminal result of dispatching one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler processed the message successfully
    Handled,
    /// The type tag matched no registered binding; nothing was invoked
    UnknownType,
    /// The body did not decode into the handler's payload shape; nothing was
    /// invoked and nothing is retried
    DecodeError,
    /// The handler failed non-transiently, or exhausted its retry attempts
    Failed,
    /// Cancellation fired while waiting out a retry backoff
    Cancelled,
}

/// Routes deliveries to their registered handlers.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    retry: RetryPolicy,
}

impl Dispatcher {
    /// Creates a dispatcher over a finished registry.
    ///
    /// The registry is taken by `Arc` and never mutated: construction
    /// happens-before every concurrent `dispatch` call.
    pub fn new(registry: Arc<HandlerRegistry>, retry: RetryPolicy) -> Dispatcher {
        Dispatcher { registry, retry }
    }

    /// Dispatches one delivery.
    ///
    /// # Parameters
    /// * `type_tag` - Transport-level message kind from the delivery properties
    /// * `body` - Raw envelope bytes
    /// * `token` - Cancellation signal, propagated into retry backoff
    pub async fn dispatch(
        &self,
        type_tag: &str,
        body: &[u8],
        token: &CancellationToken,
    ) -> DispatchOutcome {
        if type_tag.is_empty() {
            warn!("delivery carries no type tag");
            return DispatchOutcome::UnknownType;
        }

        let Some(binding) = self.registry.resolve(type_tag) else {
            warn!(kind = type_tag, "no handler registered for message kind");
            return DispatchOutcome::UnknownType;
        };

        match binding.call(body, &self.retry, token.clone()).await {
            Err(err) => {
                warn!(
                    kind = type_tag,
                    error = err.to_string(),
                    "failure to decode payload"
                );
                DispatchOutcome::DecodeError
            }
            Ok(RetryOutcome::Success) => {
                debug!(kind = type_tag, "message successfully processed");
                DispatchOutcome::Handled
            }
            Ok(RetryOutcome::Failed(err)) => {
                error!(
                    kind = type_tag,
                    error = err.to_string(),
                    "handler failed, not retryable"
                );
                DispatchOutcome::Failed
            }
            Ok(RetryOutcome::Exhausted(err)) => {
                error!(
                    kind = type_tag,
                    error = err.to_string(),
                    "handler failed after exhausting retry attempts"
                );
                DispatchOutcome::Failed
            }
            Ok(RetryOutcome::Aborted) => {
                warn!(kind = type_tag, "dispatch cancelled during retry backoff");
                DispatchOutcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        envelope::{Envelope, Message},
        errors::HandlerError,
        handler::MessageHandler,
    };
    use async_trait::async_trait;
    use mockall::mock;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderCreated {
        id: String,
    }

    impl Message for OrderCreated {
        const KIND: &'static str = "OrderCreated";
    }

    mock! {
        OrderCreatedHandler {}

        #[async_trait]
        impl MessageHandler<OrderCreated> for OrderCreatedHandler {
            async fn handle(
                &self,
                message: OrderCreated,
                token: CancellationToken,
            ) -> Result<(), HandlerError>;
        }
    }

    fn dispatcher_with(handler: MockOrderCreatedHandler, retry: RetryPolicy) -> Dispatcher {
        let mut registry = HandlerRegistry::new();
        registry.register::<OrderCreated, _>(handler).unwrap();
        Dispatcher::new(Arc::new(registry), retry)
    }

    fn valid_body() -> Vec<u8> {
        let envelope = Envelope::new(OrderCreated {
            id: "42".to_owned(),
        });
        serde_json::to_vec(&envelope).unwrap()
    }

    #[tokio::test]
    async fn dispatches_to_the_registered_handler_once() {
        let mut handler = MockOrderCreatedHandler::new();
        handler
            .expect_handle()
            .withf(|message, _| message.id == "42")
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = dispatcher_with(handler, RetryPolicy::default());
        let token = CancellationToken::new();

        let outcome = dispatcher
            .dispatch(OrderCreated::KIND, &valid_body(), &token)
            .await;

        assert_eq!(outcome, DispatchOutcome::Handled);
    }

    #[tokio::test]
    async fn unknown_kind_invokes_nothing() {
        let registry = HandlerRegistry::new();
        let dispatcher = Dispatcher::new(Arc::new(registry), RetryPolicy::default());
        let token = CancellationToken::new();

        let outcome = dispatcher
            .dispatch("GhostType", &valid_body(), &token)
            .await;

        assert_eq!(outcome, DispatchOutcome::UnknownType);
    }

    #[tokio::test]
    async fn missing_type_tag_is_unroutable() {
        let mut handler = MockOrderCreatedHandler::new();
        handler.expect_handle().times(0);

        let dispatcher = dispatcher_with(handler, RetryPolicy::default());
        let token = CancellationToken::new();

        let outcome = dispatcher.dispatch("", &valid_body(), &token).await;

        assert_eq!(outcome, DispatchOutcome::UnknownType);
    }

    #[tokio::test]
    async fn malformed_body_is_not_handled_and_not_retried() {
        let mut handler = MockOrderCreatedHandler::new();
        handler.expect_handle().times(0);

        let dispatcher = dispatcher_with(handler, RetryPolicy::default());
        let token = CancellationToken::new();

        let outcome = dispatcher
            .dispatch(OrderCreated::KIND, b"not json at all", &token)
            .await;

        assert_eq!(outcome, DispatchOutcome::DecodeError);
    }

    #[tokio::test]
    async fn fatal_handler_error_fails_without_retry() {
        let mut handler = MockOrderCreatedHandler::new();
        handler
            .expect_handle()
            .times(1)
            .returning(|_, _| Err(HandlerError::Fatal("unprocessable".to_owned())));

        let dispatcher = dispatcher_with(handler, RetryPolicy::default());
        let token = CancellationToken::new();

        let outcome = dispatcher
            .dispatch(OrderCreated::KIND, &valid_body(), &token)
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retry_up_to_the_bound() {
        let mut handler = MockOrderCreatedHandler::new();
        handler
            .expect_handle()
            .times(3)
            .returning(|_, _| Err(HandlerError::Transport("broker gone".to_owned())));

        let retry = RetryPolicy::new(3, Duration::from_millis(100), 2);
        let dispatcher = dispatcher_with(handler, retry);
        let token = CancellationToken::new();

        let outcome = dispatcher
            .dispatch(OrderCreated::KIND, &valid_body(), &token)
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success_is_handled() {
        let mut handler = MockOrderCreatedHandler::new();
        let mut failures = 2;
        handler.expect_handle().times(3).returning(move |_, _| {
            if failures > 0 {
                failures -= 1;
                Err(HandlerError::Timeout("slow downstream".to_owned()))
            } else {
                Ok(())
            }
        });

        let retry = RetryPolicy::new(3, Duration::from_millis(100), 2);
        let dispatcher = dispatcher_with(handler, retry);
        let token = CancellationToken::new();

        let outcome = dispatcher
            .dispatch(OrderCreated::KIND, &valid_body(), &token)
            .await;

        assert_eq!(outcome, DispatchOutcome::Handled);
    }
}
