// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types
//!
//! This module provides the error types used across the dispatch layer.
//! `AmqpError` covers broker-facing failures (connection, channel, queue
//! declaration, publishing, acknowledgment) plus the configuration errors
//! that must be loud at startup. `HandlerError` is the error a message
//! handler reports back, split into transient kinds (which the retry policy
//! will retry) and fatal kinds (which it will not).

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Configuration mistakes (`UnconfiguredDestination`, `DuplicateBinding`)
/// are included here so they surface as hard failures at startup or publish
/// time rather than being silently swallowed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a consumer to a queue
    #[error("failure to declare consumer on queue `{0}`")]
    BindingConsumerError(String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error serializing a message payload into its wire envelope
    #[error("failure to serialize payload")]
    SerializePayloadError,

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// No destination queue was bound for the message kind at publish time
    #[error("no destination queue bound for message kind `{0}`")]
    UnconfiguredDestination(String),

    /// A handler was already registered for the message kind (strict registry)
    #[error("a handler is already registered for message kind `{0}`")]
    DuplicateBinding(String),
}

/// Error reported by a message handler.
///
/// `Timeout` and `Transport` are transient: the retry policy will re-invoke
/// the handler with backoff. `Fatal` propagates immediately without retry.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler timed out waiting on a downstream dependency
    #[error("handler timed out: {0}")]
    Timeout(String),

    /// A transport or network failure occurred while handling the message
    #[error("transport failure: {0}")]
    Transport(String),

    /// Any other handler failure; retrying will not help
    #[error("{0}")]
    Fatal(String),
}

impl HandlerError {
    /// Whether this failure kind is expected to be resolved by retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Timeout(_) | HandlerError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_transport_are_transient() {
        assert!(HandlerError::Timeout("db".to_owned()).is_transient());
        assert!(HandlerError::Transport("conn reset".to_owned()).is_transient());
        assert!(!HandlerError::Fatal("bad state".to_owned()).is_transient());
    }
}
