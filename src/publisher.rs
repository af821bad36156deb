// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! This module sends envelope-wrapped messages to their configured
//! destination queues. Destinations are bound per message kind before
//! publishing; publishing an unbound kind is a configuration error and
//! fails loudly. Messages go to the default exchange with the queue name as
//! routing key, marked persistent, with the kind stamped on the `type`
//! property and the current trace context injected into the headers.

use crate::{
    envelope::{Envelope, Message},
    errors::AmqpError,
    otel::AmqpTracePropagator,
};
use chrono::Utc;
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel,
};
use opentelemetry::{global, Context};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::error;
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Persistent delivery mode, so messages survive a broker restart
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Mapping from message kind to its destination queue.
#[derive(Default)]
struct DestinationTable {
    queues: HashMap<&'static str, String>,
}

impl DestinationTable {
    fn bind(&mut self, kind: &'static str, queue: &str) {
        self.queues.insert(kind, queue.to_owned());
    }

    fn resolve(&self, kind: &str) -> Result<&str, AmqpError> {
        match self.queues.get(kind) {
            Some(queue) => Ok(queue),
            None => {
                error!(kind, "no destination queue bound for message kind");
                Err(AmqpError::UnconfiguredDestination(kind.to_owned()))
            }
        }
    }
}

/// Publishes messages to RabbitMQ queues by message kind.
pub struct Publisher {
    channel: Arc<Channel>,
    destinations: DestinationTable,
}

impl Publisher {
    pub fn new(channel: Arc<Channel>) -> Publisher {
        Publisher {
            channel,
            destinations: DestinationTable::default(),
        }
    }

    /// Binds messages of kind `M::KIND` to a destination queue.
    pub fn bind<M: Message>(mut self, queue: &str) -> Self {
        self.destinations.bind(M::KIND, queue);
        self
    }

    /// Publishes a message to its bound destination queue.
    ///
    /// The destination queue is declared durably first (idempotent), then
    /// the message is sent wrapped in its wire envelope.
    ///
    /// # Errors
    /// `UnconfiguredDestination` if no queue was bound for the message kind;
    /// `SerializePayloadError` or `PublishingError` on the respective
    /// failures.
    pub async fn publish<M>(&self, ctx: &Context, message: &M) -> Result<(), AmqpError>
    where
        M: Message + Serialize,
    {
        let queue = self.destinations.resolve(M::KIND)?;

        let envelope = Envelope {
            message_type: M::KIND.to_owned(),
            created_at: Utc::now(),
            payload: message,
        };
        let body = serde_json::to_vec(&envelope).map_err(|err| {
            error!(
                kind = M::KIND,
                error = err.to_string(),
                "error serializing payload"
            );
            AmqpError::SerializePayloadError
        })?;

        if let Err(err) = self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
        {
            error!(
                queue,
                error = err.to_string(),
                "error declaring destination queue"
            );
            return Err(AmqpError::DeclareQueueError(queue.to_owned()));
        }

        let mut btree = BTreeMap::<ShortString, AMQPValue>::default();
        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(ctx, &mut AmqpTracePropagator::new(&mut btree))
        });

        match self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &body,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_type(ShortString::from(M::KIND))
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(btree)),
            )
            .await
        {
            Err(err) => {
                error!(
                    kind = M::KIND,
                    error = err.to_string(),
                    "error publishing message"
                );
                Err(AmqpError::PublishingError)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bound_destination() {
        let mut table = DestinationTable::default();
        table.bind("OrderCreated", "orders");

        assert_eq!(table.resolve("OrderCreated").unwrap(), "orders");
    }

    #[test]
    fn unbound_kind_is_a_configuration_error() {
        let table = DestinationTable::default();

        let err = table.resolve("OrderCreated").unwrap_err();
        assert_eq!(
            err,
            AmqpError::UnconfiguredDestination("OrderCreated".to_owned())
        );
    }

    #[test]
    fn rebinding_overwrites_the_destination() {
        let mut table = DestinationTable::default();
        table.bind("OrderCreated", "orders");
        table.bind("OrderCreated", "orders-v2");

        assert_eq!(table.resolve("OrderCreated").unwrap(), "orders-v2");
    }
}
