// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Consumption
//!
//! This module processes a single delivery received from a queue: it
//! extracts the transport-level type tag, hands the raw body to the
//! dispatcher, and acknowledges the delivery according to the dispatch
//! outcome. Acknowledgment always happens after the outcome is known;
//! deliveries are never auto-acked before handling completes.
//!
//! Ack policy:
//! - `Handled` acks.
//! - `UnknownType` and `DecodeError` ack: the message is unprocessable and
//!   redelivery would only loop it.
//! - `Failed` nacks without requeue, leaving redelivery to broker-side
//!   dead-lettering where configured.
//! - `Cancelled` nacks with requeue so the message is redelivered after the
//!   process restarts.

use crate::{
    dispatcher::{DispatchOutcome, Dispatcher},
    errors::AmqpError,
    otel,
};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
    protocol::basic::AMQPProperties,
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::borrow::Cow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Dispatches one delivery and settles it with the broker.
///
/// # Parameters
/// * `tracer` - OpenTelemetry tracer for the consumer span
/// * `delivery` - The delivery, owned by the calling loop until settled here
/// * `dispatcher` - Dispatch core resolving and invoking the handler
/// * `token` - Cancellation signal propagated into dispatch
pub(crate) async fn consume(
    tracer: &BoxedTracer,
    delivery: &Delivery,
    dispatcher: &Dispatcher,
    token: &CancellationToken,
) -> Result<(), AmqpError> {
    let type_tag = extract_type_tag(&delivery.properties);

    let (_ctx, mut span) = otel::new_span(&delivery.properties, tracer, &type_tag);

    debug!(
        kind = type_tag,
        queue = delivery.routing_key.to_string(),
        "received delivery"
    );

    let outcome = dispatcher.dispatch(&type_tag, &delivery.data, token).await;

    match outcome {
        DispatchOutcome::Handled => {
            span.set_status(Status::Ok);
            ack(delivery, &mut span).await
        }
        DispatchOutcome::UnknownType | DispatchOutcome::DecodeError => {
            span.set_status(Status::Error {
                description: Cow::from("removing message from queue - reason: unprocessable"),
            });
            ack(delivery, &mut span).await
        }
        DispatchOutcome::Failed => {
            span.set_status(Status::Error {
                description: Cow::from("handler failed"),
            });
            nack(delivery, &mut span, false).await
        }
        DispatchOutcome::Cancelled => nack(delivery, &mut span, true).await,
    }
}

async fn ack(delivery: &Delivery, span: &mut impl Span) -> Result<(), AmqpError> {
    match delivery.ack(BasicAckOptions { multiple: false }).await {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(error = err.to_string(), "error whiling ack msg");
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("error to ack msg"),
            });
            Err(AmqpError::AckMessageError)
        }
    }
}

async fn nack(delivery: &Delivery, span: &mut impl Span, requeue: bool) -> Result<(), AmqpError> {
    match delivery
        .nack(BasicNackOptions {
            multiple: false,
            requeue,
        })
        .await
    {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(error = err.to_string(), "error whiling nack msg");
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("error to nack msg"),
            });
            Err(AmqpError::NackMessageError)
        }
    }
}

/// Reads the message kind from the delivery's `type` property.
fn extract_type_tag(props: &AMQPProperties) -> String {
    match props.kind() {
        Some(value) => value.to_string(),
        None => "".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::ShortString;

    #[test]
    fn reads_type_tag_from_properties() {
        let props = AMQPProperties::default().with_type(ShortString::from("OrderCreated"));
        assert_eq!(extract_type_tag(&props), "OrderCreated");
    }

    #[test]
    fn missing_type_tag_is_empty() {
        let props = AMQPProperties::default();
        assert_eq!(extract_type_tag(&props), "");
    }
}
