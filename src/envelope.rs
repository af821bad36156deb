// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Wire Envelope
//!
//! This module defines the JSON envelope that wraps every published payload,
//! and the [`Message`] trait naming a payload shape with a stable kind
//! string. Routing happens on the transport-level type tag (the AMQP `type`
//! property), which carries the same kind string; the envelope's
//! `MessageType` field is informational.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A payload shape that participates in messaging.
///
/// `KIND` is the stable identifier used for routing: the publisher stamps it
/// on the transport message, the registry keys handler bindings by it, and
/// the dispatcher resolves incoming deliveries with it. It must be unique
/// per payload shape within a process.
pub trait Message {
    const KIND: &'static str;
}

/// The wire wrapper around a payload.
///
/// Serialized shape:
/// `{ "MessageType": "...", "CreatedAt": "<RFC-3339>", "Payload": { ... } }`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope<M> {
    pub message_type: String,
    pub created_at: DateTime<Utc>,
    pub payload: M,
}

impl<M: Message> Envelope<M> {
    /// Wraps a payload, stamping its kind and the current time.
    pub fn new(payload: M) -> Envelope<M> {
        Envelope {
            message_type: M::KIND.to_owned(),
            created_at: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderCreated {
        id: String,
    }

    impl Message for OrderCreated {
        const KIND: &'static str = "OrderCreated";
    }

    #[test]
    fn serializes_with_pascal_case_fields() {
        let envelope = Envelope::new(OrderCreated {
            id: "42".to_owned(),
        });

        let value: Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["MessageType"], "OrderCreated");
        assert_eq!(value["Payload"]["id"], "42");

        // CreatedAt must be an RFC-3339 timestamp
        let created_at = value["CreatedAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created_at).is_ok());
    }

    #[test]
    fn round_trips_payload() {
        let envelope = Envelope::new(OrderCreated {
            id: "42".to_owned(),
        });

        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope<OrderCreated> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.payload, envelope.payload);
        assert_eq!(decoded.message_type, "OrderCreated");
    }
}
