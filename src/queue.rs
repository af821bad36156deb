// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! This module provides the declaration of a consumed queue. Each definition
//! owns one consumer loop; the queue is declared idempotently on the broker
//! before consumption starts.

/// Declaration of a queue the worker consumes from.
///
/// Queues are durable by default, matching the at-least-once delivery model
/// this layer assumes from the broker. Dispatch within a queue is serial
/// unless [`concurrent`](QueueDefinition::concurrent) is opted into.
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) exclusive: bool,
    pub(crate) delete: bool,
    pub(crate) concurrent: bool,
}

impl QueueDefinition {
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            durable: true,
            exclusive: false,
            delete: false,
            concurrent: false,
        }
    }

    /// Declares the queue non-durable. Messages will not survive a broker
    /// restart.
    pub fn transient(mut self) -> Self {
        self.durable = false;
        self
    }

    /// Makes the queue exclusive to the connection.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn auto_delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Opts this queue into per-message concurrent dispatch.
    ///
    /// Each delivery is handled in its own task. This forfeits in-order
    /// processing within the queue, and dispatches still in flight at
    /// shutdown may be dropped when the connection closes.
    pub fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durable_and_serial_by_default() {
        let def = QueueDefinition::new("orders");
        assert_eq!(def.name(), "orders");
        assert!(def.durable);
        assert!(!def.concurrent);
        assert!(!def.exclusive);
        assert!(!def.delete);
    }

    #[test]
    fn builders_toggle_flags() {
        let def = QueueDefinition::new("orders")
            .transient()
            .exclusive()
            .auto_delete()
            .concurrent();

        assert!(!def.durable);
        assert!(def.exclusive);
        assert!(def.delete);
        assert!(def.concurrent);
    }
}
