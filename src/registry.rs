// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Handler Registry
//!
//! This module provides the mapping from a message kind to the handler that
//! owns it. The registry is populated at startup and read-only afterwards:
//! it is shared behind an `Arc` and resolved concurrently by every consumer
//! loop without locking.
//!
//! Two duplicate-registration policies exist. The default overwrites an
//! earlier binding silently (last registration wins); a strict registry
//! refuses the second registration with `DuplicateBinding`.

use crate::{
    envelope::Message,
    errors::AmqpError,
    handler::{ErasedHandler, MessageHandler, TypedHandler},
};
use serde::de::DeserializeOwned;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// Mapping from message kind to its type-erased handler binding.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn ErasedHandler>>,
    strict: bool,
}

impl HandlerRegistry {
    /// Creates a registry with the overwrite-on-duplicate policy.
    pub fn new() -> HandlerRegistry {
        HandlerRegistry::default()
    }

    /// Creates a registry that rejects duplicate bindings.
    pub fn strict() -> HandlerRegistry {
        HandlerRegistry {
            handlers: HashMap::default(),
            strict: true,
        }
    }

    /// Registers `handler` as the owner of messages of kind `M::KIND`.
    ///
    /// The decode step is bound here, at registration time: the stored
    /// binding deserializes incoming payloads into `M`, the single shape the
    /// handler declares it processes.
    ///
    /// # Errors
    /// `DuplicateBinding` if the registry is strict and the kind is already
    /// bound. The default policy overwrites and always succeeds.
    pub fn register<M, H>(&mut self, handler: H) -> Result<(), AmqpError>
    where
        M: Message + DeserializeOwned + Clone + Send + Sync + 'static,
        H: MessageHandler<M> + 'static,
    {
        if self.strict && self.handlers.contains_key(M::KIND) {
            return Err(AmqpError::DuplicateBinding(M::KIND.to_owned()));
        }

        debug!(kind = M::KIND, "registering message handler");
        self.handlers
            .insert(M::KIND, Arc::new(TypedHandler::new(handler)));

        Ok(())
    }

    /// Pure lookup of the binding for a message kind.
    pub(crate) fn resolve(&self, kind: &str) -> Option<&Arc<dyn ErasedHandler>> {
        self.handlers.get(kind)
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
