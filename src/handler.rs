// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Handlers
//!
//! This module defines the typed handler contract and the type-erased
//! adapter the registry stores. Erasure happens once at registration time:
//! each binding becomes a closure-like object that knows how to decode the
//! wire envelope into the handler's declared payload type and invoke the
//! handler under the retry policy. Dispatch never searches for types at
//! runtime.

use crate::{
    envelope::{Envelope, Message},
    errors::HandlerError,
    retry::{RetryOutcome, RetryPolicy},
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// Processes messages of exactly one payload shape.
///
/// Implementations report failures through [`HandlerError`]; only the
/// transient kinds are retried by the dispatch layer.
#[async_trait]
pub trait MessageHandler<M>: Send + Sync {
    async fn handle(&self, message: M, token: CancellationToken) -> Result<(), HandlerError>;
}

/// A registered binding with the payload type erased.
///
/// `call` decodes the envelope from the raw body and, if decoding succeeds,
/// invokes the handler through the retry policy. A decode failure is
/// returned without any invocation or retry.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    async fn call(
        &self,
        body: &[u8],
        retry: &RetryPolicy,
        token: CancellationToken,
    ) -> Result<RetryOutcome, serde_json::Error>;
}

/// Adapts a typed [`MessageHandler`] into an [`ErasedHandler`].
pub(crate) struct TypedHandler<M, H> {
    handler: H,
    _payload: PhantomData<fn(M)>,
}

impl<M, H> TypedHandler<M, H> {
    pub(crate) fn new(handler: H) -> TypedHandler<M, H> {
        TypedHandler {
            handler,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<M, H> ErasedHandler for TypedHandler<M, H>
where
    M: Message + DeserializeOwned + Clone + Send + Sync + 'static,
    H: MessageHandler<M> + 'static,
{
    async fn call(
        &self,
        body: &[u8],
        retry: &RetryPolicy,
        token: CancellationToken,
    ) -> Result<RetryOutcome, serde_json::Error> {
        let envelope: Envelope<M> = serde_json::from_slice(body)?;
        let payload = envelope.payload;

        let handler = &self.handler;
        let outcome = retry
            .execute(&token, || {
                let message = payload.clone();
                let token = token.clone();
                async move { handler.handle(message, token).await }
            })
            .await;

        Ok(outcome)
    }
}
