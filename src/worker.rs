// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Worker
//!
//! This module owns the broker-facing lifecycle of the consume side: one
//! loop per declared queue, each on its own dedicated channel, all fed into
//! a shared [`Dispatcher`]. Queues are declared idempotently before
//! consumption starts; if startup fails partway, every channel opened so
//! far is closed before the error propagates.
//!
//! Shutdown is driven by a single [`CancellationToken`]: each loop stops
//! taking deliveries, finishes its in-flight dispatch, and closes its
//! channel; the shared connection closes last, after every loop has
//! stopped. A panicking loop is isolated to its own task and never takes
//! down the sibling queues.

use crate::{
    channel::{connect, open_channel},
    config::AmqpConfig,
    consumer::consume,
    dispatcher::Dispatcher,
    errors::AmqpError,
    queue::QueueDefinition,
};
use futures_util::{future::join_all, StreamExt};
use lapin::{
    options::{BasicConsumeOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, Consumer,
};
use opentelemetry::global;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const CLOSE_REPLY_CODE: u16 = 200;

/// Runs the consumer loops for a set of declared queues.
pub struct Worker {
    config: AmqpConfig,
    dispatcher: Arc<Dispatcher>,
    queues: Vec<QueueDefinition>,
}

impl Worker {
    pub fn new(config: AmqpConfig, dispatcher: Arc<Dispatcher>) -> Worker {
        Worker {
            config,
            dispatcher,
            queues: vec![],
        }
    }

    /// Adds a queue for this worker to consume from.
    pub fn queue(mut self, def: QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    /// Connects, starts one consumer loop per declared queue, and blocks
    /// until `token` is cancelled and every loop has shut down.
    ///
    /// # Errors
    /// Startup errors (connect, declare, consume) propagate after the
    /// channels opened so far are closed. `InternalError` is returned when
    /// a consumer loop task panicked; the remaining loops still run to
    /// completion and the connection is closed either way.
    pub async fn run(&self, token: CancellationToken) -> Result<(), AmqpError> {
        let connection = connect(&self.config).await?;

        let mut started = vec![];
        for def in &self.queues {
            match start_consumer(&connection, def).await {
                Ok((channel, consumer)) => started.push((def.clone(), channel, consumer)),
                Err(err) => {
                    close_channels(started.iter().map(|(_, channel, _)| channel)).await;
                    close_connection(&connection).await;
                    return Err(err);
                }
            }
        }

        let mut loops = vec![];
        for (def, channel, consumer) in started {
            let dispatcher = self.dispatcher.clone();
            let token = token.clone();
            loops.push(tokio::spawn(consumer_loop(
                def, channel, consumer, dispatcher, token,
            )));
        }

        let mut failed = false;
        for joined in join_all(loops).await {
            if let Err(err) = joined {
                error!(error = err.to_string(), "consumer loop task failed");
                failed = true;
            }
        }

        close_connection(&connection).await;

        if failed {
            return Err(AmqpError::InternalError);
        }

        Ok(())
    }
}

/// Opens a dedicated channel, declares the queue idempotently, and creates
/// the consumer.
async fn start_consumer(
    connection: &Connection,
    def: &QueueDefinition,
) -> Result<(Arc<Channel>, Consumer), AmqpError> {
    let channel = open_channel(connection).await?;

    if let Err(err) = channel
        .queue_declare(
            &def.name,
            QueueDeclareOptions {
                durable: def.durable,
                exclusive: def.exclusive,
                auto_delete: def.delete,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
    {
        error!(
            queue = def.name,
            error = err.to_string(),
            "error to declare the queue"
        );
        close_channels([&channel]).await;
        return Err(AmqpError::DeclareQueueError(def.name.clone()));
    }

    let consumer = match channel
        .basic_consume(
            &def.name,
            &format!("{}-consumer", def.name),
            BasicConsumeOptions {
                no_local: false,
                no_ack: false,
                exclusive: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(
                queue = def.name,
                error = err.to_string(),
                "error to create the consumer"
            );
            close_channels([&channel]).await;
            return Err(AmqpError::BindingConsumerError(def.name.clone()));
        }
    };

    debug!(queue = def.name, "consumer started");
    Ok((channel, consumer))
}

/// Drives one queue until cancellation or stream end, then closes the
/// channel this loop owns.
async fn consumer_loop(
    def: QueueDefinition,
    channel: Arc<Channel>,
    mut consumer: Consumer,
    dispatcher: Arc<Dispatcher>,
    token: CancellationToken,
) {
    let tracer = global::tracer("amqp consumer");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(queue = def.name, "consumer loop shutting down");
                break;
            }
            next = consumer.next() => match next {
                Some(Ok(delivery)) => {
                    if def.concurrent {
                        let dispatcher = dispatcher.clone();
                        let token = token.clone();
                        tokio::spawn(async move {
                            let tracer = global::tracer("amqp consumer");
                            if let Err(err) = consume(&tracer, &delivery, &dispatcher, &token).await {
                                error!(error = err.to_string(), "error consume msg");
                            }
                        });
                    } else if let Err(err) = consume(&tracer, &delivery, &dispatcher, &token).await {
                        error!(error = err.to_string(), "error consume msg");
                    }
                }
                Some(Err(err)) => error!(error = err.to_string(), "errors consume msg"),
                None => {
                    warn!(queue = def.name, "consumer stream closed by broker");
                    break;
                }
            }
        }
    }

    close_channels([&channel]).await;
}

async fn close_channels<'c>(channels: impl IntoIterator<Item = &'c Arc<Channel>>) {
    for channel in channels {
        if let Err(err) = channel.close(CLOSE_REPLY_CODE, "shutdown").await {
            warn!(error = err.to_string(), "error closing channel");
        }
    }
}

async fn close_connection(connection: &Connection) {
    if let Err(err) = connection.close(CLOSE_REPLY_CODE, "shutdown").await {
        warn!(error = err.to_string(), "error closing connection");
    }
}
