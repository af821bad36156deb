// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation of AMQP connections and channels.
//! The worker opens one dedicated channel per consumed queue; the publisher
//! usually shares a single channel created with [`new_amqp_channel`].

use crate::{config::AmqpConfig, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Establishes a connection to the RabbitMQ server.
///
/// The connection is named after `cfg.app_name` so it can be identified in
/// the broker management UI.
pub async fn connect(cfg: &AmqpConfig) -> Result<Arc<Connection>, AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app_name.clone()));

    match Connection::connect(&cfg.uri(), options).await {
        Ok(conn) => {
            debug!("amqp connected");
            Ok(Arc::new(conn))
        }
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError)
        }
    }
}

/// Opens a new channel on an established connection.
pub async fn open_channel(conn: &Connection) -> Result<Arc<Channel>, AmqpError> {
    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(channel) => {
            debug!("channel created");
            Ok(Arc::new(channel))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError)
        }
    }
}

/// Creates a connection and a single channel on it.
///
/// # Parameters
/// * `cfg` - Configuration containing RabbitMQ connection details
///
/// # Returns
/// A tuple containing the connection and channel on success, or an error on
/// failure.
pub async fn new_amqp_channel(
    cfg: &AmqpConfig,
) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    let conn = connect(cfg).await?;
    let channel = open_channel(&conn).await?;
    Ok((conn, channel))
}
