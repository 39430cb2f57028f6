// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel Management
//!
//! One connection is shared process-wide; every topology declaration, subscription
//! and publisher opens its own channel on it and owns that channel exclusively.

use crate::{configs::RabbitMQConfigs, errors::PubSubError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Opens the shared AMQP connection described by `cfg`.
///
/// No retry is attempted; callers decide whether a failure aborts startup.
///
/// # Returns
/// * `Ok(Arc<Connection>)` - A connection to share between publishers and subscribers
/// * `Err(PubSubError::ConnectionError)` - The broker could not be reached or refused the login
///
/// # Example
/// ```no_run
/// # async fn run() -> Result<(), pubsub::errors::PubSubError> {
/// let cfg = pubsub::configs::RabbitMQConfigs::default();
/// let conn = pubsub::channel::new_amqp_connection(&cfg).await?;
/// # Ok(())
/// # }
/// ```
pub async fn new_amqp_connection(cfg: &RabbitMQConfigs) -> Result<Arc<Connection>, PubSubError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.connection_name.clone()));

    match Connection::connect_uri(cfg.amqp_uri(), options).await {
        Ok(conn) => {
            debug!(host = %cfg.host, port = cfg.port, "amqp connected");
            Ok(Arc::new(conn))
        }
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(PubSubError::ConnectionError(err.to_string()))
        }
    }
}

/// Opens a fresh channel on `conn`. Channels are never pooled.
pub async fn open_channel(conn: &Connection) -> Result<Channel, PubSubError> {
    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(channel) => {
            debug!(id = channel.id(), "channel created");
            Ok(channel)
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(PubSubError::ChannelError(err.to_string()))
        }
    }
}
