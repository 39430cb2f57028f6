// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! This module ensures queues exist with the flags their lifetime mode requires and
//! that they are bound to an exchange under a routing key.
//!
//! The main entry points are:
//! - `declare_and_bind`: opens a fresh channel, declares one queue and binds it
//! - `declare_dead_letter`: declares the shared dead-letter exchange and its queue
//!
//! Redeclaring a queue with identical flags is a no-op on the broker. Redeclaring it
//! with different flags is refused by the broker and reported as
//! `PubSubError::QueueConflictError`. No retries are performed here.

use crate::{
    channel::open_channel,
    errors::PubSubError,
    exchange::{declare_exchange, ExchangeDefinition},
    queue::{DeclaredQueue, QueueBinding, QueueDefinition, SimpleQueueType},
    routing::{EXCHANGE_PERIL_DLX, QUEUE_PERIL_DLQ},
};
use lapin::{
    options::QueueBindOptions,
    protocol::{AMQPErrorKind, AMQPSoftError},
    types::FieldTable,
    Channel, Connection,
};
use tracing::{debug, error};

/// Opens a channel on `conn`, declares `queue_name` with the flags of
/// `queue_type` and binds it to `exchange` under `key`.
///
/// The returned channel belongs to the caller; it is the channel later used to
/// consume from the queue.
///
/// # Parameters
/// * `conn` - Shared connection to open the channel on
/// * `exchange` - Existing exchange to bind to
/// * `queue_name` - Queue to declare
/// * `key` - Routing key or topic pattern of the binding
/// * `queue_type` - Lifetime mode deciding the durable, auto-delete and exclusive flags
///
/// # Returns
/// * `Ok((Channel, DeclaredQueue))` - The new channel and the declared queue
/// * `Err(PubSubError::QueueConflictError)` - The queue exists with other flags
/// * `Err(PubSubError)` - Channel, declaration or binding failed for another reason
pub async fn declare_and_bind(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    queue_type: SimpleQueueType,
) -> Result<(Channel, DeclaredQueue), PubSubError> {
    let channel = open_channel(conn).await?;

    let def = queue_type.definition(queue_name);
    let queue = declare_queue(&channel, &def).await?;

    bind_queue(
        &channel,
        &QueueBinding::new(queue_name)
            .exchange(exchange)
            .routing_key(key),
    )
    .await?;

    Ok((channel, queue))
}

/// Declares the fanout dead-letter exchange and a durable queue collecting
/// everything routed to it.
pub async fn declare_dead_letter(channel: &Channel) -> Result<DeclaredQueue, PubSubError> {
    declare_exchange(
        channel,
        &ExchangeDefinition::new(EXCHANGE_PERIL_DLX).fanout().durable(),
    )
    .await?;

    let queue = declare_queue(channel, &QueueDefinition::new(QUEUE_PERIL_DLQ).durable()).await?;

    bind_queue(
        channel,
        &QueueBinding::new(QUEUE_PERIL_DLQ).exchange(EXCHANGE_PERIL_DLX),
    )
    .await?;

    Ok(queue)
}

/// Declares the queue described by `def`.
pub async fn declare_queue(
    channel: &Channel,
    def: &QueueDefinition,
) -> Result<DeclaredQueue, PubSubError> {
    debug!("creating queue: {}", def.name);

    match channel
        .queue_declare(&def.name, def.options(), def.arguments())
        .await
    {
        Err(err) if is_conflict(&err) => {
            error!(
                error = err.to_string(),
                queue = %def.name,
                "queue already declared with other flags"
            );
            Err(PubSubError::QueueConflictError(
                def.name.clone(),
                err.to_string(),
            ))
        }
        Err(err) => {
            error!(error = err.to_string(), queue = %def.name, "failure to declare queue");
            Err(PubSubError::DeclareQueueError(
                def.name.clone(),
                err.to_string(),
            ))
        }
        Ok(queue) => {
            debug!(
                messages = queue.message_count(),
                consumers = queue.consumer_count(),
                "queue: {} was created",
                def.name
            );
            Ok(DeclaredQueue::new(
                def,
                queue.message_count(),
                queue.consumer_count(),
            ))
        }
    }
}

/// Binds a queue to an exchange.
pub async fn bind_queue(channel: &Channel, binding: &QueueBinding<'_>) -> Result<(), PubSubError> {
    debug!(
        "binding queue: {} to the exchange: {} with the key: {}",
        binding.queue_name, binding.exchange_name, binding.routing_key
    );

    match channel
        .queue_bind(
            binding.queue_name,
            binding.exchange_name,
            binding.routing_key,
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), "error to bind queue to exchange");

            Err(PubSubError::BindingExchangeToQueueError(
                binding.exchange_name.to_owned(),
                binding.queue_name.to_owned(),
            ))
        }
        _ => Ok(()),
    }
}

/// Whether the broker refused a declaration because the queue already exists
/// with other flags, or is exclusively owned by another connection.
fn is_conflict(err: &lapin::Error) -> bool {
    match err {
        lapin::Error::ProtocolError(amqp) => matches!(
            amqp.kind(),
            AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED)
                | AMQPErrorKind::Soft(AMQPSoftError::RESOURCELOCKED)
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::protocol::AMQPError;

    fn protocol_error(kind: AMQPErrorKind) -> lapin::Error {
        lapin::Error::ProtocolError(AMQPError::new(kind, "refused".into()))
    }

    #[test]
    fn precondition_failed_is_a_conflict() {
        assert!(is_conflict(&protocol_error(AMQPErrorKind::Soft(
            AMQPSoftError::PRECONDITIONFAILED
        ))));
    }

    #[test]
    fn locked_exclusive_queue_is_a_conflict() {
        assert!(is_conflict(&protocol_error(AMQPErrorKind::Soft(
            AMQPSoftError::RESOURCELOCKED
        ))));
    }

    #[test]
    fn other_refusals_are_plain_declare_errors() {
        assert!(!is_conflict(&protocol_error(AMQPErrorKind::Soft(
            AMQPSoftError::ACCESSREFUSED
        ))));
        assert!(!is_conflict(&lapin::Error::ChannelsLimitReached));
    }
}
