// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Subscriber
//!
//! `subscribe` makes sure the queue exists and is bound, registers a manual-ack
//! consumer on a dedicated channel and spawns one task running the consumption
//! loop. The returned `Subscription` stops that task on demand; without it the
//! loop runs until the connection or channel goes away.

use crate::{
    codec::{BincodeCodec, Decoder, JsonCodec},
    consumer::{consume, InboundDelivery, MessageHandler},
    errors::PubSubError,
    queue::SimpleQueueType,
    topology::declare_and_bind,
};
use futures_util::StreamExt;
use lapin::{
    options::{BasicCancelOptions, BasicConsumeOptions},
    types::FieldTable,
    Channel, Connection,
};
use opentelemetry::global;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, Instrument, Span};

/// Where and how a subscription consumes.
#[derive(Debug, Clone)]
pub struct SubscribeDefinition<'s> {
    pub(crate) exchange: &'s str,
    pub(crate) queue_name: &'s str,
    pub(crate) routing_key: &'s str,
    pub(crate) queue_type: SimpleQueueType,
    pub(crate) consumer_tag: &'s str,
    pub(crate) span: Option<Span>,
    pub(crate) parent: Option<CancellationToken>,
}

impl<'s> SubscribeDefinition<'s> {
    pub fn new(
        exchange: &'s str,
        queue_name: &'s str,
        routing_key: &'s str,
        queue_type: SimpleQueueType,
    ) -> SubscribeDefinition<'s> {
        SubscribeDefinition {
            exchange,
            queue_name,
            routing_key,
            queue_type,
            consumer_tag: "",
            span: None,
            parent: None,
        }
    }

    /// Sets the consumer tag; the broker generates one when left empty.
    pub fn consumer_tag(mut self, tag: &'s str) -> Self {
        self.consumer_tag = tag;
        self
    }

    /// Span every log event of the consumption loop is recorded under.
    ///
    /// Defaults to a `subscription` span carrying exchange, queue and routing key.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Ties the subscription to `parent`: cancelling it stops this subscription too.
    pub fn cancel_with(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    fn loop_span(&self) -> Span {
        self.span.clone().unwrap_or_else(|| {
            info_span!(
                "subscription",
                exchange = self.exchange,
                queue = self.queue_name,
                routing_key = self.routing_key
            )
        })
    }
}

/// Handle to a running consumption loop.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Name of the queue being consumed.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Stops consuming. The message being handled, if any, is still acknowledged;
    /// unacknowledged prefetched messages go back to the queue.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the consumption loop has ended, after cancellation, a closed
    /// channel or a panic in the handler.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the consumption loop to end.
    pub async fn join(self) -> Result<(), PubSubError> {
        self.handle.await.map_err(|err| {
            error!(error = err.to_string(), "consumption task failed");
            PubSubError::ConsumerError(err.to_string())
        })
    }
}

/// Subscribes `handler` to the queue described by `def`, decoding with `codec`.
///
/// Topology and consumer registration errors are returned here; everything that
/// happens afterwards is handled inside the spawned loop.
///
/// # Parameters
/// * `conn` - Shared connection; the subscription opens and owns its own channel
/// * `def` - Exchange, queue, routing key and lifetime mode of the subscription
/// * `codec` - Decoder applied to every delivery
/// * `handler` - Called once per decoded message; its `AckType` is applied to the broker
///
/// # Returns
/// * `Ok(Subscription)` - Handle to the spawned consumption loop
/// * `Err(PubSubError)` - Channel, queue declaration, binding or consumer registration failed
pub async fn subscribe<T, C, H>(
    conn: &Connection,
    def: &SubscribeDefinition<'_>,
    codec: C,
    handler: H,
) -> Result<Subscription, PubSubError>
where
    T: Send + 'static,
    C: Decoder<T>,
    H: MessageHandler<T>,
{
    let (channel, queue) = declare_and_bind(
        conn,
        def.exchange,
        def.queue_name,
        def.routing_key,
        def.queue_type,
    )
    .await?;

    let consumer = match channel
        .basic_consume(
            def.queue_name,
            def.consumer_tag,
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
        Err(err) => {
            error!(error = err.to_string(), "error to create the consumer");
            Err(PubSubError::ConsumerDeclarationError(queue.name.clone()))
        }
        Ok(c) => Ok(c),
    }?;

    let consumer_tag = consumer.tag().to_string();
    let cancel = match &def.parent {
        Some(parent) => parent.child_token(),
        None => CancellationToken::new(),
    };

    debug!(
        queue = %queue.name,
        consumer_tag = %consumer_tag,
        queue_type = %def.queue_type,
        "subscription started"
    );

    let token = cancel.clone();
    let handle = tokio::spawn(
        async move {
            let deliveries = consumer.map(|result| {
                result
                    .map(InboundDelivery::from)
                    .map_err(|err| PubSubError::ConsumerError(err.to_string()))
            });

            consume(
                Box::pin(deliveries),
                &codec,
                &handler,
                token.clone(),
                &global::tracer("amqp consumer"),
            )
            .await;

            if token.is_cancelled() {
                release(&channel, &consumer_tag).await;
            }

            debug!("subscription stopped");
        }
        .instrument(def.loop_span()),
    );

    Ok(Subscription {
        queue: queue.name,
        cancel,
        handle,
    })
}

/// Subscribes a JSON-decoding handler.
pub async fn subscribe_json<T, H>(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    queue_type: SimpleQueueType,
    handler: H,
) -> Result<Subscription, PubSubError>
where
    T: DeserializeOwned + Send + 'static,
    H: MessageHandler<T>,
{
    let def = SubscribeDefinition::new(exchange, queue_name, key, queue_type);
    subscribe(conn, &def, JsonCodec, handler).await
}

/// Subscribes a bincode-decoding handler.
pub async fn subscribe_bincode<T, H>(
    conn: &Connection,
    exchange: &str,
    queue_name: &str,
    key: &str,
    queue_type: SimpleQueueType,
    handler: H,
) -> Result<Subscription, PubSubError>
where
    T: DeserializeOwned + Send + 'static,
    H: MessageHandler<T>,
{
    let def = SubscribeDefinition::new(exchange, queue_name, key, queue_type);
    subscribe(conn, &def, BincodeCodec, handler).await
}

/// Cancels the broker-side consumer and closes the channel so unacknowledged
/// deliveries are returned to the queue.
async fn release(channel: &Channel, consumer_tag: &str) {
    if let Err(err) = channel
        .basic_cancel(consumer_tag, BasicCancelOptions::default())
        .await
    {
        error!(error = err.to_string(), "failure to cancel consumer");
    }

    if let Err(err) = channel.close(200, "subscription cancelled").await {
        error!(error = err.to_string(), "failure to close channel");
    }
}
