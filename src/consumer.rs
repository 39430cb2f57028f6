// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumption Loop
//!
//! This module drives one subscription: it pulls deliveries one at a time, decodes
//! them, hands the value to the application handler and turns the handler's
//! `AckType` into exactly one broker acknowledgment.
//!
//! Handling is strictly sequential, so a queue's deliveries reach the handler in
//! arrival order. A payload that cannot be decoded is logged and rejected without
//! requeue (dead-lettered), and the loop moves on to the next delivery.

use crate::{
    ack::{AckType, Acknowledge},
    codec::Decoder,
    errors::PubSubError,
    otel,
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use lapin::{
    message::Delivery,
    types::{AMQPValue, ShortString},
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::{borrow::Cow, collections::BTreeMap, future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Application callback invoked once per decoded message.
#[async_trait]
pub trait MessageHandler<T>: Send + Sync + 'static {
    async fn handle(&self, msg: T) -> AckType;
}

#[async_trait]
impl<T, F, Fut> MessageHandler<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AckType> + Send,
{
    async fn handle(&self, msg: T) -> AckType {
        (self)(msg).await
    }
}

/// A delivered message, detached from the broker client.
pub struct InboundDelivery {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub headers: BTreeMap<ShortString, AMQPValue>,
    pub acker: Arc<dyn Acknowledge>,
}

impl From<Delivery> for InboundDelivery {
    fn from(delivery: Delivery) -> Self {
        let headers = delivery
            .properties
            .headers()
            .as_ref()
            .map(|table| table.inner().clone())
            .unwrap_or_default();

        InboundDelivery {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            content_type: delivery
                .properties
                .content_type()
                .as_ref()
                .map(|ct| ct.to_string()),
            headers,
            data: delivery.data,
            acker: Arc::new(delivery.acker),
        }
    }
}

/// Runs the consumption loop until the stream ends or `cancel` fires.
///
/// Cancellation is only observed while waiting for the next delivery; a message
/// already being handled is always driven to its acknowledgment first.
pub(crate) async fn consume<T, C, H, S>(
    mut stream: S,
    codec: &C,
    handler: &H,
    cancel: CancellationToken,
    tracer: &BoxedTracer,
) where
    C: Decoder<T> + ?Sized,
    H: MessageHandler<T> + ?Sized,
    S: Stream<Item = Result<InboundDelivery, PubSubError>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("subscription cancelled");
                break;
            }
            next = stream.next() => next,
        };

        let Some(result) = next else {
            debug!("delivery stream closed");
            break;
        };

        match result {
            Ok(delivery) => {
                process(tracer, &delivery, codec, handler).await;
            }
            Err(err) => error!(error = err.to_string(), "errors consume msg"),
        }
    }
}

/// Decodes, handles and acknowledges a single delivery, returning the decision
/// that was applied.
pub(crate) async fn process<T, C, H>(
    tracer: &BoxedTracer,
    delivery: &InboundDelivery,
    codec: &C,
    handler: &H,
) -> AckType
where
    C: Decoder<T> + ?Sized,
    H: MessageHandler<T> + ?Sized,
{
    let (_ctx, mut span) = otel::new_span(&delivery.headers, tracer, "consume");

    debug!(
        delivery_tag = delivery.delivery_tag,
        redelivered = delivery.redelivered,
        "received message"
    );

    if let Some(content_type) = &delivery.content_type {
        if content_type != codec.content_type() {
            debug!(
                received = %content_type,
                expected = codec.content_type(),
                "content type differs from subscriber codec"
            );
        }
    }

    let decision = match codec.decode(&delivery.data) {
        Ok(msg) => handler.handle(msg).await,
        Err(err) => {
            error!(
                error = err.to_string(),
                delivery_tag = delivery.delivery_tag,
                "undecodable payload, discarding message"
            );
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("undecodable payload"),
            });
            AckType::NackDiscard
        }
    };

    match decision {
        AckType::Ack => debug!("sending ack"),
        AckType::NackRequeue => warn!("sending nack, requeuing message"),
        AckType::NackDiscard => warn!("sending nack, discarding message"),
    }

    if let Err(err) = decision.apply(delivery.acker.as_ref()).await {
        span.record_error(&err);
        span.set_status(Status::Error {
            description: Cow::from("error to acknowledge msg"),
        });
    }

    span.end();
    decision
}
